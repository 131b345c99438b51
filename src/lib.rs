#![doc = include_str!("../README.md")]

// private mods (will be partly re-exported)
mod effect;
mod error;
mod parameter;

// public, flat re-exports
pub use effect::{texture::GranularTextureEffect, Effect, RenderTime};
pub use engine::mood::RandomizationMode;
pub use error::Error;
pub use parameter::{
    BooleanParameter, BooleanParameterValue, ClonableParameter, EnumParameter,
    EnumParameterValue, FloatParameter, FloatParameterValue, IntegerParameter,
    IntegerParameterValue, Parameter, ParameterType, ParameterValueUpdate,
};

// public mods
pub mod engine;
pub mod utils;

// trap allocations in the render path of unit tests
#[cfg(all(test, feature = "assert-allocs"))]
#[global_allocator]
static ALLOC_DISABLER: assert_no_alloc::AllocDisabler = assert_no_alloc::AllocDisabler;
