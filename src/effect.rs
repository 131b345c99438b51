use four_cc::FourCC;

use crate::{parameter::ParameterValueUpdate, ClonableParameter, Error};

// -------------------------------------------------------------------------------------------------

pub mod texture;

// -------------------------------------------------------------------------------------------------

/// Frame time reference for an effect's process function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderTime {
    /// Continuously running stereo frame counter since processing started.
    pub pos_in_frames: u64,
}

// -------------------------------------------------------------------------------------------------

/// Effects manipulate audio samples in `f32` format and can be `Send` and `Sync`ed across
/// threads. Buffers are processed in-place in the audio real-time thread.
///
/// Non real-time thread clients, such as UIs, can query info about an effect's parameter set
/// via [`Effect::parameters`] after creating the effect. Parameter changes are applied via
/// [`Effect::process_parameter_update`] in the real-time thread.
///
/// NB: all `process_XXX` functions are called in realtime audio threads, so they must not
/// block! All other functions are called in the main thread to initialize the effect.
pub trait Effect: Send + Sync + 'static {
    /// A unique, static name for the effect, for logging or UIs.
    fn name(&self) -> &'static str;

    /// Returns a list of parameter descriptors for this effect.
    ///
    /// The list order is the effect's canonical parameter order: hosts which address
    /// parameters by plain indices use the position in this list as the parameter id.
    fn parameters(&self) -> Vec<&dyn ClonableParameter>;

    /// Initializes the effect with the audio output's properties.
    ///
    /// This method is called once before the effect is used. It runs on a non-real-time
    /// thread, so it's safe to perform allocations or other setup tasks here.
    ///
    /// If an error is returned, the effect must not be used: there is no degraded mode.
    fn initialize(
        &mut self,
        sample_rate: u32,
        channel_count: usize,
        max_frames: usize,
    ) -> Result<(), Error>;

    /// Called in the real-time thread before audio processing starts.
    ///
    /// Use this to prepare real-time state or reset transient conditions. Like `process`,
    /// this method must not block, allocate memory, or do other time-consuming tasks.
    fn process_started(&mut self) {}

    /// Called in the real-time thread after processing stopped.
    ///
    /// Like `process`, this method must not block, allocate memory, or do other
    /// time-consuming tasks.
    fn process_stopped(&mut self) {}

    /// Processes an interleaved audio buffer in-place, applying the effect.
    ///
    /// This method is called repeatedly on the real-time audio thread. To avoid audio
    /// glitches, it must not block, allocate memory, or perform other time-consuming
    /// operations.
    fn process(&mut self, output: &mut [f32], time: &RenderTime);

    /// Returns the number of audible sample frames this effect will produce after it received
    /// silence.
    ///
    /// This is used to auto-bypass processing in effect chains, in order to save CPU cycles.
    /// - `None`: means I don't know. Go figure. Use this as a fallback only as this comes
    ///   with extra overhead.
    /// - `Some(X)`: means that the effect will produce at least X sample frames of audible
    ///   audio.
    /// - `Some(usize::MAX)`: signals an infinite tail which will never auto-bypass the
    ///   effect.
    fn process_tail(&self) -> Option<usize> {
        None
    }

    /// Handles a parameter update in the real-time thread.
    ///
    /// The implementation should match on the `id` and update its internal state accordingly
    /// by using the `value` which can be a raw or normalized value.
    ///
    /// Like `process`, this method must not block, allocate memory, or do other
    /// time-consuming tasks.
    fn process_parameter_update(
        &mut self,
        id: FourCC,
        value: &ParameterValueUpdate,
    ) -> Result<(), Error>;
}
