use std::{error, fmt};

// -------------------------------------------------------------------------------------------------

/// Provides an enumeration of all possible errors reported by grainstorm.
#[derive(Debug)]
pub enum Error {
    /// The host runs at a sample rate the engine is not calibrated for.
    UnsupportedSampleRate(u32),
    /// The host provides a channel layout other than stereo in/out.
    UnsupportedChannelLayout(usize),
    /// A parameter id or value was rejected.
    ParameterError(String),
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedSampleRate(rate) => {
                write!(f, "Unsupported sample rate: {rate} Hz")
            }
            Self::UnsupportedChannelLayout(channels) => {
                write!(f, "Unsupported channel layout: {channels} channels")
            }
            Self::ParameterError(str) => write!(f, "Invalid parameter: {str}"),
        }
    }
}
