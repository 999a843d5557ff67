//! Error types.

use thiserror::Error;

/// Error type.
///
/// Errors only surface on the non-realtime configuration and loading paths;
/// the render path never returns one, it degrades instead.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Sample not found.
    #[error("Sample not found: {0}")]
    SampleNotFound(String),

    /// Sample format not supported by the loader.
    #[error("Unsupported sample format: {0}")]
    UnsupportedSampleFormat(String),

    /// Reconfiguration attempted while a voice is not idle.
    #[error("Voice {0} is busy; configuration requires an idle voice")]
    VoiceBusy(u32),
}

/// Result type.
pub type Result<T> = std::result::Result<T, Error>;
