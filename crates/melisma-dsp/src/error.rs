//! Error types for the signal engine.

use thiserror::Error;

/// Result type for signal operations.
pub type DspResult<T> = Result<T, DspError>;

/// Errors that can occur while decoding or analyzing audio.
#[derive(Debug, Error)]
pub enum DspError {
    /// WAV data could not be parsed.
    #[error("failed to decode WAV: {0}")]
    Decode(#[from] hound::Error),

    /// Decoded audio contained no samples.
    #[error("audio stream is empty")]
    EmptyAudio,

    /// Sample rate is zero or otherwise unusable.
    #[error("invalid sample rate: {rate}")]
    InvalidSampleRate {
        /// The rejected sample rate.
        rate: u32,
    },
}
