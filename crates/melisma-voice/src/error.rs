//! Error types for voice domain validation.

use thiserror::Error;

/// Result type for voice domain operations.
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Errors raised while validating singing input.
#[derive(Debug, Error)]
pub enum VoiceError {
    /// Request text was empty or whitespace-only.
    #[error("text must not be empty")]
    EmptyText,

    /// Request named no voice.
    #[error("voice id must not be empty")]
    EmptyVoiceId,

    /// Requested duration is not a usable positive number.
    #[error("invalid duration: {seconds} seconds")]
    InvalidDuration {
        /// The rejected duration.
        seconds: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_problem() {
        assert!(VoiceError::EmptyText.to_string().contains("text"));
        assert!(VoiceError::EmptyVoiceId.to_string().contains("voice id"));
        let err = VoiceError::InvalidDuration { seconds: -1.0 };
        assert!(err.to_string().contains("-1"));
    }
}
