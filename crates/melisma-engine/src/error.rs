//! Engine error taxonomy.
//!
//! Note-parse failures never appear here: they degrade to the default pitch
//! inside segment planning. Tier failures stay inside the orchestrator and
//! only surface as [`EngineError::SynthesisFailed`] when the final tier
//! gives up too.

use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced to callers of the engine facade.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Request named a voice the registry does not know.
    #[error("voice not found: {voice_id}")]
    VoiceNotFound {
        /// The unresolved identifier.
        voice_id: String,
    },

    /// Request failed domain validation.
    #[error(transparent)]
    InvalidRequest(#[from] melisma_voice::VoiceError),

    /// Training was asked to run without any usable audio.
    #[error("insufficient training data: {reason}")]
    InsufficientTrainingData {
        /// Why the input was rejected.
        reason: String,
    },

    /// Deleting a builtin voice is refused.
    #[error("voice '{voice_id}' is builtin and cannot be deleted")]
    BuiltinVoice {
        /// The protected identifier.
        voice_id: String,
    },

    /// An atomic store write failed even after the retry.
    #[error("persistence failure ({context}): {source}")]
    Persistence {
        /// What was being written.
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Every synthesis tier failed; the caller gets the last reason.
    #[error("all synthesis tiers failed: {detail}")]
    SynthesisFailed {
        /// Failure reason of the final (parametric) tier.
        detail: String,
    },

    /// Filesystem error outside the atomic-write path.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted document could not be parsed.
    #[error("corrupt stored document: {0}")]
    Json(#[from] serde_json::Error),
}
