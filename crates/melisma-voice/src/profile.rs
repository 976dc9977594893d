//! Voice profiles: the registry's unit of identity.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::characteristics::VoiceCharacteristics;

/// Whether a voice ships with the engine or was trained by a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceKind {
    /// Shipped with the engine; immutable and undeletable.
    Builtin,
    /// Created by a training job; owns model and sample files.
    Custom,
}

/// A registered voice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceProfile {
    /// Stable identifier used in requests and file names.
    pub voice_id: String,
    /// Human-readable display name.
    pub name: String,
    pub kind: VoiceKind,
    pub characteristics: VoiceCharacteristics,
    /// Path to the trained model document, when one exists.
    #[serde(default)]
    pub model_reference: Option<PathBuf>,
    /// Copies of the training input audio, in training order.
    #[serde(default)]
    pub training_sample_paths: Vec<PathBuf>,
}

impl VoiceProfile {
    /// Builds a builtin profile with no model or sample files.
    pub fn builtin(
        voice_id: impl Into<String>,
        name: impl Into<String>,
        characteristics: VoiceCharacteristics,
    ) -> Self {
        Self {
            voice_id: voice_id.into(),
            name: name.into(),
            kind: VoiceKind::Builtin,
            characteristics: characteristics.sanitized(),
            model_reference: None,
            training_sample_paths: Vec::new(),
        }
    }

    /// Builds a custom profile produced by a completed training job.
    pub fn custom(
        voice_id: impl Into<String>,
        name: impl Into<String>,
        characteristics: VoiceCharacteristics,
        model_reference: Option<PathBuf>,
        training_sample_paths: Vec<PathBuf>,
    ) -> Self {
        Self {
            voice_id: voice_id.into(),
            name: name.into(),
            kind: VoiceKind::Custom,
            characteristics: characteristics.sanitized(),
            model_reference,
            training_sample_paths,
        }
    }

    pub fn is_builtin(&self) -> bool {
        self.kind == VoiceKind::Builtin
    }
}
