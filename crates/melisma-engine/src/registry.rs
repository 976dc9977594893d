//! Voice registry: builtin seeding, resolution, installation, deletion.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use melisma_voice::{VoiceCharacteristics, VoiceProfile};

use crate::error::{EngineError, EngineResult};
use crate::store::VoiceStore;

/// The registry owns voice identity plus the on-disk layout for each
/// voice's model document and copied training samples.
pub struct VoiceRegistry {
    store: Arc<dyn VoiceStore>,
    models_root: PathBuf,
    samples_root: PathBuf,
}

/// Builtin voices shipped with the engine. Seeded once at startup and
/// immutable afterwards; synthesis always has these to fall back on.
fn builtin_profiles() -> Vec<VoiceProfile> {
    vec![
        VoiceProfile::builtin(
            "default",
            "Default",
            VoiceCharacteristics::default(),
        ),
        VoiceProfile::builtin(
            "bright",
            "Bright",
            VoiceCharacteristics {
                fundamental_hz: 285.0,
                spectral_centroid_hz: 3_200.0,
                spectral_rolloff_hz: 7_500.0,
                vibrato_rate_hz: 6.0,
                vibrato_depth: 0.025,
                texture: 0.2,
                warmth: 0.35,
                dynamics: 0.65,
                energy: 0.7,
                pitch_range_hz: (220.0, 520.0),
                ..VoiceCharacteristics::default()
            },
        ),
        VoiceProfile::builtin(
            "warm",
            "Warm",
            VoiceCharacteristics {
                fundamental_hz: 196.0,
                spectral_centroid_hz: 1_500.0,
                spectral_rolloff_hz: 4_200.0,
                vibrato_rate_hz: 5.0,
                vibrato_depth: 0.018,
                texture: 0.45,
                warmth: 0.8,
                dynamics: 0.4,
                energy: 0.5,
                pitch_range_hz: (150.0, 340.0),
                ..VoiceCharacteristics::default()
            },
        ),
        VoiceProfile::builtin(
            "deep",
            "Deep",
            VoiceCharacteristics {
                fundamental_hz: 115.0,
                spectral_centroid_hz: 1_100.0,
                spectral_rolloff_hz: 3_200.0,
                vibrato_rate_hz: 4.5,
                vibrato_depth: 0.015,
                texture: 0.35,
                warmth: 0.7,
                dynamics: 0.45,
                energy: 0.55,
                pitch_range_hz: (85.0, 220.0),
                ..VoiceCharacteristics::default()
            },
        ),
    ]
}

impl VoiceRegistry {
    /// Opens the registry, seeding any missing builtin profiles.
    pub fn new(
        store: Arc<dyn VoiceStore>,
        models_root: impl Into<PathBuf>,
        samples_root: impl Into<PathBuf>,
    ) -> EngineResult<Self> {
        let registry = Self {
            store,
            models_root: models_root.into(),
            samples_root: samples_root.into(),
        };
        fs::create_dir_all(&registry.models_root)?;
        fs::create_dir_all(&registry.samples_root)?;

        for profile in builtin_profiles() {
            if registry.store.get_voice(&profile.voice_id)?.is_none() {
                registry.store.put_voice(&profile)?;
                info!(voice_id = %profile.voice_id, "seeded builtin voice");
            }
        }
        Ok(registry)
    }

    /// Looks a voice up, failing with `VoiceNotFound`.
    pub fn resolve(&self, voice_id: &str) -> EngineResult<VoiceProfile> {
        self.store
            .get_voice(voice_id)?
            .ok_or_else(|| EngineError::VoiceNotFound {
                voice_id: voice_id.to_string(),
            })
    }

    /// All registered voices: builtins first, then customs, each sorted by id.
    pub fn list(&self) -> EngineResult<Vec<VoiceProfile>> {
        let mut voices = self.store.list_voices()?;
        voices.sort_by(|a, b| {
            b.is_builtin()
                .cmp(&a.is_builtin())
                .then_with(|| a.voice_id.cmp(&b.voice_id))
        });
        Ok(voices)
    }

    /// Installs a trained custom voice.
    pub fn install_custom(&self, profile: &VoiceProfile) -> EngineResult<()> {
        self.store.put_voice(profile)
    }

    /// Deletes a custom voice with all its files.
    ///
    /// Returns false for an unknown id; refuses builtins with an error.
    pub fn delete(&self, voice_id: &str) -> EngineResult<bool> {
        let Some(profile) = self.store.get_voice(voice_id)? else {
            return Ok(false);
        };
        if profile.is_builtin() {
            return Err(EngineError::BuiltinVoice {
                voice_id: voice_id.to_string(),
            });
        }

        let model = self.model_path(voice_id);
        if model.exists() {
            fs::remove_file(&model)?;
        }
        let samples = self.voice_samples_dir(voice_id);
        if samples.exists() {
            fs::remove_dir_all(&samples)?;
        }

        let removed = self.store.delete_voice(voice_id)?;
        info!(voice_id, "deleted custom voice");
        Ok(removed)
    }

    /// Path of the trained model document for a voice.
    pub fn model_path(&self, voice_id: &str) -> PathBuf {
        self.models_root.join(format!("{voice_id}.json"))
    }

    /// Directory holding the copied training samples and slices of a voice.
    pub fn voice_samples_dir(&self, voice_id: &str) -> PathBuf {
        self.samples_root.join(voice_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use melisma_voice::VoiceKind;
    use pretty_assertions::assert_eq;

    fn registry() -> (VoiceRegistry, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let registry = VoiceRegistry::new(
            store,
            dir.path().join("models"),
            dir.path().join("samples"),
        )
        .unwrap();
        (registry, dir)
    }

    #[test]
    fn test_builtins_are_seeded() {
        let (registry, _dir) = registry();
        for id in ["default", "bright", "warm", "deep"] {
            let profile = registry.resolve(id).unwrap();
            assert_eq!(profile.kind, VoiceKind::Builtin);
        }
    }

    #[test]
    fn test_seeding_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        for _ in 0..2 {
            VoiceRegistry::new(
                store.clone(),
                dir.path().join("models"),
                dir.path().join("samples"),
            )
            .unwrap();
        }
        let (registry, _dir2) = (
            VoiceRegistry::new(
                store,
                dir.path().join("models"),
                dir.path().join("samples"),
            )
            .unwrap(),
            dir,
        );
        assert_eq!(registry.list().unwrap().len(), 4);
    }

    #[test]
    fn test_unknown_voice_errors() {
        let (registry, _dir) = registry();
        assert!(matches!(
            registry.resolve("ghost"),
            Err(EngineError::VoiceNotFound { .. })
        ));
    }

    #[test]
    fn test_builtin_deletion_refused() {
        let (registry, _dir) = registry();
        assert!(matches!(
            registry.delete("default"),
            Err(EngineError::BuiltinVoice { .. })
        ));
        // Still resolvable afterwards.
        assert!(registry.resolve("default").is_ok());
    }

    #[test]
    fn test_delete_unknown_returns_false() {
        let (registry, _dir) = registry();
        assert_eq!(registry.delete("ghost").unwrap(), false);
    }

    #[test]
    fn test_custom_install_and_delete_removes_files() {
        let (registry, _dir) = registry();

        let samples_dir = registry.voice_samples_dir("voice-x");
        fs::create_dir_all(&samples_dir).unwrap();
        fs::write(samples_dir.join("take1.wav"), b"fake").unwrap();
        fs::write(registry.model_path("voice-x"), b"{}").unwrap();

        let profile = VoiceProfile::custom(
            "voice-x",
            "X",
            VoiceCharacteristics::default(),
            Some(registry.model_path("voice-x")),
            vec![samples_dir.join("take1.wav")],
        );
        registry.install_custom(&profile).unwrap();

        assert!(registry.delete("voice-x").unwrap());
        assert!(!registry.model_path("voice-x").exists());
        assert!(!samples_dir.exists());
        assert!(registry.resolve("voice-x").is_err());
    }

    #[test]
    fn test_list_puts_builtins_first() {
        let (registry, _dir) = registry();
        registry
            .install_custom(&VoiceProfile::custom(
                "aaa-custom",
                "A",
                VoiceCharacteristics::default(),
                None,
                Vec::new(),
            ))
            .unwrap();

        let voices = registry.list().unwrap();
        assert_eq!(voices.len(), 5);
        assert!(voices[..4].iter().all(|v| v.is_builtin()));
        assert_eq!(voices[4].voice_id, "aaa-custom");
    }
}
