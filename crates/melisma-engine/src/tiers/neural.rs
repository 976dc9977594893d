//! Neural conversion tier.
//!
//! The trained embedding model does not generate audio on its own; it
//! converts. A parametric base render is analyzed, pushed through the
//! encoder and predictor head, and the predicted voice vector drives three
//! small corrections: pitch, brightness tilt, and gain. Every correction
//! is bounded to a few percent, so a badly trained model degrades toward
//! the plain parametric sound instead of ruining it.

use std::path::PathBuf;

use tracing::debug;

use melisma_dsp::features::FeatureVector;
use melisma_dsp::filter::BiquadFilter;
use melisma_dsp::pitch_shift::pitch_shift;

use crate::embedding::{ModelFile, VOICE_VECTOR_DIM};
use crate::orchestrator::{SynthesisPlan, SynthesisTier, TierError, TierKind};
use crate::tiers::ParametricTier;

/// Largest pitch correction, in semitones (just under 5% in frequency).
const MAX_PITCH_SEMITONES: f64 = 0.8;
/// Largest brightness tilt blend.
const MAX_TILT: f64 = 0.05;
/// Largest gain correction.
const MAX_GAIN: f64 = 0.05;
/// Tilt split point between "body" and "air".
const TILT_CUTOFF_HZ: f64 = 4_000.0;

pub struct NeuralTier {
    model_path: PathBuf,
    base: ParametricTier,
}

impl NeuralTier {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            base: ParametricTier,
        }
    }
}

impl SynthesisTier for NeuralTier {
    fn kind(&self) -> TierKind {
        TierKind::NeuralConversion
    }

    fn render(&self, plan: &SynthesisPlan) -> Result<Vec<f64>, TierError> {
        let file = ModelFile::load(&self.model_path)
            .map_err(|e| TierError(format!("loading voice model: {e}")))?;
        let model = file
            .to_model()
            .map_err(|e| TierError(format!("rehydrating voice model: {e}")))?;

        let base = self.base.render(plan)?;

        let features = FeatureVector::extract(&base, plan.sample_rate);
        let voice_vector = model.predict_voice(&features.values);
        if voice_vector.len() != VOICE_VECTOR_DIM
            || voice_vector.iter().any(|v| !v.is_finite())
        {
            return Err(TierError("model produced an unusable voice vector".into()));
        }

        let (pitch, tilt, gain) = corrections(&voice_vector);
        debug!(pitch, tilt, gain, "applying neural corrections");

        let mut converted = if pitch.abs() > 1e-3 {
            pitch_shift(&base, plan.sample_rate, pitch)
        } else {
            base
        };

        // Brightness tilt: add or remove a little of the high band
        if tilt.abs() > 1e-4 {
            let mut lowpass = BiquadFilter::lowpass(TILT_CUTOFF_HZ, 0.707, plan.sample_rate);
            for sample in converted.iter_mut() {
                let body = lowpass.process(*sample);
                let air = *sample - body;
                *sample += tilt * air;
            }
        }

        let scale = 1.0 + gain;
        for sample in converted.iter_mut() {
            *sample *= scale;
        }
        Ok(converted)
    }
}

/// Maps thirds of the voice vector onto bounded corrections via tanh.
fn corrections(voice_vector: &[f64]) -> (f64, f64, f64) {
    let third = voice_vector.len() / 3;
    let mean = |slice: &[f64]| slice.iter().sum::<f64>() / slice.len().max(1) as f64;

    let pitch = mean(&voice_vector[..third]).tanh() * MAX_PITCH_SEMITONES;
    let tilt = mean(&voice_vector[third..2 * third]).tanh() * MAX_TILT;
    let gain = mean(&voice_vector[2 * third..]).tanh() * MAX_GAIN;
    (pitch, tilt, gain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::train_embedding;
    use melisma_dsp::features::FEATURE_DIM;
    use melisma_voice::{plan_segments, VoiceCharacteristics, VoiceProfile};
    use pretty_assertions::assert_eq;

    fn trained_model_path(dir: &tempfile::TempDir) -> PathBuf {
        let features: Vec<Vec<f64>> = (0..3)
            .map(|f| {
                (0..FEATURE_DIM)
                    .map(|d| ((d + f * 7) as f64 * 0.11).cos())
                    .collect()
            })
            .collect();
        let (model, validation) = train_embedding("neural-test", &features, &mut |_| true)
            .unwrap()
            .unwrap();
        let file = ModelFile::from_model(
            "neural-test",
            &model,
            validation,
            vec!["take.wav".into()],
            VoiceCharacteristics::default(),
        );
        let path = dir.path().join("neural-test.json");
        file.save(&path).unwrap();
        path
    }

    fn plan() -> SynthesisPlan {
        let sample_rate = 22_050.0;
        let seconds = 3.0;
        SynthesisPlan {
            voice: VoiceProfile::builtin("default", "Default", VoiceCharacteristics::default()),
            segments: plan_segments("la la la", &[220.0, 261.63, 220.0], seconds),
            sample_rate,
            total_samples: (seconds * sample_rate) as usize,
            seed: 21,
        }
    }

    #[test]
    fn test_converts_base_render() {
        let dir = tempfile::tempdir().unwrap();
        let tier = NeuralTier::new(trained_model_path(&dir));
        let plan = plan();
        let samples = tier.render(&plan).unwrap();
        assert_eq!(samples.len(), plan.total_samples);
        assert!(samples.iter().all(|s| s.is_finite()));
        assert!(samples.iter().any(|s| s.abs() > 1e-4));
    }

    #[test]
    fn test_missing_model_is_a_tier_error() {
        let tier = NeuralTier::new("/nonexistent/model.json");
        assert!(tier.render(&plan()).is_err());
    }

    #[test]
    fn test_corrupt_model_is_a_tier_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, b"{").unwrap();
        let tier = NeuralTier::new(path);
        assert!(tier.render(&plan()).is_err());
    }

    #[test]
    fn test_corrections_are_bounded() {
        let extreme = vec![1_000.0; VOICE_VECTOR_DIM];
        let (pitch, tilt, gain) = corrections(&extreme);
        assert!(pitch.abs() <= MAX_PITCH_SEMITONES);
        assert!(tilt.abs() <= MAX_TILT);
        assert!(gain.abs() <= MAX_GAIN);

        let negative = vec![-1_000.0; VOICE_VECTOR_DIM];
        let (pitch, _, _) = corrections(&negative);
        assert!(pitch < 0.0);
    }
}
