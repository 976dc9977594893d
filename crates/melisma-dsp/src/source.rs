//! Glottal source model.
//!
//! The vocal folds are modeled as a bank of harmonic partials over an
//! instantaneous pitch curve. Each harmonic keeps its own phase
//! accumulator, so pitch glides and vibrato stay continuous, and its own
//! slow jitter walk, so the partials drift against each other the way a
//! real larynx does instead of locking into an organ tone.

use rand::Rng;
use rand_pcg::Pcg32;

use melisma_voice::VoiceCharacteristics;

use crate::oscillator::{sine, PhaseAccumulator};

/// Harmonic excitation source shaped by a voice's register.
#[derive(Debug, Clone)]
pub struct GlottalSource {
    /// Number of harmonic partials, 15 to 19.
    pub harmonics: usize,
    /// Per-harmonic amplitude decay factor (spectral tilt).
    pub rolloff: f64,
    /// Maximum pitch jitter as a fraction of the fundamental.
    pub jitter_frac: f64,
    /// Even-harmonic scaling modeling glottal pulse asymmetry, 0.6 to 0.7.
    pub asymmetry: f64,
}

impl GlottalSource {
    /// Derives source settings from a voice's measured characteristics.
    ///
    /// Lower voices get more partials, a gentler tilt, and slightly more
    /// jitter; higher voices the opposite. The register position is
    /// continuous, so a voice in the overlap band lands in between.
    pub fn for_voice(characteristics: &VoiceCharacteristics) -> Self {
        let lean = characteristics.gender_lean();
        Self {
            harmonics: 15 + ((1.0 - lean) * 4.0).round() as usize,
            rolloff: 0.88 - 0.06 * lean,
            jitter_frac: 0.005 - 0.002 * lean,
            asymmetry: 0.7 - 0.1 * lean,
        }
    }

    /// Renders excitation for an instantaneous pitch curve.
    ///
    /// `pitch_curve` holds one frequency per output sample; entries at or
    /// below zero are unvoiced and render as silence with all phases
    /// frozen. Harmonics that would land above Nyquist are skipped sample
    /// by sample. The result is peak-normalized to 1.0.
    pub fn generate(
        &self,
        pitch_curve: &[f64],
        sample_rate: f64,
        rng: &mut Pcg32,
    ) -> Vec<f64> {
        let num_samples = pitch_curve.len();
        let mut output = vec![0.0; num_samples];
        if num_samples == 0 {
            return output;
        }
        let nyquist = sample_rate / 2.0;

        for h in 1..=self.harmonics {
            let base_amp = self.rolloff.powi(h as i32 - 1) / h as f64;
            let amp = if h % 2 == 0 {
                base_amp * self.asymmetry
            } else {
                base_amp
            };
            if amp < 1e-6 {
                continue;
            }

            let mut phase_acc = PhaseAccumulator::new(sample_rate);
            let mut jitter = 0.0_f64;

            for (i, &fundamental) in pitch_curve.iter().enumerate() {
                if fundamental <= 0.0 {
                    continue;
                }

                // Slow random walk, bounded by the jitter budget
                jitter += (rng.gen::<f64>() * 2.0 - 1.0) * self.jitter_frac * 0.1;
                jitter = jitter.clamp(-self.jitter_frac, self.jitter_frac);

                let frequency = fundamental * h as f64 * (1.0 + jitter);
                if frequency >= nyquist {
                    continue;
                }

                output[i] += sine(phase_acc.advance(frequency)) * amp;
            }
        }

        let max = output
            .iter()
            .map(|s| s.abs())
            .fold(0.0_f64, |a, b| a.max(b));
        if max > 0.0 {
            let scale = 1.0 / max;
            for sample in &mut output {
                *sample *= scale;
            }
        }

        output
    }
}
