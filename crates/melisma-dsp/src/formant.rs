//! Vowel formant tables and the formant filter bank.
//!
//! Human vowels are identified by resonant peaks in the spectrum:
//! F1 (200-900 Hz) tracks tongue height, F2 (700-2600 Hz) tongue
//! position, F3 and up carry speaker identity. The bank applies a serial
//! chain of peaking EQ boosts at the vowel's formants; at zero warmth the
//! chain collapses to an exact pass-through.

use crate::filter::{BiquadCoeffs, BiquadFilter};

/// A single formant resonance.
#[derive(Debug, Clone, Copy)]
pub struct Formant {
    /// Center frequency in Hz.
    pub frequency: f64,
    /// Relative strength of this formant (0.0-1.0).
    pub amplitude: f64,
    /// Q factor of the resonance.
    pub q: f64,
}

impl Formant {
    const fn new(frequency: f64, amplitude: f64, q: f64) -> Self {
        Self {
            frequency,
            amplitude,
            q,
        }
    }
}

/// Formant centers cannot exceed this fraction of the sample rate.
const FORMANT_CEILING_FRACTION: f64 = 0.45;
/// Full-warmth boost applied to the strongest formant, in dB.
const MAX_FORMANT_GAIN_DB: f64 = 12.0;

/// Returns the four-formant table for a vowel.
///
/// Unknown or absent vowels fall back to /a/, the neutral open vowel.
pub fn formants_for(vowel: Option<char>) -> [Formant; 4] {
    match vowel {
        // /a/ as in "father"
        Some('a') | None => [
            Formant::new(700.0, 1.0, 5.0),
            Formant::new(1220.0, 0.7, 6.0),
            Formant::new(2600.0, 0.5, 7.0),
            Formant::new(3400.0, 0.3, 8.0),
        ],
        // /e/ as in "bed"
        Some('e') => [
            Formant::new(530.0, 1.0, 5.0),
            Formant::new(1840.0, 0.7, 6.0),
            Formant::new(2480.0, 0.5, 7.0),
            Formant::new(3500.0, 0.3, 8.0),
        ],
        // /i/ as in "feet"
        Some('i') => [
            Formant::new(280.0, 1.0, 5.0),
            Formant::new(2250.0, 0.7, 6.0),
            Formant::new(2890.0, 0.5, 7.0),
            Formant::new(3500.0, 0.3, 8.0),
        ],
        // /o/ as in "boat"
        Some('o') => [
            Formant::new(500.0, 1.0, 5.0),
            Formant::new(1000.0, 0.7, 6.0),
            Formant::new(2800.0, 0.5, 7.0),
            Formant::new(3500.0, 0.3, 8.0),
        ],
        // /u/ as in "boot"
        Some('u') => [
            Formant::new(310.0, 1.0, 5.0),
            Formant::new(870.0, 0.7, 6.0),
            Formant::new(2250.0, 0.5, 7.0),
            Formant::new(3500.0, 0.3, 8.0),
        ],
        Some(_) => formants_for(Some('a')),
    }
}

/// Colors an excitation signal with a vowel's formants.
///
/// `warmth` scales the boost: 0.0 returns the input unchanged, 1.0 applies
/// the full vocal-tract emphasis. `formant_shift` multiplies the formant
/// centers (shorter tracts shift up); shifted centers are clamped below
/// 45% of the sample rate so the resonances stay meaningful.
pub fn apply_formants(
    signal: &[f64],
    vowel: Option<char>,
    warmth: f64,
    formant_shift: f64,
    sample_rate: f64,
) -> Vec<f64> {
    let warmth = warmth.clamp(0.0, 1.0);
    if warmth == 0.0 || signal.is_empty() {
        return signal.to_vec();
    }

    let ceiling = FORMANT_CEILING_FRACTION * sample_rate;
    let mut output = signal.to_vec();

    for formant in formants_for(vowel) {
        let center = (formant.frequency * formant_shift).min(ceiling);
        if center < 20.0 {
            continue;
        }

        let gain_db = MAX_FORMANT_GAIN_DB * warmth * formant.amplitude;
        let coeffs = BiquadCoeffs::peaking_eq(center, formant.q, gain_db, sample_rate);
        let mut filter = BiquadFilter::new(coeffs);
        filter.process_buffer(&mut output);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::create_rng;

    fn test_signal(len: usize) -> Vec<f64> {
        let mut rng = create_rng(42);
        crate::oscillator::white_noise(&mut rng, len)
    }

    #[test]
    fn test_zero_warmth_is_identity() {
        let signal = test_signal(2048);
        let output = apply_formants(&signal, Some('a'), 0.0, 1.0, 22_050.0);
        assert_eq!(output, signal);
    }

    #[test]
    fn test_output_length_preserved() {
        let signal = test_signal(1000);
        let output = apply_formants(&signal, Some('i'), 0.8, 1.0, 22_050.0);
        assert_eq!(output.len(), signal.len());
    }

    #[test]
    fn test_warmth_changes_signal() {
        let signal = test_signal(2048);
        let output = apply_formants(&signal, Some('a'), 1.0, 1.0, 22_050.0);
        assert_ne!(output, signal);
    }

    #[test]
    fn test_formant_boost_raises_band_energy() {
        // Sine at F1 of /a/ should gain energy; a far-off sine should not.
        let sample_rate = 22_050.0;
        let sine_at = |freq: f64| -> Vec<f64> {
            (0..8000)
                .map(|i| (2.0 * std::f64::consts::PI * freq * i as f64 / sample_rate).sin() * 0.2)
                .collect()
        };

        let energy = |s: &[f64]| s.iter().map(|v| v * v).sum::<f64>();

        let at_formant = sine_at(700.0);
        let off_formant = sine_at(5_000.0);

        let boosted = apply_formants(&at_formant, Some('a'), 1.0, 1.0, sample_rate);
        let untouched = apply_formants(&off_formant, Some('a'), 1.0, 1.0, sample_rate);

        let formant_gain = energy(&boosted) / energy(&at_formant);
        let off_gain = energy(&untouched) / energy(&off_formant);

        assert!(formant_gain > 2.0);
        assert!(off_gain < 1.5);
    }

    #[test]
    fn test_unknown_vowel_falls_back_to_a() {
        let a = formants_for(Some('a'));
        let unknown = formants_for(Some('x'));
        for (x, y) in a.iter().zip(unknown.iter()) {
            assert_eq!(x.frequency, y.frequency);
        }
    }

    #[test]
    fn test_each_vowel_has_distinct_f2() {
        let f2: Vec<f64> = ['a', 'e', 'i', 'o', 'u']
            .iter()
            .map(|&v| formants_for(Some(v))[1].frequency)
            .collect();
        for i in 0..f2.len() {
            for j in (i + 1)..f2.len() {
                assert_ne!(f2[i], f2[j]);
            }
        }
    }

    #[test]
    fn test_extreme_shift_stays_below_ceiling() {
        // At a 8 kHz rate the upper formants hit the clamp; output must
        // still be finite and clean.
        let signal = test_signal(1024);
        let output = apply_formants(&signal, Some('i'), 1.0, 2.0, 8_000.0);
        assert!(output.iter().all(|s| s.is_finite()));
    }
}
