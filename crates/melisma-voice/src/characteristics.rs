//! Acoustic characteristics describing a singing voice.
//!
//! All values are kept in physically sensible ranges by clamping at
//! construction time, so downstream synthesis never has to re-validate.

use serde::{Deserialize, Serialize};

/// Fundamental frequency bounds for a human singing voice, in Hz.
pub const FUNDAMENTAL_RANGE_HZ: (f64, f64) = (50.0, 1000.0);
/// Formant shift multiplier bounds.
pub const FORMANT_SHIFT_RANGE: (f64, f64) = (0.5, 2.0);
/// Spectral measurements top out at the analysis Nyquist (40 kHz material).
pub const SPECTRAL_CEILING_HZ: f64 = 20_000.0;
/// Vibrato rate bounds in Hz.
pub const VIBRATO_RATE_RANGE_HZ: (f64, f64) = (3.0, 8.0);
/// Vibrato depth bounds as a fraction of the fundamental.
pub const VIBRATO_DEPTH_RANGE: (f64, f64) = (0.0, 0.1);

/// Gender lean transition band: fundamentals at or below the low edge map
/// to 0.0, at or above the high edge to 1.0.
const GENDER_LEAN_BAND_HZ: (f64, f64) = (165.0, 255.0);

/// Measured acoustic profile of one voice.
///
/// Produced by analysis of training samples or seeded synthetically for the
/// builtin voices. Every numeric field is clamped into its documented range
/// by [`VoiceCharacteristics::sanitized`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceCharacteristics {
    /// Median fundamental frequency in Hz, within [50, 1000].
    pub fundamental_hz: f64,
    /// Formant center multiplier, within [0.5, 2.0]. 1.0 is neutral.
    pub formant_shift: f64,
    /// Amplitude-weighted spectral centroid in Hz, within [0, 20000].
    pub spectral_centroid_hz: f64,
    /// 85% energy rolloff frequency in Hz, within [0, 20000].
    pub spectral_rolloff_hz: f64,
    /// Mean zero-crossing rate, within [0, 1].
    pub zero_crossing_rate: f64,
    /// Vibrato oscillation rate in Hz, within [3, 8].
    pub vibrato_rate_hz: f64,
    /// Vibrato depth as a fraction of the fundamental, within [0, 0.1].
    pub vibrato_depth: f64,
    /// Breathiness and roughness blend, within [0, 1].
    pub texture: f64,
    /// Low-formant emphasis, within [0, 1]. 0.0 disables formant shaping.
    pub warmth: f64,
    /// Loudness variability, within [0, 1].
    pub dynamics: f64,
    /// Overall energy, within [0, 1].
    pub energy: f64,
    /// Mean MFCC vector from analysis, absent for synthetic seeds.
    pub mfcc: Option<[f64; 13]>,
    /// Comfortable pitch range (low Hz, high Hz), low <= high.
    pub pitch_range_hz: (f64, f64),
}

impl Default for VoiceCharacteristics {
    fn default() -> Self {
        Self {
            fundamental_hz: 220.0,
            formant_shift: 1.0,
            spectral_centroid_hz: 2_000.0,
            spectral_rolloff_hz: 5_000.0,
            zero_crossing_rate: 0.1,
            vibrato_rate_hz: 5.5,
            vibrato_depth: 0.02,
            texture: 0.3,
            warmth: 0.5,
            dynamics: 0.5,
            energy: 0.5,
            mfcc: None,
            pitch_range_hz: (160.0, 320.0),
        }
    }
}

impl VoiceCharacteristics {
    /// Returns a copy with every field clamped into its documented range.
    pub fn sanitized(mut self) -> Self {
        self.fundamental_hz = self
            .fundamental_hz
            .clamp(FUNDAMENTAL_RANGE_HZ.0, FUNDAMENTAL_RANGE_HZ.1);
        self.formant_shift = self
            .formant_shift
            .clamp(FORMANT_SHIFT_RANGE.0, FORMANT_SHIFT_RANGE.1);
        self.spectral_centroid_hz = self.spectral_centroid_hz.clamp(0.0, SPECTRAL_CEILING_HZ);
        self.spectral_rolloff_hz = self.spectral_rolloff_hz.clamp(0.0, SPECTRAL_CEILING_HZ);
        self.zero_crossing_rate = self.zero_crossing_rate.clamp(0.0, 1.0);
        self.vibrato_rate_hz = self
            .vibrato_rate_hz
            .clamp(VIBRATO_RATE_RANGE_HZ.0, VIBRATO_RATE_RANGE_HZ.1);
        self.vibrato_depth = self
            .vibrato_depth
            .clamp(VIBRATO_DEPTH_RANGE.0, VIBRATO_DEPTH_RANGE.1);
        self.texture = self.texture.clamp(0.0, 1.0);
        self.warmth = self.warmth.clamp(0.0, 1.0);
        self.dynamics = self.dynamics.clamp(0.0, 1.0);
        self.energy = self.energy.clamp(0.0, 1.0);

        let (low, high) = self.pitch_range_hz;
        let low = low.clamp(FUNDAMENTAL_RANGE_HZ.0, FUNDAMENTAL_RANGE_HZ.1);
        let high = high.clamp(FUNDAMENTAL_RANGE_HZ.0, FUNDAMENTAL_RANGE_HZ.1);
        self.pitch_range_hz = if low <= high { (low, high) } else { (high, low) };

        self
    }

    /// Continuous voice register position in [0, 1].
    ///
    /// 0.0 is fully male-leaning, 1.0 fully female-leaning, with a linear
    /// transition across the 165 to 255 Hz band. Not a hard binary: a
    /// 200 Hz voice sits partway between and gets intermediate source
    /// settings (jitter, tilt, pulse asymmetry).
    pub fn gender_lean(&self) -> f64 {
        let (low, high) = GENDER_LEAN_BAND_HZ;
        ((self.fundamental_hz - low) / (high - low)).clamp(0.0, 1.0)
    }

    /// Field-wise mean of several measurements, sanitized.
    ///
    /// An empty slice yields the default characteristics. The MFCC mean is
    /// taken over the entries that carry one.
    pub fn mean_of(all: &[VoiceCharacteristics]) -> VoiceCharacteristics {
        if all.is_empty() {
            return VoiceCharacteristics::default();
        }
        let n = all.len() as f64;

        let mut mfcc_sum = [0.0_f64; 13];
        let mut mfcc_count = 0usize;
        for c in all {
            if let Some(m) = &c.mfcc {
                for (acc, v) in mfcc_sum.iter_mut().zip(m.iter()) {
                    *acc += v;
                }
                mfcc_count += 1;
            }
        }
        let mfcc = if mfcc_count > 0 {
            let mut mean = mfcc_sum;
            for v in &mut mean {
                *v /= mfcc_count as f64;
            }
            Some(mean)
        } else {
            None
        };

        VoiceCharacteristics {
            fundamental_hz: all.iter().map(|c| c.fundamental_hz).sum::<f64>() / n,
            formant_shift: all.iter().map(|c| c.formant_shift).sum::<f64>() / n,
            spectral_centroid_hz: all.iter().map(|c| c.spectral_centroid_hz).sum::<f64>() / n,
            spectral_rolloff_hz: all.iter().map(|c| c.spectral_rolloff_hz).sum::<f64>() / n,
            zero_crossing_rate: all.iter().map(|c| c.zero_crossing_rate).sum::<f64>() / n,
            vibrato_rate_hz: all.iter().map(|c| c.vibrato_rate_hz).sum::<f64>() / n,
            vibrato_depth: all.iter().map(|c| c.vibrato_depth).sum::<f64>() / n,
            texture: all.iter().map(|c| c.texture).sum::<f64>() / n,
            warmth: all.iter().map(|c| c.warmth).sum::<f64>() / n,
            dynamics: all.iter().map(|c| c.dynamics).sum::<f64>() / n,
            energy: all.iter().map(|c| c.energy).sum::<f64>() / n,
            mfcc,
            pitch_range_hz: (
                all.iter().map(|c| c.pitch_range_hz.0).sum::<f64>() / n,
                all.iter().map(|c| c.pitch_range_hz.1).sum::<f64>() / n,
            ),
        }
        .sanitized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_is_already_sanitized() {
        let c = VoiceCharacteristics::default();
        assert_eq!(c.clone().sanitized(), c);
    }

    #[test]
    fn test_sanitized_clamps_out_of_range_values() {
        let c = VoiceCharacteristics {
            fundamental_hz: 9_999.0,
            formant_shift: 0.01,
            spectral_centroid_hz: -5.0,
            spectral_rolloff_hz: 60_000.0,
            zero_crossing_rate: 2.0,
            vibrato_rate_hz: 0.5,
            vibrato_depth: 0.9,
            texture: -1.0,
            warmth: 1.5,
            dynamics: -0.2,
            energy: 7.0,
            mfcc: None,
            pitch_range_hz: (500.0, 80.0),
        }
        .sanitized();

        assert_eq!(c.fundamental_hz, 1000.0);
        assert_eq!(c.formant_shift, 0.5);
        assert_eq!(c.spectral_centroid_hz, 0.0);
        assert_eq!(c.spectral_rolloff_hz, 20_000.0);
        assert_eq!(c.zero_crossing_rate, 1.0);
        assert_eq!(c.vibrato_rate_hz, 3.0);
        assert_eq!(c.vibrato_depth, 0.1);
        assert_eq!(c.texture, 0.0);
        assert_eq!(c.warmth, 1.0);
        assert_eq!(c.dynamics, 0.0);
        assert_eq!(c.energy, 1.0);
        // Inverted range is reordered, not rejected.
        assert_eq!(c.pitch_range_hz, (80.0, 500.0));
    }

    #[test]
    fn test_gender_lean_transition_band() {
        let at = |hz: f64| VoiceCharacteristics {
            fundamental_hz: hz,
            ..VoiceCharacteristics::default()
        };
        assert_eq!(at(100.0).gender_lean(), 0.0);
        assert_eq!(at(165.0).gender_lean(), 0.0);
        assert!((at(210.0).gender_lean() - 0.5).abs() < 0.001);
        assert_eq!(at(255.0).gender_lean(), 1.0);
        assert_eq!(at(400.0).gender_lean(), 1.0);
    }

    #[test]
    fn test_mean_of_empty_is_default() {
        assert_eq!(
            VoiceCharacteristics::mean_of(&[]),
            VoiceCharacteristics::default()
        );
    }

    #[test]
    fn test_mean_of_averages_fields() {
        let a = VoiceCharacteristics {
            fundamental_hz: 100.0,
            warmth: 0.0,
            mfcc: Some([1.0; 13]),
            ..VoiceCharacteristics::default()
        };
        let b = VoiceCharacteristics {
            fundamental_hz: 300.0,
            warmth: 1.0,
            mfcc: Some([3.0; 13]),
            ..VoiceCharacteristics::default()
        };
        let mean = VoiceCharacteristics::mean_of(&[a, b]);
        assert_eq!(mean.fundamental_hz, 200.0);
        assert_eq!(mean.warmth, 0.5);
        assert_eq!(mean.mfcc, Some([2.0; 13]));
    }

    #[test]
    fn test_mean_of_skips_absent_mfcc() {
        let a = VoiceCharacteristics {
            mfcc: Some([2.0; 13]),
            ..VoiceCharacteristics::default()
        };
        let b = VoiceCharacteristics {
            mfcc: None,
            ..VoiceCharacteristics::default()
        };
        let mean = VoiceCharacteristics::mean_of(&[a, b]);
        assert_eq!(mean.mfcc, Some([2.0; 13]));
    }

    #[test]
    fn test_serde_round_trip_preserves_values() {
        let c = VoiceCharacteristics {
            fundamental_hz: 217.3251,
            vibrato_depth: 0.031_415,
            mfcc: Some([
                -1.5, 0.25, 3.125, -0.0625, 12.5, 0.001, -7.75, 2.0, 0.5, -0.125, 9.0, 1.25,
                -3.5,
            ]),
            ..VoiceCharacteristics::default()
        };
        let json = serde_json::to_string(&c).unwrap();
        let back: VoiceCharacteristics = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn test_deserialize_fills_missing_fields_with_defaults() {
        let back: VoiceCharacteristics =
            serde_json::from_str(r#"{"fundamental_hz": 180.0}"#).unwrap();
        assert_eq!(back.fundamental_hz, 180.0);
        assert_eq!(back.warmth, VoiceCharacteristics::default().warmth);
    }
}
