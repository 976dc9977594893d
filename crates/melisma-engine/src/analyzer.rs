//! Voice characteristics analysis of training recordings.
//!
//! Each file is decoded, downmixed, resampled to the conversion rate, and
//! measured: fundamental and pitch range from the autocorrelation f0 track,
//! vibrato rate and depth from the track's modulation, spectral centroid
//! and rolloff, zero-crossing rate, MFCCs, and loudness-derived scalars.
//! Re-analysis of the same file is deterministic. [`analyze_recording`] is
//! the single ingest path; the training worker builds on it and
//! mean-aggregates the per-file measurements.

use std::fs;
use std::path::Path;

use tracing::debug;

use melisma_dsp::features::{
    f0_track, spectral_centroid, spectral_rolloff, zero_crossing_rate, FeatureVector, HOP_SIZE,
};
use melisma_dsp::wav::{decode_wav, resample_linear};
use melisma_dsp::CONVERSION_SAMPLE_RATE;
use melisma_voice::VoiceCharacteristics;

use crate::error::{EngineError, EngineResult};

/// Recordings shorter than this are rejected as unusable.
const MIN_USABLE_SECONDS: f64 = 0.25;

/// One training recording after ingest: conversion-rate mono samples and
/// everything measured from them.
pub struct AnalyzedRecording {
    pub samples: Vec<f64>,
    pub characteristics: VoiceCharacteristics,
    pub features: Vec<f64>,
}

/// Decodes, resamples, and measures one training recording.
pub fn analyze_recording(path: &Path) -> EngineResult<AnalyzedRecording> {
    let bytes = fs::read(path)?;
    let decoded = decode_wav(&bytes).map_err(|err| EngineError::InsufficientTrainingData {
        reason: format!("{}: {err}", path.display()),
    })?;

    if decoded.duration_seconds() < MIN_USABLE_SECONDS {
        return Err(EngineError::InsufficientTrainingData {
            reason: format!("{}: shorter than {MIN_USABLE_SECONDS}s", path.display()),
        });
    }

    let samples = resample_linear(
        &decoded.samples,
        decoded.sample_rate,
        CONVERSION_SAMPLE_RATE,
    );
    let rate = CONVERSION_SAMPLE_RATE as f64;
    Ok(AnalyzedRecording {
        characteristics: analyze_samples(&samples, rate),
        features: FeatureVector::extract(&samples, rate).values,
        samples,
    })
}

/// Measures mono samples already at the analysis rate.
pub fn analyze_samples(samples: &[f64], sample_rate: f64) -> VoiceCharacteristics {
    let track = f0_track(samples, sample_rate);
    let voiced: Vec<f64> = track.iter().filter_map(|f| *f).collect();

    let fundamental_hz = percentile(&voiced, 0.5).unwrap_or(220.0);
    let pitch_range_hz = (
        percentile(&voiced, 0.05).unwrap_or(fundamental_hz * 0.8),
        percentile(&voiced, 0.95).unwrap_or(fundamental_hz * 1.25),
    );

    let frame_rate = sample_rate / HOP_SIZE as f64;
    let (vibrato_rate_hz, vibrato_depth) =
        vibrato_from_track(&voiced, fundamental_hz, frame_rate);

    let centroid = spectral_centroid(samples, sample_rate);
    let rolloff = spectral_rolloff(samples, sample_rate);
    let zcr = zero_crossing_rate(samples);
    let mfcc = FeatureVector::extract(samples, sample_rate).mfcc();

    let (energy, dynamics) = loudness_scalars(samples, sample_rate);

    debug!(
        fundamental_hz,
        centroid, rolloff, zcr, "analyzed training audio"
    );

    VoiceCharacteristics {
        fundamental_hz,
        // A shorter vocal tract raises both the fundamental and the
        // formants; anchor the shift at the 220 Hz default voice.
        formant_shift: (fundamental_hz / 220.0).sqrt(),
        spectral_centroid_hz: centroid,
        spectral_rolloff_hz: rolloff,
        zero_crossing_rate: zcr,
        vibrato_rate_hz,
        vibrato_depth,
        texture: (zcr * 5.0).clamp(0.0, 1.0),
        warmth: (1.0 - centroid / 5_000.0).clamp(0.0, 1.0),
        dynamics,
        energy,
        mfcc: Some(mfcc),
        pitch_range_hz,
    }
    .sanitized()
}

/// Percentile of an unsorted sample set; `None` when empty.
fn percentile(values: &[f64], fraction: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let index = ((sorted.len() - 1) as f64 * fraction).round() as usize;
    Some(sorted[index])
}

/// Vibrato rate and depth from the voiced f0 track.
///
/// Rate comes from sign changes of the mean-removed track (two crossings
/// per modulation cycle); depth is the track's relative standard deviation.
/// Tracks too short to measure fall back to gentle defaults.
fn vibrato_from_track(voiced: &[f64], fundamental: f64, frame_rate: f64) -> (f64, f64) {
    if voiced.len() < 8 || fundamental <= 0.0 {
        return (5.5, 0.02);
    }

    let mean = voiced.iter().sum::<f64>() / voiced.len() as f64;
    let deviations: Vec<f64> = voiced.iter().map(|f| f - mean).collect();

    let crossings = deviations
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    let seconds = voiced.len() as f64 / frame_rate;
    let rate = if seconds > 0.0 {
        crossings as f64 / (2.0 * seconds)
    } else {
        5.5
    };

    let variance = deviations.iter().map(|d| d * d).sum::<f64>() / deviations.len() as f64;
    let depth = variance.sqrt() / fundamental;

    (rate.clamp(3.0, 8.0), depth.clamp(0.0, 0.1))
}

/// Overall energy and loudness variability, both normalized to [0, 1].
fn loudness_scalars(samples: &[f64], sample_rate: f64) -> (f64, f64) {
    if samples.is_empty() {
        return (0.0, 0.0);
    }
    let window = (sample_rate * 0.05) as usize;
    let window = window.max(1);

    let frame_rms: Vec<f64> = samples
        .chunks(window)
        .map(|chunk| (chunk.iter().map(|s| s * s).sum::<f64>() / chunk.len() as f64).sqrt())
        .collect();

    let mean_rms = frame_rms.iter().sum::<f64>() / frame_rms.len() as f64;
    let variance = frame_rms
        .iter()
        .map(|r| (r - mean_rms) * (r - mean_rms))
        .sum::<f64>()
        / frame_rms.len() as f64;

    let energy = (mean_rms * 3.0).clamp(0.0, 1.0);
    let dynamics = if mean_rms > 0.0 {
        (variance.sqrt() / mean_rms).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (energy, dynamics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use melisma_dsp::wav::WavResult;
    use std::f64::consts::PI;

    fn voice_like(freq: f64, seconds: f64, rate: f64) -> Vec<f64> {
        // Tone with 5 Hz vibrato, enough like a held note for the analyzer
        let n = (seconds * rate) as usize;
        let mut phase = 0.0_f64;
        (0..n)
            .map(|i| {
                let t = i as f64 / rate;
                let instantaneous = freq * (1.0 + 0.02 * (2.0 * PI * 5.0 * t).sin());
                phase += 2.0 * PI * instantaneous / rate;
                phase.sin() * 0.4
            })
            .collect()
    }

    #[test]
    fn test_analyze_samples_finds_fundamental() {
        let rate = CONVERSION_SAMPLE_RATE as f64;
        let c = analyze_samples(&voice_like(220.0, 1.0, rate), rate);
        assert!((c.fundamental_hz - 220.0).abs() < 15.0);
        assert!(c.pitch_range_hz.0 <= c.fundamental_hz);
        assert!(c.pitch_range_hz.1 >= c.fundamental_hz);
        assert!(c.mfcc.is_some());
    }

    #[test]
    fn test_analyze_samples_is_deterministic() {
        let rate = CONVERSION_SAMPLE_RATE as f64;
        let signal = voice_like(196.0, 0.8, rate);
        assert_eq!(
            analyze_samples(&signal, rate),
            analyze_samples(&signal, rate)
        );
    }

    #[test]
    fn test_analyze_recording_round_trip() {
        let rate = 22_050.0;
        let signal = voice_like(220.0, 1.0, rate);
        let wav = WavResult::from_mono(&signal, 22_050);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("take.wav");
        fs::write(&path, &wav.wav_data).unwrap();

        let analyzed = analyze_recording(&path).unwrap();
        assert!((analyzed.characteristics.fundamental_hz - 220.0).abs() < 20.0);
        // Resampled to the conversion rate, with features alongside
        assert_eq!(analyzed.samples.len(), CONVERSION_SAMPLE_RATE as usize);
        assert!(!analyzed.features.is_empty());
    }

    #[test]
    fn test_analyze_recording_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.wav");
        fs::write(&path, b"not audio at all").unwrap();
        assert!(matches!(
            analyze_recording(&path),
            Err(EngineError::InsufficientTrainingData { .. })
        ));
    }

    #[test]
    fn test_analyze_recording_rejects_too_short() {
        let rate = 22_050.0;
        let wav = WavResult::from_mono(&voice_like(220.0, 0.1, rate), 22_050);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blip.wav");
        fs::write(&path, &wav.wav_data).unwrap();

        assert!(matches!(
            analyze_recording(&path),
            Err(EngineError::InsufficientTrainingData { .. })
        ));
    }

    #[test]
    fn test_percentile() {
        let values = vec![3.0, 1.0, 2.0, 4.0, 5.0];
        assert_eq!(percentile(&values, 0.5), Some(3.0));
        assert_eq!(percentile(&values, 0.0), Some(1.0));
        assert_eq!(percentile(&values, 1.0), Some(5.0));
        assert_eq!(percentile(&[], 0.5), None);
    }

    #[test]
    fn test_loudness_scalars_of_silence() {
        assert_eq!(loudness_scalars(&vec![0.0; 4000], 40_000.0), (0.0, 0.0));
    }
}
