//! Spectral feature extraction.
//!
//! Everything the trainer and analyzer need to describe a recording:
//! framewise FFT magnitudes, centroid and rolloff, zero-crossing rate, an
//! autocorrelation f0 track, 40-band mel energies, 13 MFCCs, and a 12-bin
//! chroma fold. [`FeatureVector::extract`] aggregates the framewise values
//! by time-mean into one fixed-length vector per recording.

use std::f64::consts::PI;

use rustfft::{num_complex::Complex, FftPlanner};

/// Analysis frame length in samples.
pub const FRAME_SIZE: usize = 2048;
/// Hop between analysis frames in samples.
pub const HOP_SIZE: usize = 512;

/// Number of MFCC coefficients kept.
pub const MFCC_COUNT: usize = 13;
/// Number of mel filterbank bands.
pub const MEL_BANDS: usize = 40;
/// Number of chroma pitch classes.
pub const CHROMA_BINS: usize = 12;
/// Length of the aggregate feature vector: MFCC + mel + chroma.
pub const FEATURE_DIM: usize = MFCC_COUNT + MEL_BANDS + CHROMA_BINS;

/// f0 search band for singing voices, in Hz.
const F0_RANGE_HZ: (f64, f64) = (50.0, 1000.0);
/// Normalized autocorrelation below this counts as unvoiced.
const VOICING_THRESHOLD: f64 = 0.3;

fn hann_window(len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / len as f64).cos()))
        .collect()
}

/// Hann-windowed magnitude spectrum of one frame (positive bins only).
fn magnitude_spectrum(frame: &[f64], window: &[f64], planner: &mut FftPlanner<f64>) -> Vec<f64> {
    let fft = planner.plan_fft_forward(FRAME_SIZE);

    let mut buffer: Vec<Complex<f64>> = (0..FRAME_SIZE)
        .map(|i| {
            let sample = frame.get(i).copied().unwrap_or(0.0);
            Complex::new(sample * window[i], 0.0)
        })
        .collect();
    fft.process(&mut buffer);

    buffer[..FRAME_SIZE / 2].iter().map(|c| c.norm()).collect()
}

/// Iterates analysis frames over a signal.
///
/// Signals shorter than one frame yield a single zero-padded frame, so every
/// non-empty input produces at least one spectrum.
fn frames(samples: &[f64]) -> impl Iterator<Item = &[f64]> {
    let step = if samples.len() <= FRAME_SIZE {
        samples.len().max(1)
    } else {
        HOP_SIZE
    };
    samples
        .chunks(step)
        .scan(0usize, move |offset, _| {
            let start = *offset;
            *offset += step;
            if start >= samples.len() {
                return None;
            }
            let end = (start + FRAME_SIZE).min(samples.len());
            Some(&samples[start..end])
        })
}

/// Amplitude-weighted mean frequency of the whole signal, in Hz.
pub fn spectral_centroid(samples: &[f64], sample_rate: f64) -> f64 {
    let mean = mean_spectrum(samples);
    if mean.is_empty() {
        return 0.0;
    }
    let freq_resolution = sample_rate / FRAME_SIZE as f64;

    let mut weighted = 0.0;
    let mut total = 0.0;
    for (i, &magnitude) in mean.iter().enumerate() {
        weighted += i as f64 * freq_resolution * magnitude;
        total += magnitude;
    }

    if total > 0.0 {
        weighted / total
    } else {
        0.0
    }
}

/// Frequency below which 85% of the spectral energy sits, in Hz.
pub fn spectral_rolloff(samples: &[f64], sample_rate: f64) -> f64 {
    let mean = mean_spectrum(samples);
    if mean.is_empty() {
        return 0.0;
    }
    let freq_resolution = sample_rate / FRAME_SIZE as f64;

    let total_energy: f64 = mean.iter().map(|m| m * m).sum();
    if total_energy <= 0.0 {
        return 0.0;
    }

    let target = total_energy * 0.85;
    let mut cumulative = 0.0;
    for (i, &magnitude) in mean.iter().enumerate() {
        cumulative += magnitude * magnitude;
        if cumulative >= target {
            return i as f64 * freq_resolution;
        }
    }
    (mean.len() - 1) as f64 * freq_resolution
}

/// Fraction of adjacent sample pairs that change sign.
pub fn zero_crossing_rate(samples: &[f64]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let crossings = samples
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    crossings as f64 / (samples.len() - 1) as f64
}

/// Estimates the fundamental of one frame by normalized autocorrelation.
///
/// Returns `None` for unvoiced material: silence, noise, or a best peak
/// below the voicing threshold. The search is limited to the 50-1000 Hz
/// singing band.
pub fn estimate_f0(frame: &[f64], sample_rate: f64) -> Option<f64> {
    let min_lag = (sample_rate / F0_RANGE_HZ.1).floor() as usize;
    let max_lag = (sample_rate / F0_RANGE_HZ.0).ceil() as usize;
    if frame.len() < min_lag * 2 || min_lag == 0 {
        return None;
    }
    let max_lag = max_lag.min(frame.len() / 2);

    let energy: f64 = frame.iter().map(|s| s * s).sum();
    if energy < 1e-9 {
        return None;
    }

    let mut best_lag = 0;
    let mut best_corr = 0.0;
    for lag in min_lag..=max_lag {
        let mut corr = 0.0;
        for i in 0..frame.len() - lag {
            corr += frame[i] * frame[i + lag];
        }
        let normalized = corr / energy;
        if normalized > best_corr {
            best_corr = normalized;
            best_lag = lag;
        }
    }

    if best_corr >= VOICING_THRESHOLD && best_lag > 0 {
        Some(sample_rate / best_lag as f64)
    } else {
        None
    }
}

/// Per-frame f0 track; `None` entries are unvoiced frames.
pub fn f0_track(samples: &[f64], sample_rate: f64) -> Vec<Option<f64>> {
    frames(samples)
        .map(|frame| estimate_f0(frame, sample_rate))
        .collect()
}

/// HTK mel scale.
fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10.0_f64.powf(mel / 2595.0) - 1.0)
}

/// Triangular mel filterbank applied to a magnitude spectrum.
fn mel_energies(spectrum: &[f64], sample_rate: f64) -> [f64; MEL_BANDS] {
    let nyquist = sample_rate / 2.0;
    let mel_max = hz_to_mel(nyquist);
    let freq_resolution = sample_rate / FRAME_SIZE as f64;

    // Band edges: MEL_BANDS + 2 points evenly spaced on the mel axis
    let edges: Vec<f64> = (0..MEL_BANDS + 2)
        .map(|i| mel_to_hz(mel_max * i as f64 / (MEL_BANDS + 1) as f64))
        .collect();

    let mut energies = [0.0_f64; MEL_BANDS];
    for (band, energy) in energies.iter_mut().enumerate() {
        let (lo, center, hi) = (edges[band], edges[band + 1], edges[band + 2]);
        for (i, &magnitude) in spectrum.iter().enumerate() {
            let freq = i as f64 * freq_resolution;
            let weight = if freq >= lo && freq <= center && center > lo {
                (freq - lo) / (center - lo)
            } else if freq > center && freq <= hi && hi > center {
                (hi - freq) / (hi - center)
            } else {
                continue;
            };
            *energy += magnitude * magnitude * weight;
        }
    }
    energies
}

/// DCT-II of the log-mel energies, truncated to [`MFCC_COUNT`] coefficients.
fn mfcc_from_mel(mel: &[f64; MEL_BANDS]) -> [f64; MFCC_COUNT] {
    let log_mel: Vec<f64> = mel.iter().map(|&e| (e + 1e-10).ln()).collect();

    let mut coeffs = [0.0_f64; MFCC_COUNT];
    for (k, coeff) in coeffs.iter_mut().enumerate() {
        *coeff = log_mel
            .iter()
            .enumerate()
            .map(|(n, &v)| v * (PI * k as f64 * (n as f64 + 0.5) / MEL_BANDS as f64).cos())
            .sum();
    }
    coeffs
}

/// Folds a magnitude spectrum into 12 pitch classes (C = class 0).
fn chroma_from_spectrum(spectrum: &[f64], sample_rate: f64) -> [f64; CHROMA_BINS] {
    let freq_resolution = sample_rate / FRAME_SIZE as f64;
    let mut chroma = [0.0_f64; CHROMA_BINS];

    for (i, &magnitude) in spectrum.iter().enumerate().skip(1) {
        let freq = i as f64 * freq_resolution;
        if !(27.5..=8000.0).contains(&freq) {
            continue;
        }
        // Semitones above A4, folded so that C lands on class 0
        let semitones = 12.0 * (freq / 440.0).log2();
        let class = ((semitones.round() as i64 + 9).rem_euclid(12)) as usize;
        chroma[class] += magnitude;
    }

    let max = chroma.iter().cloned().fold(0.0_f64, f64::max);
    if max > 0.0 {
        for c in &mut chroma {
            *c /= max;
        }
    }
    chroma
}

/// Mean magnitude spectrum across all analysis frames.
fn mean_spectrum(samples: &[f64]) -> Vec<f64> {
    if samples.is_empty() {
        return Vec::new();
    }
    let window = hann_window(FRAME_SIZE);
    let mut planner = FftPlanner::new();

    let mut sum = vec![0.0_f64; FRAME_SIZE / 2];
    let mut count = 0usize;
    for frame in frames(samples) {
        let spectrum = magnitude_spectrum(frame, &window, &mut planner);
        for (acc, v) in sum.iter_mut().zip(spectrum.iter()) {
            *acc += v;
        }
        count += 1;
    }

    if count > 0 {
        for v in &mut sum {
            *v /= count as f64;
        }
    }
    sum
}

/// Time-mean aggregate feature vector of one recording.
///
/// Layout: 13 MFCCs, 40 mel energies, 12 chroma bins, in that order.
/// The same audio always produces the same vector.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    /// Concatenated features, [`FEATURE_DIM`] long.
    pub values: Vec<f64>,
}

impl FeatureVector {
    /// Extracts the aggregate vector from mono samples.
    ///
    /// Empty input yields an all-zero vector rather than an error; the
    /// trainer filters out unusable files before this point.
    pub fn extract(samples: &[f64], sample_rate: f64) -> Self {
        if samples.is_empty() {
            return Self {
                values: vec![0.0; FEATURE_DIM],
            };
        }

        let window = hann_window(FRAME_SIZE);
        let mut planner = FftPlanner::new();

        let mut mfcc_sum = [0.0_f64; MFCC_COUNT];
        let mut mel_sum = [0.0_f64; MEL_BANDS];
        let mut chroma_sum = [0.0_f64; CHROMA_BINS];
        let mut count = 0usize;

        for frame in frames(samples) {
            let spectrum = magnitude_spectrum(frame, &window, &mut planner);
            let mel = mel_energies(&spectrum, sample_rate);
            let mfcc = mfcc_from_mel(&mel);
            let chroma = chroma_from_spectrum(&spectrum, sample_rate);

            for (acc, v) in mfcc_sum.iter_mut().zip(mfcc.iter()) {
                *acc += v;
            }
            for (acc, v) in mel_sum.iter_mut().zip(mel.iter()) {
                *acc += v;
            }
            for (acc, v) in chroma_sum.iter_mut().zip(chroma.iter()) {
                *acc += v;
            }
            count += 1;
        }

        let n = count.max(1) as f64;
        let mut values = Vec::with_capacity(FEATURE_DIM);
        values.extend(mfcc_sum.iter().map(|v| v / n));
        values.extend(mel_sum.iter().map(|v| v / n));
        values.extend(chroma_sum.iter().map(|v| v / n));

        Self { values }
    }

    /// First [`MFCC_COUNT`] values as a fixed-size MFCC array.
    pub fn mfcc(&self) -> [f64; MFCC_COUNT] {
        let mut out = [0.0; MFCC_COUNT];
        out.copy_from_slice(&self.values[..MFCC_COUNT]);
        out
    }
}
