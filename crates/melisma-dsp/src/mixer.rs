//! Normalization, clipping, and buffer mixing.

/// Default full-scale peak for finished phrases.
pub const TARGET_PEAK: f64 = 0.8;

/// Normalizes audio to an absolute peak level.
///
/// Silence is left untouched.
pub fn peak_normalize(samples: &mut [f64], target_peak: f64) {
    let current_peak = samples
        .iter()
        .map(|s| s.abs())
        .fold(0.0_f64, |a, b| a.max(b));

    if current_peak > 0.0 {
        let gain = target_peak / current_peak;
        for sample in samples.iter_mut() {
            *sample *= gain;
        }
    }
}

/// Applies soft clipping to prevent harsh digital distortion.
///
/// Below `threshold` the signal passes unchanged; the excess is compressed
/// exponentially toward full scale.
#[inline]
pub fn soft_clip(sample: f64, threshold: f64) -> f64 {
    let abs = sample.abs();
    if abs <= threshold {
        sample
    } else {
        let sign = sample.signum();
        let excess = abs - threshold;
        let compressed = threshold + (1.0 - threshold) * (1.0 - (-excess * 3.0).exp());
        sign * compressed
    }
}

/// Applies soft clipping to a buffer.
pub fn soft_clip_buffer(samples: &mut [f64], threshold: f64) {
    for sample in samples.iter_mut() {
        *sample = soft_clip(*sample, threshold);
    }
}

/// Adds `src` into `dst` starting at `offset`, growing `dst` if needed.
pub fn overlay(dst: &mut Vec<f64>, src: &[f64], offset: usize) {
    let needed = offset + src.len();
    if dst.len() < needed {
        dst.resize(needed, 0.0);
    }
    for (i, &s) in src.iter().enumerate() {
        dst[offset + i] += s;
    }
}
