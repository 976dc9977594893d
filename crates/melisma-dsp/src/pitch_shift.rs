//! Phase-vocoder pitch shifting.
//!
//! Shifts real recordings by a semitone amount while preserving duration.
//! Analysis frames are Hann-windowed FFTs; each bin's true frequency is
//! recovered from its phase increment, scaled by the pitch ratio, and
//! re-accumulated into the synthesis phase, so transposed audio keeps
//! phase coherence instead of the metallic smear of naive bin copying.

use std::f64::consts::PI;

use rustfft::{num_complex::Complex, FftPlanner};

/// Analysis/synthesis FFT length.
const FFT_SIZE: usize = 2048;
/// Hop between frames.
const HOP_SIZE: usize = 512;

/// Wraps a phase difference into (-pi, pi].
fn wrap_phase(phase: f64) -> f64 {
    let wrapped = phase.rem_euclid(2.0 * PI);
    if wrapped > PI {
        wrapped - 2.0 * PI
    } else {
        wrapped
    }
}

/// Pitch-shifts mono audio by `semitones`, preserving length.
///
/// Positive semitones shift up. Input shorter than one analysis frame is
/// returned unchanged (there is nothing meaningful to transpose), as is a
/// shift of zero.
pub fn pitch_shift(samples: &[f64], sample_rate: f64, semitones: f64) -> Vec<f64> {
    if samples.len() < FFT_SIZE || semitones == 0.0 || sample_rate <= 0.0 {
        return samples.to_vec();
    }

    let ratio = 2.0_f64.powf(semitones / 12.0);
    let num_bins = FFT_SIZE / 2 + 1;

    let window: Vec<f64> = (0..FFT_SIZE)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / FFT_SIZE as f64).cos()))
        .collect();

    let mut planner = FftPlanner::new();
    let fft_forward = planner.plan_fft_forward(FFT_SIZE);
    let fft_inverse = planner.plan_fft_inverse(FFT_SIZE);

    // Expected phase advance per hop for each bin
    let expected: Vec<f64> = (0..num_bins)
        .map(|k| 2.0 * PI * k as f64 * HOP_SIZE as f64 / FFT_SIZE as f64)
        .collect();

    let mut prev_phase = vec![0.0_f64; num_bins];
    let mut phase_accum = vec![0.0_f64; num_bins];

    let mut output = vec![0.0_f64; samples.len() + FFT_SIZE];
    let mut window_sum = vec![0.0_f64; samples.len() + FFT_SIZE];

    let mut frame_start = 0;
    while frame_start + FFT_SIZE <= samples.len() {
        let mut buffer: Vec<Complex<f64>> = (0..FFT_SIZE)
            .map(|i| Complex::new(samples[frame_start + i] * window[i], 0.0))
            .collect();
        fft_forward.process(&mut buffer);

        // Analysis: true frequency of each bin, in bin units
        let mut magnitudes = vec![0.0_f64; num_bins];
        let mut true_freqs = vec![0.0_f64; num_bins];
        for k in 0..num_bins {
            magnitudes[k] = buffer[k].norm();
            let phase = buffer[k].arg();
            let deviation = wrap_phase(phase - prev_phase[k] - expected[k]);
            prev_phase[k] = phase;
            true_freqs[k] =
                k as f64 + deviation * FFT_SIZE as f64 / (2.0 * PI * HOP_SIZE as f64);
        }

        // Shift: move each bin's energy to the scaled bin
        let mut shifted_mags = vec![0.0_f64; num_bins];
        let mut shifted_freqs = vec![0.0_f64; num_bins];
        for k in 0..num_bins {
            let target = (k as f64 * ratio).round() as usize;
            if target < num_bins {
                shifted_mags[target] += magnitudes[k];
                shifted_freqs[target] = true_freqs[k] * ratio;
            }
        }

        // Synthesis: re-accumulate phase at the shifted frequencies
        let mut synth = vec![Complex::new(0.0, 0.0); FFT_SIZE];
        for k in 0..num_bins {
            phase_accum[k] +=
                2.0 * PI * shifted_freqs[k] * HOP_SIZE as f64 / FFT_SIZE as f64;
            let value = Complex::from_polar(shifted_mags[k], phase_accum[k]);
            synth[k] = value;
            if k > 0 && k < FFT_SIZE / 2 {
                synth[FFT_SIZE - k] = value.conj();
            }
        }
        fft_inverse.process(&mut synth);

        // Overlap-add, tracking the window power for later normalization
        for i in 0..FFT_SIZE {
            let sample = synth[i].re / FFT_SIZE as f64;
            output[frame_start + i] += sample * window[i];
            window_sum[frame_start + i] += window[i] * window[i];
        }

        frame_start += HOP_SIZE;
    }

    let mut result = Vec::with_capacity(samples.len());
    for i in 0..samples.len() {
        if window_sum[i] > 1e-9 {
            result.push(output[i] / window_sum[i]);
        } else {
            result.push(0.0);
        }
    }
    result
}

/// Semitone distance from `base_hz` up to `target_hz`.
///
/// The ratio form of `12 * log2(target / base)`; non-positive inputs give 0
/// so degenerate sample metadata never produces a NaN shift.
pub fn semitone_offset(base_hz: f64, target_hz: f64) -> f64 {
    if base_hz <= 0.0 || target_hz <= 0.0 {
        return 0.0;
    }
    12.0 * (target_hz / base_hz).log2()
}
