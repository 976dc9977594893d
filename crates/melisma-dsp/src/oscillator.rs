//! Phase-continuous oscillator primitives.
//!
//! The singing pipeline drives everything from instantaneous frequency
//! curves, so the accumulator here is the one place phase is advanced:
//! frequency can change every sample (glides, vibrato, jitter) without a
//! click.

use rand::Rng;
use rand_pcg::Pcg32;

/// Full circle in radians.
pub const TWO_PI: f64 = std::f64::consts::TAU;

/// Accumulates phase from a per-sample frequency.
#[derive(Debug, Clone)]
pub struct PhaseAccumulator {
    phase: f64,
    sample_rate: f64,
}

impl PhaseAccumulator {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            phase: 0.0,
            sample_rate,
        }
    }

    /// Sets the phase directly, in radians.
    pub fn set_phase_radians(&mut self, phase: f64) {
        self.phase = phase.rem_euclid(TWO_PI);
    }

    /// Returns the current phase, then advances by one sample of `frequency`.
    ///
    /// The returned phase is in [0, 2*pi). The first call after construction
    /// returns 0 so a sine starts at a zero crossing.
    #[inline]
    pub fn advance(&mut self, frequency: f64) -> f64 {
        let current = self.phase;
        self.phase += TWO_PI * frequency / self.sample_rate;
        while self.phase >= TWO_PI {
            self.phase -= TWO_PI;
        }
        current
    }
}

/// Sine waveform at the given phase (radians).
#[inline]
pub fn sine(phase: f64) -> f64 {
    phase.sin()
}

/// Generates uniform white noise in [-1, 1].
pub fn white_noise(rng: &mut Pcg32, num_samples: usize) -> Vec<f64> {
    (0..num_samples).map(|_| rng.gen::<f64>() * 2.0 - 1.0).collect()
}
