//! Biquad filters for formant shaping and noise coloring.
//!
//! Coefficients follow the Audio EQ Cookbook. The peaking EQ is the
//! workhorse: a chain of them tuned to vowel formants turns the flat
//! glottal spectrum into a voice.

use std::f64::consts::PI;

/// Biquad filter coefficients, normalized so a0 = 1.
#[derive(Debug, Clone, Copy)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

/// Shared cookbook intermediates for a frequency/Q pair.
fn cookbook(frequency: f64, q: f64, sample_rate: f64) -> (f64, f64, f64) {
    // Q below 0.5 would blow up alpha
    let q = q.max(0.5);
    let omega = 2.0 * PI * frequency / sample_rate;
    let sin_omega = omega.sin();
    let cos_omega = omega.cos();
    let alpha = sin_omega / (2.0 * q);
    (sin_omega, cos_omega, alpha)
}

impl BiquadCoeffs {
    fn normalized(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Lowpass coefficients. Q of 0.707 is Butterworth.
    pub fn lowpass(cutoff: f64, q: f64, sample_rate: f64) -> Self {
        let (_, cos_omega, alpha) = cookbook(cutoff, q, sample_rate);
        Self::normalized(
            (1.0 - cos_omega) / 2.0,
            1.0 - cos_omega,
            (1.0 - cos_omega) / 2.0,
            1.0 + alpha,
            -2.0 * cos_omega,
            1.0 - alpha,
        )
    }

    /// Highpass coefficients.
    pub fn highpass(cutoff: f64, q: f64, sample_rate: f64) -> Self {
        let (_, cos_omega, alpha) = cookbook(cutoff, q, sample_rate);
        Self::normalized(
            (1.0 + cos_omega) / 2.0,
            -(1.0 + cos_omega),
            (1.0 + cos_omega) / 2.0,
            1.0 + alpha,
            -2.0 * cos_omega,
            1.0 - alpha,
        )
    }

    /// Bandpass coefficients (constant skirt gain, bandwidth = center / Q).
    pub fn bandpass(center: f64, q: f64, sample_rate: f64) -> Self {
        let (_, cos_omega, alpha) = cookbook(center, q, sample_rate);
        Self::normalized(
            alpha,
            0.0,
            -alpha,
            1.0 + alpha,
            -2.0 * cos_omega,
            1.0 - alpha,
        )
    }

    /// Peaking EQ coefficients: boost (or cut) `db_gain` dB at `frequency`.
    ///
    /// At 0 dB the filter is an exact pass-through, which is what makes a
    /// formant chain collapse to identity when warmth is zero.
    pub fn peaking_eq(frequency: f64, q: f64, db_gain: f64, sample_rate: f64) -> Self {
        let a = 10.0_f64.powf(db_gain / 40.0);
        let (_, cos_omega, alpha) = cookbook(frequency, q, sample_rate);
        Self::normalized(
            1.0 + alpha * a,
            -2.0 * cos_omega,
            1.0 - alpha * a,
            1.0 + alpha / a,
            -2.0 * cos_omega,
            1.0 - alpha / a,
        )
    }
}

/// Biquad filter state (direct form I).
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    coeffs: BiquadCoeffs,
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl BiquadFilter {
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    pub fn lowpass(cutoff: f64, q: f64, sample_rate: f64) -> Self {
        Self::new(BiquadCoeffs::lowpass(cutoff, q, sample_rate))
    }

    pub fn highpass(cutoff: f64, q: f64, sample_rate: f64) -> Self {
        Self::new(BiquadCoeffs::highpass(cutoff, q, sample_rate))
    }

    /// Clears the delay lines.
    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }

    /// Processes a single sample.
    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let output = self.coeffs.b0 * input + self.coeffs.b1 * self.x1 + self.coeffs.b2 * self.x2
            - self.coeffs.a1 * self.y1
            - self.coeffs.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }

    /// Processes a buffer in place.
    pub fn process_buffer(&mut self, buffer: &mut [f64]) {
        for sample in buffer.iter_mut() {
            *sample = self.process(*sample);
        }
    }
}

/// One-pole lowpass (simple RC smoother).
///
/// Cheap enough for per-sample envelope following and breath coloring.
#[derive(Debug, Clone)]
pub struct OnePoleFilter {
    a0: f64,
    b1: f64,
    y1: f64,
}

impl OnePoleFilter {
    pub fn new(cutoff: f64, sample_rate: f64) -> Self {
        let b1 = (-2.0 * PI * cutoff / sample_rate).exp();
        Self {
            a0: 1.0 - b1,
            b1,
            y1: 0.0,
        }
    }

    pub fn reset(&mut self) {
        self.y1 = 0.0;
    }

    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        self.y1 = self.a0 * input + self.b1 * self.y1;
        self.y1
    }
}
