//! Vocal texture: the humanization layer.
//!
//! A bare source-plus-formant render sounds like an organ pipe. This
//! module adds the things a listener reads as "a person singing": pitch
//! vibrato with per-cycle depth wobble, amplitude tremolo, lowpassed
//! breath noise, a chest resonance hum, and a short mono room tail.

use rand::Rng;
use rand_pcg::Pcg32;

use melisma_voice::VoiceCharacteristics;

use crate::filter::OnePoleFilter;
use crate::mixer::soft_clip_buffer;
use crate::oscillator::{sine, white_noise, PhaseAccumulator};

/// Breath noise keeps only content below this cutoff.
const BREATH_CUTOFF_HZ: f64 = 1_800.0;
/// Ceiling for the room-tail wet mix.
const MAX_AIR_WET: f64 = 0.12;

/// Texture settings derived from a voice.
#[derive(Debug, Clone)]
pub struct TextureParams {
    /// Amplitude tremolo rate, 4.5 to 5.5 Hz.
    pub tremolo_rate_hz: f64,
    /// Tremolo depth, 2 to 3 percent.
    pub tremolo_depth: f64,
    /// Breath noise level.
    pub breath_level: f64,
    /// Chest resonance frequency, 60 to 180 Hz.
    pub chest_hz: f64,
    /// Chest resonance level.
    pub chest_level: f64,
    /// Room tail wet mix, at most [`MAX_AIR_WET`].
    pub air_wet: f64,
}

impl TextureParams {
    /// Maps measured characteristics onto texture settings.
    pub fn for_voice(characteristics: &VoiceCharacteristics) -> Self {
        let c = characteristics;
        Self {
            tremolo_rate_hz: 4.5 + c.dynamics,
            tremolo_depth: 0.02 + 0.01 * c.dynamics,
            breath_level: 0.08 * c.texture,
            chest_hz: (c.fundamental_hz * 0.5).clamp(60.0, 180.0),
            chest_level: 0.04 * c.warmth,
            air_wet: (0.04 + 0.08 * c.texture).min(MAX_AIR_WET),
        }
    }
}

/// Builds a vibrato-modulated pitch curve around a base frequency.
///
/// The modulation is a sinusoid at `rate_hz` whose depth is redrawn within
/// +/-15% at every cycle, which keeps the vibrato from sounding like a
/// test tone. Depth is a fraction of the base frequency.
pub fn vibrato_curve(
    base_hz: f64,
    num_samples: usize,
    sample_rate: f64,
    rate_hz: f64,
    depth: f64,
    rng: &mut Pcg32,
) -> Vec<f64> {
    let mut curve = Vec::with_capacity(num_samples);
    let mut phase_acc = PhaseAccumulator::new(sample_rate);
    let mut cycle_scale = 1.0;
    let mut last_phase = 0.0;

    for _ in 0..num_samples {
        let phase = phase_acc.advance(rate_hz);
        if phase < last_phase {
            // New vibrato cycle
            cycle_scale = 0.85 + rng.gen::<f64>() * 0.3;
        }
        last_phase = phase;

        curve.push(base_hz * (1.0 + depth * cycle_scale * sine(phase)));
    }

    curve
}

/// Short mono room tail: parallel combs into serial allpasses.
///
/// A reduction of the classic Freeverb topology to a single channel with
/// half the units, enough "air" to take the synthetic edge off without
/// sounding like a hall.
struct AirTail {
    combs: Vec<CombFilter>,
    allpasses: Vec<AllpassFilter>,
}

const COMB_TUNINGS: [usize; 4] = [1116, 1277, 1422, 1617];
const ALLPASS_TUNINGS: [usize; 2] = [556, 341];
const AIR_INPUT_GAIN: f64 = 0.03;
const AIR_FEEDBACK: f64 = 0.78;
const AIR_DAMPING: f64 = 0.2;

struct CombFilter {
    buffer: Vec<f64>,
    index: usize,
    filter_store: f64,
}

impl CombFilter {
    fn new(size: usize) -> Self {
        Self {
            buffer: vec![0.0; size.max(1)],
            index: 0,
            filter_store: 0.0,
        }
    }

    fn process(&mut self, input: f64) -> f64 {
        let output = self.buffer[self.index];

        // One-pole lowpass in the feedback path
        self.filter_store = output * (1.0 - AIR_DAMPING) + self.filter_store * AIR_DAMPING;
        self.buffer[self.index] = input + self.filter_store * AIR_FEEDBACK;

        self.index += 1;
        if self.index >= self.buffer.len() {
            self.index = 0;
        }

        output
    }
}

struct AllpassFilter {
    buffer: Vec<f64>,
    index: usize,
}

impl AllpassFilter {
    fn new(size: usize) -> Self {
        Self {
            buffer: vec![0.0; size.max(1)],
            index: 0,
        }
    }

    fn process(&mut self, input: f64) -> f64 {
        let buffered = self.buffer[self.index];
        let output = buffered - input;

        self.buffer[self.index] = input + buffered * 0.5;

        self.index += 1;
        if self.index >= self.buffer.len() {
            self.index = 0;
        }

        output
    }
}

impl AirTail {
    fn new(sample_rate: f64) -> Self {
        // Tunings are in samples at 44.1 kHz
        let scale = sample_rate / 44_100.0;
        Self {
            combs: COMB_TUNINGS
                .iter()
                .map(|&size| CombFilter::new((size as f64 * scale) as usize))
                .collect(),
            allpasses: ALLPASS_TUNINGS
                .iter()
                .map(|&size| AllpassFilter::new((size as f64 * scale) as usize))
                .collect(),
        }
    }

    fn process(&mut self, input: f64) -> f64 {
        let driven = input * AIR_INPUT_GAIN;

        let mut out = 0.0;
        for comb in &mut self.combs {
            out += comb.process(driven);
        }
        for allpass in &mut self.allpasses {
            out = allpass.process(out);
        }
        out
    }
}

/// Applies the full texture chain to a rendered segment.
///
/// Order matters: tremolo first (it shapes the dry voice), then breath and
/// chest additions, then the room tail over the composite, then a soft
/// clip to keep the sum inside full scale.
pub fn apply_texture(
    samples: &[f64],
    params: &TextureParams,
    sample_rate: f64,
    rng: &mut Pcg32,
) -> Vec<f64> {
    let num_samples = samples.len();
    if num_samples == 0 {
        return Vec::new();
    }

    let mut output = samples.to_vec();

    // 1. Amplitude tremolo
    let mut tremolo_acc = PhaseAccumulator::new(sample_rate);
    for sample in output.iter_mut() {
        let lfo = 0.5 + 0.5 * sine(tremolo_acc.advance(params.tremolo_rate_hz));
        *sample *= 1.0 - params.tremolo_depth * lfo;
    }

    // 2. Breath noise, lowpassed below the sibilance region
    if params.breath_level > 0.0 {
        let noise = white_noise(rng, num_samples);
        let mut lowpass = OnePoleFilter::new(BREATH_CUTOFF_HZ, sample_rate);
        for (sample, &n) in output.iter_mut().zip(noise.iter()) {
            *sample += lowpass.process(n) * params.breath_level;
        }
    }

    // 3. Chest resonance, gated by the voice's own loudness
    if params.chest_level > 0.0 {
        let mut chest_acc = PhaseAccumulator::new(sample_rate);
        let mut follower = OnePoleFilter::new(10.0, sample_rate);
        for i in 0..num_samples {
            let loudness = follower.process(output[i].abs());
            output[i] += sine(chest_acc.advance(params.chest_hz)) * params.chest_level * loudness;
        }
    }

    // 4. Room air
    if params.air_wet > 0.0 {
        let mut air = AirTail::new(sample_rate);
        for sample in output.iter_mut() {
            let wet = air.process(*sample);
            *sample += wet * params.air_wet;
        }
    }

    // 5. Keep the composite inside full scale
    soft_clip_buffer(&mut output, 0.95);

    output
}
