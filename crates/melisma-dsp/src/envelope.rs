//! Sung amplitude envelopes.
//!
//! Unlike an instrument ADSR, a sung note's shape depends on where the
//! syllable sits in the phrase and on what it is made of: phrase starts
//! bloom in slowly, phrase ends trail off, vowels sustain fuller than
//! consonant clusters.

use melisma_voice::PhrasePosition;

/// What the syllable is mostly made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyllableWeight {
    /// Vowel-dominated; sustains full and long.
    VowelHeavy,
    /// Consonant-dominated; sharper onset, lower sustain.
    ConsonantHeavy,
}

/// Fractions of the segment spent in each envelope region.
struct Shape {
    attack: f64,
    decay: f64,
    sustain_level: f64,
    release: f64,
}

fn shape_for(position: PhrasePosition, weight: SyllableWeight) -> Shape {
    let mut attack = match position {
        PhrasePosition::Start => 0.18,
        PhrasePosition::Middle | PhrasePosition::End => 0.08,
    };
    if weight == SyllableWeight::ConsonantHeavy {
        attack *= 0.5;
    }

    let release = match position {
        PhrasePosition::End => 0.30,
        PhrasePosition::Start | PhrasePosition::Middle => 0.12,
    };

    let sustain_level = match weight {
        SyllableWeight::VowelHeavy => 0.85,
        SyllableWeight::ConsonantHeavy => 0.70,
    };

    let mut shape = Shape {
        attack,
        decay: 0.08,
        sustain_level,
        release,
    };

    // Keep some room for the sustain region on very short segments.
    let total = shape.attack + shape.decay + shape.release;
    if total > 0.9 {
        let scale = 0.9 / total;
        shape.attack *= scale;
        shape.decay *= scale;
        shape.release *= scale;
    }

    shape
}

/// Generates the amplitude envelope for one sung syllable.
///
/// The output has exactly `num_samples` values in [0, 1]. The first sample
/// is 0 and the tail decays exponentially toward silence, so adjacent
/// segments butt together without clicks.
pub fn sung_envelope(
    num_samples: usize,
    position: PhrasePosition,
    weight: SyllableWeight,
) -> Vec<f64> {
    if num_samples == 0 {
        return Vec::new();
    }

    let shape = shape_for(position, weight);
    let attack_end = shape.attack;
    let decay_end = shape.attack + shape.decay;
    let release_start = 1.0 - shape.release;

    // 1 - e^-5 rise normalizer so the attack lands exactly on 1.0
    let attack_norm = 1.0 - (-5.0_f64).exp();

    let mut envelope = Vec::with_capacity(num_samples);
    for i in 0..num_samples {
        let t = i as f64 / num_samples as f64;

        let level = if t < attack_end {
            (1.0 - (-5.0 * t / attack_end).exp()) / attack_norm
        } else if t < decay_end {
            let progress = (t - attack_end) / shape.decay;
            1.0 + (shape.sustain_level - 1.0) * progress
        } else if t < release_start {
            shape.sustain_level
        } else {
            let progress = (t - release_start) / shape.release;
            shape.sustain_level * (-6.0 * progress).exp()
        };

        envelope.push(level.clamp(0.0, 1.0));
    }

    envelope
}
