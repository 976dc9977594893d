//! Parametric synthesis: the always-available bottom tier.
//!
//! Each syllable segment is rendered independently (glottal source under a
//! vibrato pitch curve, formant coloring for its dominant vowel, texture,
//! sung envelope) and overlaid into the phrase buffer at its planned
//! offset. Per-segment RNGs are derived from the plan seed, so segment
//! order never changes the audio of any one segment.

use rand_pcg::Pcg32;
use tracing::debug;

use melisma_dsp::envelope::{sung_envelope, SyllableWeight};
use melisma_dsp::formant::apply_formants;
use melisma_dsp::mixer::overlay;
use melisma_dsp::oscillator::{sine, PhaseAccumulator};
use melisma_dsp::rng::create_component_rng;
use melisma_dsp::source::GlottalSource;
use melisma_dsp::texture::{apply_texture, vibrato_curve, TextureParams};
use melisma_voice::{dominant_vowel, SyllableSegment, VoiceCharacteristics, DEFAULT_NOTE_HZ};

use crate::orchestrator::{SynthesisPlan, SynthesisTier, TierError, TierKind};

pub struct ParametricTier;

impl SynthesisTier for ParametricTier {
    fn kind(&self) -> TierKind {
        TierKind::ParametricSynthesis
    }

    fn render(&self, plan: &SynthesisPlan) -> Result<Vec<f64>, TierError> {
        if plan.total_samples == 0 {
            return Err(TierError("zero-length phrase".into()));
        }

        let mut phrase = vec![0.0; plan.total_samples];
        for (index, segment) in plan.segments.iter().enumerate() {
            let mut rng = create_component_rng(plan.seed, &format!("segment-{index}"));
            let rendered = render_segment(
                segment,
                &plan.voice.characteristics,
                plan.sample_rate,
                &mut rng,
            );
            let offset = (segment.start_seconds * plan.sample_rate).round() as usize;
            overlay(&mut phrase, &rendered, offset);
        }
        phrase.truncate(plan.total_samples);
        Ok(phrase)
    }
}

/// Renders one syllable through the full voice chain.
fn render_segment(
    segment: &SyllableSegment,
    characteristics: &VoiceCharacteristics,
    sample_rate: f64,
    rng: &mut Pcg32,
) -> Vec<f64> {
    let num_samples = (segment.duration_seconds * sample_rate).round() as usize;
    if num_samples == 0 {
        return Vec::new();
    }

    let weight = if segment.vowel_heavy {
        SyllableWeight::VowelHeavy
    } else {
        SyllableWeight::ConsonantHeavy
    };
    let envelope = sung_envelope(num_samples, segment.position, weight);

    let pitch_curve = vibrato_curve(
        segment.frequency_hz,
        num_samples,
        sample_rate,
        characteristics.vibrato_rate_hz,
        characteristics.vibrato_depth,
        rng,
    );
    let source = GlottalSource::for_voice(characteristics).generate(&pitch_curve, sample_rate, rng);
    let shaped = apply_formants(
        &source,
        dominant_vowel(&segment.text),
        characteristics.warmth,
        characteristics.formant_shift,
        sample_rate,
    );
    let textured = apply_texture(
        &shaped,
        &TextureParams::for_voice(characteristics),
        sample_rate,
        rng,
    );

    let mut rendered: Vec<f64> = textured
        .iter()
        .zip(envelope.iter())
        .map(|(s, e)| s * e)
        .collect();

    if degenerate(&rendered) {
        debug!(
            syllable = %segment.text,
            "segment chain degenerated, substituting plain tone"
        );
        rendered = fallback_tone(segment.frequency_hz, &envelope, sample_rate);
    }
    rendered
}

fn degenerate(samples: &[f64]) -> bool {
    samples.iter().any(|s| !s.is_finite()) || samples.iter().all(|s| *s == 0.0)
}

/// Last-resort quiet sine so a syllable is never silently dropped.
fn fallback_tone(frequency_hz: f64, envelope: &[f64], sample_rate: f64) -> Vec<f64> {
    let frequency = if frequency_hz > 0.0 {
        frequency_hz
    } else {
        DEFAULT_NOTE_HZ
    };
    let mut phase_acc = PhaseAccumulator::new(sample_rate);
    envelope
        .iter()
        .map(|e| sine(phase_acc.advance(frequency)) * 0.2 * e)
        .collect()
}
