//! Real-sample tier: pitch-shifted slices of the voice's own recordings.
//!
//! Training leaves a `slices/` directory next to the copied samples: short
//! voiced excerpts plus a `slices.json` manifest recording each slice's
//! measured base pitch. Rendering assigns slices round-robin to segments,
//! phase-vocoder shifts each to the segment's note, fits it to the segment
//! length, and applies the sung envelope.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use melisma_dsp::envelope::{sung_envelope, SyllableWeight};
use melisma_dsp::mixer::overlay;
use melisma_dsp::pitch_shift::{pitch_shift, semitone_offset};
use melisma_dsp::wav::{decode_wav, resample_linear};

use crate::orchestrator::{SynthesisPlan, SynthesisTier, TierError, TierKind};

/// Directory under a voice's sample dir holding slices and their manifest.
pub const SLICES_DIR: &str = "slices";
/// Manifest file name inside [`SLICES_DIR`].
pub const MANIFEST_FILE: &str = "slices.json";

/// Pitch shifts beyond this are musically useless; slices are clamped here.
const MAX_SHIFT_SEMITONES: f64 = 24.0;
/// Crossfade length when a slice is tiled to fill a longer segment.
const CROSSFADE_SECONDS: f64 = 0.010;

/// One entry in the slice manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SliceEntry {
    /// File name inside the slices directory.
    pub file: String,
    /// Measured fundamental of the slice, in Hz.
    pub base_hz: f64,
}

/// Reads a slice manifest; missing file means no slices.
pub fn read_manifest(slices_dir: &Path) -> Result<Vec<SliceEntry>, TierError> {
    let path = slices_dir.join(MANIFEST_FILE);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let json = fs::read_to_string(&path)
        .map_err(|e| TierError(format!("reading slice manifest: {e}")))?;
    serde_json::from_str(&json).map_err(|e| TierError(format!("corrupt slice manifest: {e}")))
}

/// Writes the slice manifest for a freshly sliced voice.
pub fn write_manifest(slices_dir: &Path, entries: &[SliceEntry]) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(entries).map_err(std::io::Error::other)?;
    fs::write(slices_dir.join(MANIFEST_FILE), json)
}

pub struct SampleTier {
    slices_dir: PathBuf,
}

impl SampleTier {
    pub fn new(slices_dir: impl Into<PathBuf>) -> Self {
        Self {
            slices_dir: slices_dir.into(),
        }
    }
}

impl SynthesisTier for SampleTier {
    fn kind(&self) -> TierKind {
        TierKind::RealSamplePitchShift
    }

    fn render(&self, plan: &SynthesisPlan) -> Result<Vec<f64>, TierError> {
        let manifest = read_manifest(&self.slices_dir)?;
        if manifest.is_empty() {
            return Err(TierError("voice has no sample slices".into()));
        }

        let mut slices = Vec::with_capacity(manifest.len());
        for entry in &manifest {
            let bytes = fs::read(self.slices_dir.join(&entry.file))
                .map_err(|e| TierError(format!("slice {}: {e}", entry.file)))?;
            let decoded =
                decode_wav(&bytes).map_err(|e| TierError(format!("slice {}: {e}", entry.file)))?;
            let samples = resample_linear(
                &decoded.samples,
                decoded.sample_rate,
                plan.sample_rate as u32,
            );
            if samples.is_empty() || entry.base_hz <= 0.0 {
                return Err(TierError(format!("slice {} is unusable", entry.file)));
            }
            slices.push((samples, entry.base_hz));
        }

        let crossfade = (CROSSFADE_SECONDS * plan.sample_rate) as usize;
        let mut phrase = vec![0.0; plan.total_samples];

        for (index, segment) in plan.segments.iter().enumerate() {
            let num_samples = (segment.duration_seconds * plan.sample_rate).round() as usize;
            if num_samples == 0 {
                continue;
            }
            let (slice, base_hz) = &slices[index % slices.len()];

            let semitones = semitone_offset(*base_hz, segment.frequency_hz)
                .clamp(-MAX_SHIFT_SEMITONES, MAX_SHIFT_SEMITONES);
            debug!(slice = index % slices.len(), semitones, "assigning slice");

            let shifted = pitch_shift(slice, plan.sample_rate, semitones);
            let mut fitted = fit_length(&shifted, num_samples, crossfade);

            let weight = if segment.vowel_heavy {
                SyllableWeight::VowelHeavy
            } else {
                SyllableWeight::ConsonantHeavy
            };
            let envelope = sung_envelope(num_samples, segment.position, weight);
            for (sample, gain) in fitted.iter_mut().zip(envelope.iter()) {
                *sample *= gain;
            }

            let offset = (segment.start_seconds * plan.sample_rate).round() as usize;
            overlay(&mut phrase, &fitted, offset);
        }

        phrase.truncate(plan.total_samples);
        Ok(phrase)
    }
}

/// Trims or tiles `source` to exactly `target` samples.
///
/// Tiling repeats the slice with a short equal-gain crossfade at each seam
/// so loops do not click.
fn fit_length(source: &[f64], target: usize, crossfade: usize) -> Vec<f64> {
    if source.is_empty() {
        return vec![0.0; target];
    }
    if source.len() >= target {
        return source[..target].to_vec();
    }
    if source.len() == 1 {
        return vec![source[0]; target];
    }

    let mut out = source.to_vec();
    while out.len() < target {
        let overlap = crossfade.min(source.len() - 1).min(out.len());
        let seam = out.len() - overlap;
        for k in 0..overlap {
            let fade = (k + 1) as f64 / (overlap + 1) as f64;
            out[seam + k] = out[seam + k] * (1.0 - fade) + source[k] * fade;
        }
        out.extend_from_slice(&source[overlap..]);
    }
    out.truncate(target);
    out
}
