//! WAV encoding, decoding, and resampling.
//!
//! Output is written byte-by-byte (16-bit PCM mono) so renders are
//! reproducible down to the file hash. Input decoding goes through hound
//! and accepts the formats training samples arrive in: 16/24/32-bit
//! integer and 32-bit float, any channel count (downmixed to mono).

use std::io::Cursor;

use crate::error::{DspError, DspResult};

/// A finished render as a WAV file.
#[derive(Debug)]
pub struct WavResult {
    /// Complete WAV file bytes.
    pub wav_data: Vec<u8>,
    /// BLAKE3 hash of the PCM payload, as lowercase hex.
    pub pcm_hash: String,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Number of samples.
    pub num_samples: usize,
}

impl WavResult {
    /// Encodes mono samples as a 16-bit PCM WAV.
    pub fn from_mono(samples: &[f64], sample_rate: u32) -> Self {
        let pcm = samples_to_pcm16(samples);
        let pcm_hash = blake3::hash(&pcm).to_hex().to_string();
        let wav_data = write_wav_mono(sample_rate, &pcm);

        Self {
            wav_data,
            pcm_hash,
            sample_rate,
            num_samples: samples.len(),
        }
    }

    /// Duration of the encoded audio in seconds.
    pub fn duration_seconds(&self) -> f64 {
        self.num_samples as f64 / self.sample_rate as f64
    }
}

/// Converts f64 samples to little-endian 16-bit PCM bytes.
///
/// Samples outside [-1, 1] are clipped.
pub fn samples_to_pcm16(samples: &[f64]) -> Vec<u8> {
    let mut pcm = Vec::with_capacity(samples.len() * 2);

    for &sample in samples {
        let clipped = sample.clamp(-1.0, 1.0);
        let pcm_value = (clipped * 32767.0).round() as i16;
        pcm.extend_from_slice(&pcm_value.to_le_bytes());
    }

    pcm
}

/// Writes a mono 16-bit PCM WAV file around a PCM payload.
fn write_wav_mono(sample_rate: u32, pcm_data: &[u8]) -> Vec<u8> {
    let data_size = pcm_data.len() as u32;
    let file_size = 36 + data_size;
    let byte_rate = sample_rate * 2;
    let block_align: u16 = 2;
    let bits_per_sample: u16 = 16;

    let mut out = Vec::with_capacity(44 + pcm_data.len());

    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&file_size.to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&bits_per_sample.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_size.to_le_bytes());
    out.extend_from_slice(pcm_data);

    out
}

/// Decoded mono audio.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Mono samples in [-1, 1].
    pub samples: Vec<f64>,
    /// Source sample rate in Hz.
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Decodes WAV bytes into mono f64 samples.
///
/// Multichannel input is downmixed by averaging each frame. Empty audio
/// and zero sample rates are rejected.
pub fn decode_wav(bytes: &[u8]) -> DspResult<DecodedAudio> {
    let reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    if spec.sample_rate == 0 {
        return Err(DspError::InvalidSampleRate {
            rate: spec.sample_rate,
        });
    }

    let interleaved: Vec<f64> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f64;
            reader
                .into_samples::<i32>()
                .filter_map(|s| s.ok())
                .map(|s| s as f64 / max_val)
                .collect()
        }
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .filter_map(|s| s.ok())
            .map(|s| s as f64)
            .collect(),
    };

    if interleaved.is_empty() {
        return Err(DspError::EmptyAudio);
    }

    let samples: Vec<f64> = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f64>() / frame.len() as f64)
            .collect()
    };

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
    })
}

/// Linear-interpolation resampler between the engine's fixed rates.
pub fn resample_linear(samples: &[f64], from_rate: u32, to_rate: u32) -> Vec<f64> {
    if samples.is_empty() || from_rate == 0 || to_rate == 0 || from_rate == to_rate {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((samples.len() as f64 / ratio).round() as usize).max(1);

    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let pos = i as f64 * ratio;
        let idx = pos as usize;
        if idx + 1 < samples.len() {
            let frac = pos - idx as f64;
            out.push(samples[idx] * (1.0 - frac) + samples[idx + 1] * frac);
        } else {
            out.push(*samples.last().unwrap_or(&0.0));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn make_hound_wav(samples: &[f32], sample_rate: u32, channels: u16) -> Vec<u8> {
        let mut buffer = Vec::new();
        {
            let cursor = Cursor::new(&mut buffer);
            let spec = hound::WavSpec {
                channels,
                sample_rate,
                bits_per_sample: 32,
                sample_format: hound::SampleFormat::Float,
            };
            let mut writer = hound::WavWriter::new(cursor, spec).unwrap();
            for &sample in samples {
                writer.write_sample(sample).unwrap();
            }
            writer.finalize().unwrap();
        }
        buffer
    }

    #[test]
    fn test_wav_header_layout() {
        let result = WavResult::from_mono(&[0.0, 0.5, -0.5], 22_050);
        let wav = &result.wav_data;

        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(wav.len(), 44 + 6);
    }

    #[test]
    fn test_pcm16_clipping_and_scaling() {
        let pcm = samples_to_pcm16(&[0.0, 1.0, -1.0, 2.0, -2.0]);
        let values: Vec<i16> = pcm
            .chunks(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(values, vec![0, 32767, -32767, 32767, -32767]);
    }

    #[test]
    fn test_pcm_hash_is_stable_hex() {
        let a = WavResult::from_mono(&[0.1, 0.2, 0.3], 22_050);
        let b = WavResult::from_mono(&[0.1, 0.2, 0.3], 22_050);
        assert_eq!(a.pcm_hash, b.pcm_hash);
        assert_eq!(a.pcm_hash.len(), 64);
        assert!(a.pcm_hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_duration() {
        let result = WavResult::from_mono(&vec![0.0; 22_050], 22_050);
        assert_eq!(result.duration_seconds(), 1.0);
    }

    #[test]
    fn test_roundtrip_through_own_writer() {
        let samples = vec![0.0, 0.25, -0.25, 0.5];
        let encoded = WavResult::from_mono(&samples, 22_050);
        let decoded = decode_wav(&encoded.wav_data).unwrap();

        assert_eq!(decoded.sample_rate, 22_050);
        assert_eq!(decoded.samples.len(), samples.len());
        for (got, want) in decoded.samples.iter().zip(samples.iter()) {
            assert!((got - want).abs() < 1e-3);
        }
    }

    #[test]
    fn test_decode_float_wav() {
        let wav = make_hound_wav(&[0.5, -0.5, 0.25], 40_000, 1);
        let decoded = decode_wav(&wav).unwrap();
        assert_eq!(decoded.sample_rate, 40_000);
        assert_eq!(decoded.samples.len(), 3);
        assert!((decoded.samples[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_decode_downmixes_stereo() {
        // L/R pairs: (1.0, 0.0) and (0.5, 0.5) -> mono 0.5 and 0.5
        let wav = make_hound_wav(&[1.0, 0.0, 0.5, 0.5], 40_000, 2);
        let decoded = decode_wav(&wav).unwrap();
        assert_eq!(decoded.samples.len(), 2);
        assert!((decoded.samples[0] - 0.5).abs() < 1e-6);
        assert!((decoded.samples[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_wav(b"not a wav file").is_err());
    }

    #[test]
    fn test_decode_rejects_empty_audio() {
        let wav = make_hound_wav(&[], 40_000, 1);
        assert!(matches!(decode_wav(&wav), Err(DspError::EmptyAudio)));
    }

    #[test]
    fn test_resample_doubles_and_halves() {
        let samples: Vec<f64> = (0..100).map(|i| i as f64 / 100.0).collect();

        let up = resample_linear(&samples, 20_000, 40_000);
        assert_eq!(up.len(), 200);

        let down = resample_linear(&samples, 40_000, 20_000);
        assert_eq!(down.len(), 50);
    }

    #[test]
    fn test_resample_same_rate_is_identity() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(resample_linear(&samples, 22_050, 22_050), samples);
    }

    #[test]
    fn test_resample_preserves_a_ramp() {
        // Linear interpolation reproduces a linear ramp exactly
        let samples: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let up = resample_linear(&samples, 10_000, 20_000);
        for (i, &v) in up.iter().enumerate().take(up.len() - 2) {
            assert!((v - i as f64 * 0.5).abs() < 1e-9);
        }
    }
}
