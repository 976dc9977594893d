//! Melisma Signal Engine
//!
//! This crate implements the sample-level building blocks of the singing
//! synthesizer:
//!
//! - **Glottal source** - harmonic vocal-fold excitation with jitter
//! - **Formant filters** - vowel coloring via resonant EQ banks
//! - **Texture** - vibrato, tremolo, breath, chest resonance, room air
//! - **Envelopes** - phrase-aware sung amplitude shaping
//! - **Analysis** - FFT features (centroid, rolloff, MFCC, chroma, f0)
//! - **Pitch shifting** - phase-vocoder transposition of real samples
//!
//! # Determinism
//!
//! All randomness (jitter, breath noise, humanization) flows through an
//! injected PCG32 generator. Given the same voice, text, notes, and seed,
//! rendering is byte-identical across runs on the same platform. Seeds for
//! independent components are derived via BLAKE3 hashing.
//!
//! # Example
//!
//! ```ignore
//! use melisma_dsp::rng::create_rng;
//! use melisma_dsp::source::GlottalSource;
//!
//! let mut rng = create_rng(42);
//! let source = GlottalSource::for_voice(&characteristics);
//! let pitch_curve = vec![220.0; 22_050];
//! let samples = source.generate(&pitch_curve, 22_050.0, &mut rng);
//! ```
//!
//! # Crate Structure
//!
//! - [`source`] - Glottal excitation generator
//! - [`formant`] - Vowel formant tables and filter bank
//! - [`texture`] - Humanization layer
//! - [`envelope`] - Sung phrase envelopes
//! - [`features`] - Spectral feature extraction
//! - [`pitch_shift`] - Phase-vocoder pitch shifting
//! - [`wav`] - WAV encode/decode and resampling
//! - [`mixer`] - Normalization, soft clipping, overlay
//! - [`rng`] - Deterministic RNG with seed derivation

pub mod envelope;
pub mod error;
pub mod features;
pub mod filter;
pub mod formant;
pub mod mixer;
pub mod oscillator;
pub mod pitch_shift;
pub mod rng;
pub mod source;
pub mod texture;
pub mod wav;

pub use error::{DspError, DspResult};
pub use features::{FeatureVector, FEATURE_DIM};
pub use wav::{DecodedAudio, WavResult};

/// Sample rate used for parametric rendering.
pub const PARAMETRIC_SAMPLE_RATE: u32 = 22_050;
/// Sample rate analysis and neural-conversion features are computed at.
pub const CONVERSION_SAMPLE_RATE: u32 = 40_000;
