//! Melisma Engine
//!
//! Orchestration layer of the singing synthesizer: voice registry and
//! persistence, tiered synthesis with graceful fallback, voice
//! characteristics analysis, embedding training, and background training
//! jobs.
//!
//! The public surface is [`SingingEngine`]: hand it a
//! [`SingingRequest`](melisma_voice::SingingRequest) and get a rendered
//! phrase; hand it recordings and get a custom voice.
//!
//! # Fallback chain
//!
//! Synthesis walks three tiers in order and uses the first that yields
//! usable audio:
//!
//! 1. **Neural conversion** - trained embedding model steers subtle
//!    corrections on a parametric base render
//! 2. **Real sample pitch shift** - phase-vocoder shifted slices of the
//!    voice's own recordings
//! 3. **Parametric synthesis** - always available, never silently absent
//!
//! Only the parametric tier failing is an error.
//!
//! # Crate Structure
//!
//! - [`engine`] - the facade
//! - [`registry`] - voice identity, builtins, per-voice file layout
//! - [`store`] - injected persistence traits + JSON file store
//! - [`analyzer`] - recording measurement into `VoiceCharacteristics`
//! - [`embedding`] - autoencoder trainer and model document
//! - [`orchestrator`] / [`tiers`] - the fallback chain
//! - [`jobs`] - background training with persisted snapshots

pub mod analyzer;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod jobs;
pub mod orchestrator;
pub mod registry;
pub mod store;
pub mod tiers;

pub use engine::{EngineConfig, JobHandle, RenderedSong, SingingEngine};
pub use error::{EngineError, EngineResult};
pub use jobs::ProgressEvent;
pub use orchestrator::TierKind;
