//! Melisma Voice Domain Types
//!
//! This crate provides the value objects shared across the Melisma singing
//! engine: note-name parsing, syllable segmentation, voice profiles and
//! characteristics, singing requests, and training-job state.
//!
//! # Overview
//!
//! Everything here is plain data: deterministic functions over strings and
//! bounded, serde-round-trippable structs. Ranges are enforced at
//! construction time so downstream DSP code never has to re-validate.
//!
//! # Example
//!
//! ```
//! use melisma_voice::note::{note_to_frequency, DEFAULT_NOTE_HZ};
//! use melisma_voice::syllable::extract_syllables;
//!
//! assert_eq!(note_to_frequency("A4"), Some(440.0));
//! assert_eq!(note_to_frequency("definitely not a note"), None);
//!
//! let syllables = extract_syllables("hello world");
//! assert_eq!(syllables, vec!["hel", "lo", "world"]);
//! # let _ = DEFAULT_NOTE_HZ;
//! ```
//!
//! # Modules
//!
//! - [`note`]: Note-name parsing and equal-tempered frequency mapping
//! - [`syllable`]: Syllable extraction and syllable/note segment planning
//! - [`characteristics`]: Bounded per-voice acoustic characteristics
//! - [`profile`]: Voice identity (builtin and custom profiles)
//! - [`request`]: Singing request input type
//! - [`job`]: Training-job snapshots and status transitions
//! - [`error`]: Domain validation errors

pub mod characteristics;
pub mod error;
pub mod job;
pub mod note;
pub mod profile;
pub mod request;
pub mod syllable;

// Re-export commonly used types at the crate root
pub use characteristics::VoiceCharacteristics;
pub use error::VoiceError;
pub use job::{JobStatus, TrainingJob};
pub use note::{
    frequency_or_default, midi_to_frequency, note_to_frequency, parse_note_name, DEFAULT_NOTE_HZ,
};
pub use profile::{VoiceKind, VoiceProfile};
pub use request::SingingRequest;
pub use syllable::{
    dominant_vowel, extract_syllables, plan_segments, PhrasePosition, SyllableSegment,
};
