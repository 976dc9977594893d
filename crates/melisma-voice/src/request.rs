//! Singing request: the engine's input contract.

use serde::{Deserialize, Serialize};

use crate::error::{VoiceError, VoiceResult};

/// Shortest phrase the engine will render, in seconds.
pub const MIN_PHRASE_SECONDS: f64 = 3.0;
/// Default time allotted to each syllable when no duration is requested.
pub const SECONDS_PER_SYLLABLE: f64 = 0.6;

/// A request to set text to music with a particular voice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingingRequest {
    /// Lyrics to sing.
    pub text: String,
    /// Registered voice to sing with.
    pub voice_id: String,
    /// Note names ("C4", "F#3", ...). Empty means the engine derives a
    /// melody from the voice's comfortable range. Unparseable entries fall
    /// back to the default note rather than failing.
    #[serde(default)]
    pub notes: Vec<String>,
    /// Requested phrase length. `None` derives one from the syllable count.
    #[serde(default)]
    pub duration_seconds: Option<f64>,
    /// Optional chord label. Informational only: logged during synthesis
    /// and never changes the rendered audio.
    #[serde(default)]
    pub chord: Option<String>,
}

impl SingingRequest {
    /// Builds a request with just text and a voice; notes and duration
    /// take their defaults.
    pub fn new(text: impl Into<String>, voice_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice_id: voice_id.into(),
            notes: Vec::new(),
            duration_seconds: None,
            chord: None,
        }
    }

    /// Checks the request invariants.
    ///
    /// Text and voice id must be non-blank; an explicit duration must be a
    /// finite positive number. Note names are NOT validated here (bad notes
    /// degrade to the default pitch at planning time).
    pub fn validate(&self) -> VoiceResult<()> {
        if self.text.trim().is_empty() {
            return Err(VoiceError::EmptyText);
        }
        if self.voice_id.trim().is_empty() {
            return Err(VoiceError::EmptyVoiceId);
        }
        if let Some(seconds) = self.duration_seconds {
            if !seconds.is_finite() || seconds <= 0.0 {
                return Err(VoiceError::InvalidDuration { seconds });
            }
        }
        Ok(())
    }

    /// Phrase length to render, in seconds.
    ///
    /// An explicit requested duration wins; otherwise the syllable count
    /// sets the length at [`SECONDS_PER_SYLLABLE`] each, floored at
    /// [`MIN_PHRASE_SECONDS`].
    pub fn resolved_duration(&self, syllable_count: usize) -> f64 {
        match self.duration_seconds {
            Some(seconds) => seconds,
            None => MIN_PHRASE_SECONDS.max(syllable_count as f64 * SECONDS_PER_SYLLABLE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_minimal_request() {
        assert!(SingingRequest::new("hello world", "default").validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_text() {
        assert!(matches!(
            SingingRequest::new("   ", "default").validate(),
            Err(VoiceError::EmptyText)
        ));
    }

    #[test]
    fn test_validate_rejects_blank_voice() {
        assert!(matches!(
            SingingRequest::new("la", "").validate(),
            Err(VoiceError::EmptyVoiceId)
        ));
    }

    #[test]
    fn test_validate_rejects_bad_durations() {
        for bad in [0.0, -2.0, f64::NAN, f64::INFINITY] {
            let mut request = SingingRequest::new("la", "default");
            request.duration_seconds = Some(bad);
            assert!(matches!(
                request.validate(),
                Err(VoiceError::InvalidDuration { .. })
            ));
        }
    }

    #[test]
    fn test_resolved_duration_floors_short_phrases() {
        let request = SingingRequest::new("hi", "default");
        assert_eq!(request.resolved_duration(1), 3.0);
        assert_eq!(request.resolved_duration(4), 3.0);
    }

    #[test]
    fn test_resolved_duration_scales_with_syllables() {
        let request = SingingRequest::new("a long phrase of many syllables", "default");
        assert!((request.resolved_duration(10) - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_resolved_duration_prefers_explicit_request() {
        let mut request = SingingRequest::new("la", "default");
        request.duration_seconds = Some(1.25);
        assert_eq!(request.resolved_duration(100), 1.25);
    }
}
