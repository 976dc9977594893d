//! Note-name parsing and equal-tempered frequency mapping.
//!
//! Note names are the usual letter + optional accidental + octave form
//! ("C4", "F#3", "Bb2"). Parsing is deliberately forgiving: unknown input
//! yields `None` rather than an error, and callers substitute
//! [`DEFAULT_NOTE_HZ`] so a single bad note never fails a whole phrase.

/// Frequency substituted when a note name cannot be parsed (A3).
pub const DEFAULT_NOTE_HZ: f64 = 220.0;

/// Converts a MIDI note number to frequency in Hz (A4 = MIDI 69 = 440 Hz).
pub fn midi_to_frequency(midi_note: u8) -> f64 {
    440.0 * 2.0_f64.powf((midi_note as f64 - 69.0) / 12.0)
}

/// Parses a note name (e.g., "C4", "A#3", "Bb5") to a MIDI note number.
///
/// The note letter is case-insensitive. Sharps are written `#` or `s`,
/// flats `b` (`Db4` is the same pitch as `C#4`). Returns `None` for
/// anything unparseable or outside MIDI range.
pub fn parse_note_name(name: &str) -> Option<u8> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut chars = name.chars();
    let note_letter = chars.next()?.to_ascii_uppercase();

    let base_semitone = match note_letter {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    let rest: String = chars.collect();
    let (accidental_offset, octave_str) = if let Some(stripped) = rest.strip_prefix('#') {
        (1i32, stripped)
    } else if let Some(stripped) = rest.strip_prefix('s') {
        (1i32, stripped)
    } else if let Some(stripped) = rest.strip_prefix('b') {
        (-1i32, stripped)
    } else if let Some(stripped) = rest.strip_prefix('B') {
        // Uppercase flat marker, seen in some tracker exports ("DB3")
        (-1i32, stripped)
    } else {
        (0i32, rest.as_str())
    };

    let octave: i32 = octave_str.parse().ok()?;

    // MIDI note = (octave + 1) * 12 + semitone; C4 = 60, A4 = 69
    let midi = (octave + 1) * 12 + base_semitone + accidental_offset;

    if (0..=127).contains(&midi) {
        Some(midi as u8)
    } else {
        None
    }
}

/// Converts a note name directly to frequency in Hz.
///
/// `note_to_frequency("A4")` is exactly `Some(440.0)`. Unparseable names
/// return `None`; callers should fall back to [`DEFAULT_NOTE_HZ`].
pub fn note_to_frequency(name: &str) -> Option<f64> {
    parse_note_name(name).map(midi_to_frequency)
}

/// Resolves a note name to a frequency, substituting the default on failure.
pub fn frequency_or_default(name: &str) -> f64 {
    note_to_frequency(name).unwrap_or(DEFAULT_NOTE_HZ)
}

/// Converts a frequency to the nearest MIDI note number, if representable.
pub fn frequency_to_midi(freq: f64) -> Option<u8> {
    if freq <= 0.0 {
        return None;
    }
    let midi = 69.0 + 12.0 * (freq / 440.0).log2();
    let rounded = midi.round();
    if (0.0..=127.0).contains(&rounded) {
        Some(rounded as u8)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_a4_is_exactly_440() {
        assert_eq!(note_to_frequency("A4"), Some(440.0));
    }

    #[test]
    fn test_c4_frequency() {
        let c4 = note_to_frequency("C4").unwrap();
        assert!((c4 - 261.63).abs() < 0.01);
    }

    #[test]
    fn test_sharps_and_flats_agree() {
        assert_eq!(parse_note_name("C#4"), parse_note_name("Db4"));
        assert_eq!(parse_note_name("F#3"), parse_note_name("Gb3"));
        assert_eq!(parse_note_name("Cs4"), parse_note_name("C#4"));
    }

    #[test]
    fn test_letter_case_insensitive() {
        assert_eq!(parse_note_name("c4"), parse_note_name("C4"));
        assert_eq!(parse_note_name("g#2"), parse_note_name("G#2"));
    }

    #[test]
    fn test_octave_boundaries() {
        // C-1 is MIDI 0, G9 is MIDI 127
        assert_eq!(parse_note_name("C-1"), Some(0));
        assert_eq!(parse_note_name("G9"), Some(127));
        assert_eq!(parse_note_name("A9"), None); // MIDI 129, out of range
    }

    #[test]
    fn test_junk_returns_none() {
        assert_eq!(note_to_frequency("junk"), None);
        assert_eq!(note_to_frequency(""), None);
        assert_eq!(note_to_frequency("H4"), None);
        assert_eq!(note_to_frequency("C"), None);
        assert_eq!(note_to_frequency("4C"), None);
    }

    #[test]
    fn test_frequency_or_default() {
        assert_eq!(frequency_or_default("A4"), 440.0);
        assert_eq!(frequency_or_default("nope"), DEFAULT_NOTE_HZ);
    }

    #[test]
    fn test_frequency_to_midi_round_trip() {
        for midi in [0u8, 36, 57, 60, 69, 96, 127] {
            let freq = midi_to_frequency(midi);
            assert_eq!(frequency_to_midi(freq), Some(midi));
        }
        assert_eq!(frequency_to_midi(0.0), None);
        assert_eq!(frequency_to_midi(-5.0), None);
    }

    #[test]
    fn test_a3_default_matches_table() {
        assert!((midi_to_frequency(57) - DEFAULT_NOTE_HZ).abs() < 0.001);
    }
}
