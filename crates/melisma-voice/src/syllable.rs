//! Syllable extraction and syllable/note segment planning.
//!
//! Syllables are found by vowel-run scanning: each maximal run of vowels
//! (aeiou, case-insensitive) anchors one syllable, leading consonants attach
//! to the first syllable of a word, and consonant clusters between vowel
//! runs are split at their midpoint. The segmentation is deterministic:
//! the same text always produces the same syllables, and concatenating a
//! word's syllables reconstructs the word.

use serde::{Deserialize, Serialize};

use crate::note::DEFAULT_NOTE_HZ;

const VOWELS: &[char] = &['a', 'e', 'i', 'o', 'u'];

fn is_vowel(c: char) -> bool {
    VOWELS.contains(&c.to_ascii_lowercase())
}

/// Position of a syllable within the sung phrase.
///
/// Drives envelope shaping: phrase starts get a slower attack, phrase ends
/// a longer release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhrasePosition {
    /// First syllable of the phrase.
    Start,
    /// Any interior syllable.
    Middle,
    /// Last syllable of the phrase.
    End,
}

/// One text fragment bound to a single sung note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyllableSegment {
    /// Text fragment sung on this note.
    pub text: String,
    /// Assigned fundamental frequency in Hz.
    pub frequency_hz: f64,
    /// Offset from phrase start in seconds.
    pub start_seconds: f64,
    /// Segment duration in seconds.
    pub duration_seconds: f64,
    /// Position within the phrase.
    pub position: PhrasePosition,
    /// Whether vowels dominate the fragment (longer sustain when true).
    pub vowel_heavy: bool,
}

/// Splits text into singable syllable units.
///
/// Never returns an empty sequence: text without any vowel run comes back
/// as a single syllable containing the whole (trimmed) text.
pub fn extract_syllables(text: &str) -> Vec<String> {
    let mut syllables = Vec::new();

    for word in text.split_whitespace() {
        syllables.extend(split_word(word));
    }

    if syllables.is_empty() {
        syllables.push(text.trim().to_string());
    }

    syllables
}

/// Splits a single word at vowel-run boundaries.
fn split_word(word: &str) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();

    // Locate maximal vowel runs as [start, end) index ranges.
    let mut runs: Vec<(usize, usize)> = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if is_vowel(chars[i]) {
            let start = i;
            while i < chars.len() && is_vowel(chars[i]) {
                i += 1;
            }
            runs.push((start, i));
        } else {
            i += 1;
        }
    }

    if runs.is_empty() {
        return vec![word.to_string()];
    }

    // One boundary between each pair of adjacent runs: the consonant
    // cluster between them is split at its midpoint, with a lone
    // consonant going to the following syllable.
    let mut boundaries = Vec::with_capacity(runs.len() + 1);
    boundaries.push(0);
    for pair in runs.windows(2) {
        let cluster_start = pair[0].1;
        let cluster_len = pair[1].0 - cluster_start;
        boundaries.push(cluster_start + cluster_len / 2);
    }
    boundaries.push(chars.len());

    boundaries
        .windows(2)
        .map(|b| chars[b[0]..b[1]].iter().collect())
        .collect()
}

/// Returns the first vowel character of the text, lowercased.
///
/// Used to pick the formant target for a syllable; `None` means the
/// fragment is purely consonantal and the caller should fall back to a
/// neutral vowel.
pub fn dominant_vowel(text: &str) -> Option<char> {
    text.chars().find(|&c| is_vowel(c)).map(|c| c.to_ascii_lowercase())
}

/// Returns true when vowels make up at least half of the fragment's letters.
pub fn is_vowel_heavy(text: &str) -> bool {
    let letters: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.is_empty() {
        return false;
    }
    let vowels = letters.iter().filter(|&&c| is_vowel(c)).count();
    vowels * 2 >= letters.len()
}

/// Plans the per-syllable segments for a phrase.
///
/// Segment count is `max(syllable_count, note_count)`; the shorter sequence
/// repeats cyclically. Segments are contiguous and non-overlapping, and
/// their durations sum exactly to `total_duration` (the last segment
/// absorbs rounding). An empty `note_freqs` assigns [`DEFAULT_NOTE_HZ`]
/// everywhere.
pub fn plan_segments(
    text: &str,
    note_freqs: &[f64],
    total_duration: f64,
) -> Vec<SyllableSegment> {
    let syllables = extract_syllables(text);
    let count = syllables.len().max(note_freqs.len()).max(1);
    let total = total_duration.max(0.0);

    let mut segments = Vec::with_capacity(count);
    for i in 0..count {
        let syllable = &syllables[i % syllables.len()];
        let frequency_hz = if note_freqs.is_empty() {
            DEFAULT_NOTE_HZ
        } else {
            note_freqs[i % note_freqs.len()]
        };

        let start = total * i as f64 / count as f64;
        let end = if i + 1 == count {
            total
        } else {
            total * (i + 1) as f64 / count as f64
        };

        let position = if i + 1 == count {
            PhrasePosition::End
        } else if i == 0 {
            PhrasePosition::Start
        } else {
            PhrasePosition::Middle
        };

        segments.push(SyllableSegment {
            text: syllable.clone(),
            frequency_hz,
            start_seconds: start,
            duration_seconds: end - start,
            position,
            vowel_heavy: is_vowel_heavy(syllable),
        });
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_hello_world_segmentation() {
        assert_eq!(extract_syllables("hello world"), vec!["hel", "lo", "world"]);
    }

    #[test]
    fn test_single_consonant_goes_to_next_syllable() {
        assert_eq!(extract_syllables("water"), vec!["wa", "ter"]);
    }

    #[test]
    fn test_vowel_run_stays_together() {
        assert_eq!(extract_syllables("beautiful"), vec!["beau", "ti", "ful"]);
    }

    #[test]
    fn test_no_vowels_returns_whole_text() {
        assert_eq!(extract_syllables("hmm"), vec!["hmm"]);
        assert_eq!(extract_syllables("shh pst"), vec!["shh", "pst"]);
    }

    #[test]
    fn test_never_empty() {
        assert!(!extract_syllables("").is_empty());
        assert!(!extract_syllables("   ").is_empty());
    }

    #[test]
    fn test_concatenation_reconstructs_words() {
        for text in ["singing is wonderful", "la la laaa", "synthesizer melody"] {
            let words: Vec<String> = text.split_whitespace().map(String::from).collect();
            let rebuilt: String = extract_syllables(text).concat();
            assert_eq!(rebuilt, words.concat());
        }
    }

    #[test]
    fn test_determinism() {
        let a = extract_syllables("repeatable segmentation");
        let b = extract_syllables("repeatable segmentation");
        assert_eq!(a, b);
    }

    #[test]
    fn test_dominant_vowel() {
        assert_eq!(dominant_vowel("hel"), Some('e'));
        assert_eq!(dominant_vowel("world"), Some('o'));
        assert_eq!(dominant_vowel("str"), None);
        assert_eq!(dominant_vowel("Ohh"), Some('o'));
    }

    #[test]
    fn test_vowel_heavy() {
        assert!(is_vowel_heavy("la"));
        assert!(is_vowel_heavy("aia"));
        assert!(!is_vowel_heavy("world"));
        assert!(!is_vowel_heavy(""));
    }

    #[test]
    fn test_plan_segments_note_count_wins() {
        // 2 syllables, 3 notes -> 3 segments, syllables cycle
        let segments = plan_segments("lala", &[220.0, 246.9, 261.6], 3.0);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].text, "la");
        assert_eq!(segments[1].text, "la");
        assert_eq!(segments[2].text, "la");
        assert_eq!(segments[2].frequency_hz, 261.6);
    }

    #[test]
    fn test_plan_segments_syllable_count_wins() {
        // 3 syllables, 1 note -> 3 segments, note cycles
        let segments = plan_segments("hello world", &[440.0], 3.0);
        assert_eq!(segments.len(), 3);
        assert!(segments.iter().all(|s| s.frequency_hz == 440.0));
    }

    #[test]
    fn test_plan_segments_contiguous_and_sums_to_total() {
        let total = 4.2;
        let segments = plan_segments("hello world again", &[220.0, 330.0], total);
        let mut expected_start = 0.0;
        for seg in &segments {
            assert!((seg.start_seconds - expected_start).abs() < 1e-9);
            expected_start += seg.duration_seconds;
        }
        assert!((expected_start - total).abs() < 1e-9);
    }

    #[test]
    fn test_plan_segments_positions() {
        let segments = plan_segments("one two three", &[220.0], 3.0);
        assert_eq!(segments.first().unwrap().position, PhrasePosition::Start);
        assert_eq!(segments.last().unwrap().position, PhrasePosition::End);
        assert_eq!(segments[1].position, PhrasePosition::Middle);

        let single = plan_segments("la", &[220.0], 1.0);
        assert_eq!(single[0].position, PhrasePosition::End);
    }

    #[test]
    fn test_plan_segments_empty_notes_uses_default() {
        let segments = plan_segments("la", &[], 1.0);
        assert_eq!(segments[0].frequency_hz, DEFAULT_NOTE_HZ);
    }
}
