//! Emoticon/emoji detection for `DisplayModeControl`'s "emoticon phrases
//! override" rule (spec §4.8, design note in §9).
//!
//! The legacy behavior this replaces scanned raw UTF-8 bytes for the
//! `0xF0 0x9F` lead-byte pair of the emoji block; that breaks on any
//! grapheme whose cluster doesn't start there (skin-tone modifiers, ZWJ
//! sequences). This scans grapheme clusters instead and maps a small fixed
//! vocabulary of text kaomoji and emoji onto five emotion categories.

use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emotion {
    Happy,
    Sad,
    Angry,
    Surprised,
    Neutral,
}

impl Emotion {
    pub fn as_str(self) -> &'static str {
        match self {
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Angry => "angry",
            Emotion::Surprised => "surprised",
            Emotion::Neutral => "neutral",
        }
    }
}

const HAPPY: &[&str] = &["😀", "😄", "😊", "🙂", ":)", "^_^"];
const SAD: &[&str] = &["😢", "😭", "☹", "🙁", ":("];
const ANGRY: &[&str] = &["😠", "😡", "💢"];
const SURPRISED: &[&str] = &["😮", "😲", "❗"];
const NEUTRAL: &[&str] = &["😐", "😑", "-_-"];

/// Returns the first emotion category whose phrase/emoji occurs in `text`,
/// scanning by grapheme cluster rather than byte.
pub fn detect_emotion(text: &str) -> Option<Emotion> {
    let graphemes: Vec<&str> = text.graphemes(true).collect();
    let joined_clusters: Vec<String> = graphemes.iter().map(|g| g.to_string()).collect();

    let contains_any = |phrases: &[&str]| {
        phrases.iter().any(|p| {
            text.contains(p) || joined_clusters.iter().any(|g| g == p)
        })
    };

    if contains_any(HAPPY) {
        Some(Emotion::Happy)
    } else if contains_any(SAD) {
        Some(Emotion::Sad)
    } else if contains_any(ANGRY) {
        Some(Emotion::Angry)
    } else if contains_any(SURPRISED) {
        Some(Emotion::Surprised)
    } else if contains_any(NEUTRAL) {
        Some(Emotion::Neutral)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_happy_kaomoji() {
        assert_eq!(detect_emotion("切到 ^_^ 的表情模式"), Some(Emotion::Happy));
    }

    #[test]
    fn detects_sad_emoji() {
        assert_eq!(detect_emotion("表情调成😢"), Some(Emotion::Sad));
    }

    #[test]
    fn no_match_returns_none() {
        assert_eq!(detect_emotion("把模式切成静态"), None);
    }
}
