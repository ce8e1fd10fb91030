//! The rule table from spec §4.8: keyword set, kind, default device/action,
//! and parameter extractor, walked in priority order (Brightness, Volume,
//! Theme, DisplayMode, Subtitle).

use crate::emoticon::detect_emotion;
use crate::keywords::*;
use crate::model::{IntentKind, ParamValue};
use crate::numerals::extract_context_number;

pub struct Match {
    pub device: &'static str,
    pub action: &'static str,
    pub parameters: Vec<(String, ParamValue)>,
    pub confidence: f64,
}

pub struct Rule {
    pub kind: IntentKind,
    pub trigger: &'static [&'static str],
    pub own_disambiguation: &'static [&'static str],
    pub extract: fn(raw: &str, processed: &str) -> Option<Match>,
}

fn contains_any(haystack: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| haystack.contains(p))
}

fn extract_level_adjustment(
    raw: &str,
    processed: &str,
    trigger: &[&str],
    max_phrases: &[&str],
    min_phrases: &[&str],
    inc10_phrases: &[&str],
    dec10_phrases: &[&str],
    param_name: &str,
    fallback: Option<i32>,
) -> (Vec<(String, ParamValue)>, f64) {
    if contains_any(processed, max_phrases) {
        return (vec![(param_name.to_string(), ParamValue::Number(100))], 0.98);
    }
    if contains_any(processed, min_phrases) {
        return (vec![(param_name.to_string(), ParamValue::Number(0))], 0.98);
    }
    if contains_any(processed, inc10_phrases) {
        return (
            vec![("adjustment".to_string(), ParamValue::Text("increase_10".into()))],
            0.9,
        );
    }
    if contains_any(processed, dec10_phrases) {
        return (
            vec![("adjustment".to_string(), ParamValue::Text("decrease_10".into()))],
            0.9,
        );
    }

    let value = extract_context_number(raw, trigger);
    if value >= 0 {
        return (vec![(param_name.to_string(), ParamValue::Number(value))], 0.95);
    }

    if contains_any(processed, INCREASE_VERBS) {
        return (
            vec![("adjustment".to_string(), ParamValue::Text("increase".into()))],
            0.85,
        );
    }
    if contains_any(processed, DECREASE_VERBS) {
        return (
            vec![("adjustment".to_string(), ParamValue::Text("decrease".into()))],
            0.8,
        );
    }

    match fallback {
        Some(v) => (vec![(param_name.to_string(), ParamValue::Number(v))], 0.7),
        None => (Vec::new(), 0.7),
    }
}

fn brightness_extract(raw: &str, processed: &str) -> Option<Match> {
    if !contains_any(processed, BRIGHTNESS_TRIGGER) {
        return None;
    }
    let (parameters, confidence) = extract_level_adjustment(
        raw,
        processed,
        BRIGHTNESS_TRIGGER,
        BRIGHTNESS_MAX,
        BRIGHTNESS_MIN,
        BRIGHTNESS_INC_10,
        BRIGHTNESS_DEC_10,
        "brightness",
        Some(75),
    );
    Some(Match {
        device: "Screen",
        action: "SetBrightness",
        parameters,
        confidence,
    })
}

fn volume_extract(raw: &str, processed: &str) -> Option<Match> {
    if !contains_any(processed, VOLUME_TRIGGER) {
        return None;
    }
    let (parameters, confidence) = extract_level_adjustment(
        raw,
        processed,
        VOLUME_TRIGGER,
        VOLUME_MAX,
        VOLUME_MIN,
        VOLUME_INC_10,
        VOLUME_DEC_10,
        "volume",
        None,
    );
    if parameters.is_empty() {
        return None;
    }
    Some(Match {
        device: "Speaker",
        action: "SetVolume",
        parameters,
        confidence,
    })
}

fn theme_extract(_raw: &str, processed: &str) -> Option<Match> {
    if !contains_any(processed, THEME_TRIGGER)
        && !contains_any(processed, THEME_DARK)
        && !contains_any(processed, THEME_LIGHT)
    {
        return None;
    }
    let (theme, confidence) = if contains_any(processed, THEME_DARK) {
        ("dark", 0.95)
    } else if contains_any(processed, THEME_LIGHT) {
        ("light", 0.95)
    } else {
        ("dark", 0.7)
    };
    Some(Match {
        device: "Screen",
        action: "SetTheme",
        parameters: vec![("theme".to_string(), ParamValue::Text(theme.into()))],
        confidence,
    })
}

fn display_mode_extract(raw: &str, processed: &str) -> Option<Match> {
    if let Some(emotion) = detect_emotion(raw) {
        return Some(Match {
            device: "Screen",
            action: "SetDisplayMode",
            parameters: vec![
                ("mode".to_string(), ParamValue::Text("animated".into())),
                ("emotion".to_string(), ParamValue::Text(emotion.as_str().into())),
            ],
            confidence: 0.95,
        });
    }

    if !contains_any(processed, DISPLAY_MODE_TRIGGER)
        && !contains_any(processed, DISPLAY_MODE_STATIC)
        && !contains_any(processed, DISPLAY_MODE_ANIMATED)
    {
        return None;
    }

    let (mode, confidence) = if contains_any(processed, DISPLAY_MODE_STATIC) {
        ("static", 0.9)
    } else if contains_any(processed, DISPLAY_MODE_ANIMATED) {
        ("animated", 0.9)
    } else {
        ("animated", 0.7)
    };
    Some(Match {
        device: "Screen",
        action: "SetDisplayMode",
        parameters: vec![("mode".to_string(), ParamValue::Text(mode.into()))],
        confidence,
    })
}

fn subtitle_extract(_raw: &str, processed: &str) -> Option<Match> {
    if !contains_any(processed, SUBTITLE_TRIGGER) {
        return None;
    }
    let (action, parameters, confidence) = if contains_any(processed, SUBTITLE_SHOW) {
        (
            "ShowSubtitle",
            vec![("visible".to_string(), ParamValue::Bool(true))],
            0.9,
        )
    } else if contains_any(processed, SUBTITLE_HIDE) {
        (
            "HideSubtitle",
            vec![("visible".to_string(), ParamValue::Bool(false))],
            0.9,
        )
    } else {
        ("ToggleSubtitle", Vec::new(), 0.7)
    };
    Some(Match {
        device: "Screen",
        action,
        parameters,
        confidence,
    })
}

/// Priority order: Brightness, Volume, Theme, DisplayMode, Subtitle.
pub fn rule_table() -> Vec<Rule> {
    vec![
        Rule {
            kind: IntentKind::BrightnessControl,
            trigger: BRIGHTNESS_TRIGGER,
            own_disambiguation: DISAMBIGUATION_BRIGHTNESS,
            extract: brightness_extract,
        },
        Rule {
            kind: IntentKind::VolumeControl,
            trigger: VOLUME_TRIGGER,
            own_disambiguation: DISAMBIGUATION_VOLUME,
            extract: volume_extract,
        },
        Rule {
            kind: IntentKind::ThemeControl,
            trigger: THEME_TRIGGER,
            own_disambiguation: DISAMBIGUATION_THEME,
            extract: theme_extract,
        },
        Rule {
            kind: IntentKind::DisplayModeControl,
            trigger: DISPLAY_MODE_TRIGGER,
            own_disambiguation: DISAMBIGUATION_DISPLAY_MODE,
            extract: display_mode_extract,
        },
        Rule {
            kind: IntentKind::SubtitleControl,
            trigger: SUBTITLE_TRIGGER,
            own_disambiguation: DISAMBIGUATION_SUBTITLE,
            extract: subtitle_extract,
        },
    ]
}
