//! Top-level entry point for the intent matcher (spec §4.8 "Multi-intent
//! mode"): walks the rule table in priority order, collecting at most one
//! result per kind.

use crate::model::{IntentKind, IntentResult};
use crate::rules::rule_table;

const CHINESE_PUNCTUATION: &[char] = &[
    '，', '。', '！', '？', '、', '《', '》', '“', '”', '‘', '’', '：', '；', '（', '）',
];

/// Lowercases and strips punctuation/whitespace, per spec §4.8
/// pre-processing. Keyword matching runs against this processed form.
fn preprocess(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace() && !c.is_ascii_punctuation() && !CHINESE_PUNCTUATION.contains(c))
        .flat_map(|c| c.to_lowercase())
        .collect()
}

fn passes_disambiguation(own: &[&str], raw_lower: &str) -> bool {
    use crate::keywords::ALL_DISAMBIGUATION_GROUPS;

    let has_own = own.iter().any(|t| raw_lower.contains(t));
    if has_own {
        return true;
    }
    let has_other = ALL_DISAMBIGUATION_GROUPS
        .iter()
        .filter(|g| !std::ptr::eq(**g, own))
        .any(|g| g.iter().any(|t| raw_lower.contains(t)));
    !has_other
}

/// Walks the priority-ordered rule table, returning all surviving intents
/// in declared order with at most one result per kind.
pub fn detect_multiple_intents(text: &str) -> Vec<IntentResult> {
    let processed = preprocess(text);
    let raw_lower = text.to_lowercase();

    let mut results = Vec::new();
    let mut seen: Vec<IntentKind> = Vec::new();

    for rule in rule_table() {
        if seen.contains(&rule.kind) {
            continue;
        }
        let Some(m) = (rule.extract)(text, &processed) else {
            continue;
        };
        if !passes_disambiguation(rule.own_disambiguation, &raw_lower) {
            continue;
        }
        seen.push(rule.kind);
        results.push(IntentResult {
            kind: rule.kind,
            device: m.device.to_string(),
            action: m.action.to_string(),
            parameters: m.parameters,
            confidence: m.confidence,
        });
    }

    results
}

/// Convenience wrapper returning the single highest-priority intent, if
/// any (spec §4.8 "Priority" law).
pub fn detect_single_intent(text: &str) -> Option<IntentResult> {
    detect_multiple_intents(text).into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ParamValue;

    #[test]
    fn brightness_only_text_yields_sole_result() {
        let results = detect_multiple_intents("把亮度调到 20");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].kind, IntentKind::BrightnessControl);
    }

    #[test]
    fn two_concurrent_voice_intents() {
        let results = detect_multiple_intents("音量调到 80,亮度调到 20");
        assert_eq!(results.len(), 2);

        let brightness = results
            .iter()
            .find(|r| r.kind == IntentKind::BrightnessControl)
            .unwrap();
        assert_eq!(brightness.device, "Screen");
        assert_eq!(brightness.action, "SetBrightness");
        assert_eq!(brightness.param("brightness"), Some(&ParamValue::Number(20)));
        assert!(brightness.confidence >= 0.9);

        let volume = results
            .iter()
            .find(|r| r.kind == IntentKind::VolumeControl)
            .unwrap();
        assert_eq!(volume.device, "Speaker");
        assert_eq!(volume.action, "SetVolume");
        assert_eq!(volume.param("volume"), Some(&ParamValue::Number(80)));
        assert!(volume.confidence >= 0.9);
    }

    #[test]
    fn context_distance_assigns_each_number_to_its_own_keyword() {
        let results = detect_multiple_intents("把音量调到 60 并把亮度调到 20");
        let volume = results
            .iter()
            .find(|r| r.kind == IntentKind::VolumeControl)
            .unwrap();
        assert_eq!(volume.param("volume"), Some(&ParamValue::Number(60)));
        let brightness = results
            .iter()
            .find(|r| r.kind == IntentKind::BrightnessControl)
            .unwrap();
        assert_eq!(brightness.param("brightness"), Some(&ParamValue::Number(20)));
    }

    #[test]
    fn numeric_ceiling_rejects_out_of_range_and_falls_back() {
        let results = detect_multiple_intents("把音量调到 200");
        let volume = results.iter().find(|r| r.kind == IntentKind::VolumeControl);
        assert!(volume.is_none());
    }

    #[test]
    fn chinese_numeral_volume() {
        let results = detect_multiple_intents("把音量调到九十九");
        let volume = results
            .iter()
            .find(|r| r.kind == IntentKind::VolumeControl)
            .unwrap();
        assert_eq!(volume.param("volume"), Some(&ParamValue::Number(99)));
    }

    #[test]
    fn chinese_numeral_zero_sets_volume_to_zero() {
        let results = detect_multiple_intents("把音量调到零");
        let volume = results
            .iter()
            .find(|r| r.kind == IntentKind::VolumeControl)
            .unwrap();
        assert_eq!(volume.param("volume"), Some(&ParamValue::Number(0)));
    }

    #[test]
    fn preceding_distractor_is_rejected_in_favor_of_following_number() {
        let results = detect_multiple_intents("60 不是音量,设成 30");
        let volume = results
            .iter()
            .find(|r| r.kind == IntentKind::VolumeControl)
            .unwrap();
        assert_eq!(volume.param("volume"), Some(&ParamValue::Number(30)));
    }

    #[test]
    fn disambiguation_token_for_another_rule_rejects_this_match() {
        // Brightness's own trigger ("亮度") is present, but so is another
        // rule's disambiguation token ("theme") with none of brightness's
        // own ("brightness") — the match must be rejected.
        let results = detect_multiple_intents("把亮度调亮 theme");
        assert!(!results.iter().any(|r| r.kind == IntentKind::BrightnessControl));
    }

    #[test]
    fn own_disambiguation_token_rescues_the_match() {
        // Same conflicting "theme" token present, but brightness's own
        // token ("brightness") is also present, so the match survives.
        let results = detect_multiple_intents("把亮度调亮 brightness theme");
        assert!(results.iter().any(|r| r.kind == IntentKind::BrightnessControl));
    }

    #[test]
    fn max_and_min_phrases_win_over_numeric_search() {
        let results = detect_multiple_intents("音量调到最大");
        let volume = &results[0];
        assert_eq!(volume.param("volume"), Some(&ParamValue::Number(100)));
        assert!(volume.confidence >= 0.95);
    }

    #[test]
    fn subtitle_show_and_hide() {
        let show = detect_multiple_intents("打开字幕");
        assert_eq!(show[0].action, "ShowSubtitle");
        assert_eq!(show[0].param("visible"), Some(&ParamValue::Bool(true)));

        let hide = detect_multiple_intents("关闭字幕");
        assert_eq!(hide[0].action, "HideSubtitle");
        assert_eq!(hide[0].param("visible"), Some(&ParamValue::Bool(false)));
    }
}
