use serde::{Deserialize, Serialize};

/// The five device-control intents the matcher recognizes (spec §3/§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntentKind {
    VolumeControl,
    BrightnessControl,
    ThemeControl,
    DisplayModeControl,
    SubtitleControl,
}

/// A parameter value attached to an [`IntentResult`]. Kept as a small enum
/// rather than `serde_json::Value` so callers pattern-match without a
/// fallible downcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(i32),
    Text(String),
    Bool(bool),
}

/// One recognized intent (spec §3). `parameters` preserves insertion order,
/// matching the ordered-map contract in the data model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentResult {
    pub kind: IntentKind,
    pub device: String,
    pub action: String,
    pub parameters: Vec<(String, ParamValue)>,
    pub confidence: f64,
}

impl IntentResult {
    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.parameters.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }
}
