//! Local natural-language intent matcher (spec §4.8, C1): rule-based
//! multi-intent extraction from recognized text, short-circuiting the
//! cloud for device control.

pub mod emoticon;
pub mod keywords;
pub mod matcher;
pub mod model;
pub mod numerals;
pub mod rules;

pub use matcher::{detect_multiple_intents, detect_single_intent};
pub use model::{IntentKind, IntentResult, ParamValue};
