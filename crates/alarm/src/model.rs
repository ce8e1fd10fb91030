use serde::{Deserialize, Serialize};

/// Recurrence rule for an [`Alarm`]. See spec §3 for the `days_mask`
/// invariants tied to each variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Repeat {
    Once,
    Daily,
    Weekly,
    Workdays,
    Weekends,
}

impl Repeat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Repeat::Once => "once",
            Repeat::Daily => "daily",
            Repeat::Weekly => "weekly",
            Repeat::Workdays => "workdays",
            Repeat::Weekends => "weekends",
        }
    }

    /// Parses a persisted repeat tag, falling back to `Once` on anything
    /// unrecognized (spec §4.2 "a persisted row that fails to parse reverts
    /// to defaults").
    pub fn from_persisted(tag: &str) -> Self {
        match tag {
            "daily" => Repeat::Daily,
            "weekly" => Repeat::Weekly,
            "workdays" => Repeat::Workdays,
            "weekends" => Repeat::Weekends,
            _ => Repeat::Once,
        }
    }

    /// The canonical `days_mask` for variants whose mask is fixed by the
    /// variant itself (spec §3 invariant).
    pub fn fixed_days_mask(&self) -> Option<u8> {
        match self {
            Repeat::Once => Some(0),
            Repeat::Daily => Some(0b111_1111),
            Repeat::Workdays => Some(0b011_1110),
            Repeat::Weekends => Some(0b100_0001),
            Repeat::Weekly => None,
        }
    }
}

/// A named, possibly recurring calendar event (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alarm {
    pub name: String,
    /// Absolute fire instant, seconds since the Unix epoch.
    pub next_fire: i64,
    pub repeat: Repeat,
    /// Bits 0..6 = Sunday..Saturday. Ignored for `Once`.
    pub days_mask: u8,
    pub enabled: bool,
}

impl Alarm {
    pub fn effective_days_mask(&self) -> u8 {
        self.repeat.fixed_days_mask().unwrap_or(self.days_mask)
    }
}

pub const STORE_CAPACITY: usize = 10;
pub const MAX_NAME_LEN: usize = 64;
