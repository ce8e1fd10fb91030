//! Persisted alarm table (spec §6 "alarm_clock" namespace) and its
//! crash-safe atomic write path: write to a `.tmp` sibling, `fsync`, then
//! `rename` over the live file, so a crash mid-write never corrupts the
//! last good copy.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::model::{Alarm, Repeat, STORE_CAPACITY};

/// On-disk shape of a single slot. An empty `name` denotes a free slot
/// (spec §6). Individual fields default independently so a row with a
/// missing/garbled field still loads instead of discarding the whole slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct PersistedRow {
    #[serde(rename = "alarm")]
    name: String,
    #[serde(rename = "alarm_time")]
    next_fire: i64,
    #[serde(rename = "alarm_type")]
    repeat: String,
    #[serde(rename = "alarm_days")]
    days_mask: u8,
    #[serde(rename = "alarm_en")]
    enabled: bool,
}

/// A row with no persisted `alarm_en` (legacy schema, or a field-level
/// corrupt fallback) reverts to `enabled: true` (spec §4.2 "A persisted row
/// that fails to parse reverts to defaults (Once, days_mask=0,
/// enabled=true)") — `bool`'s derived default is `false`, the opposite.
impl Default for PersistedRow {
    fn default() -> Self {
        Self {
            name: String::new(),
            next_fire: 0,
            repeat: String::new(),
            days_mask: 0,
            enabled: true,
        }
    }
}

impl PersistedRow {
    fn from_alarm(alarm: &Alarm) -> Self {
        Self {
            name: alarm.name.clone(),
            next_fire: alarm.next_fire,
            repeat: alarm.repeat.as_str().to_string(),
            days_mask: alarm.days_mask,
            enabled: alarm.enabled,
        }
    }

    fn into_alarm(self) -> Option<Alarm> {
        if self.name.is_empty() {
            return None;
        }
        Some(Alarm {
            name: self.name,
            next_fire: self.next_fire,
            repeat: Repeat::from_persisted(&self.repeat),
            days_mask: self.days_mask,
            enabled: self.enabled,
        })
    }
}

pub struct AlarmTable {
    path: PathBuf,
}

impl AlarmTable {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Loads the persisted table, substituting a corrupt or truncated file
    /// with an empty table rather than failing startup.
    pub fn load(&self) -> [Option<Alarm>; STORE_CAPACITY] {
        let mut slots: [Option<Alarm>; STORE_CAPACITY] = Default::default();

        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return slots,
        };

        let rows: Vec<PersistedRow> = match serde_json::from_str(&raw) {
            Ok(rows) => rows,
            Err(err) => {
                warn!(?err, path = %self.path.display(), "alarm table corrupt — starting empty");
                return slots;
            }
        };

        for (slot, row) in slots.iter_mut().zip(rows.into_iter()) {
            *slot = row.into_alarm();
        }
        slots
    }

    /// Atomically replaces the persisted table: write to a `.tmp` sibling,
    /// `fsync`, then `rename` over the live file. A crash at any point
    /// before the rename leaves the original untouched.
    pub fn save(&self, slots: &[Option<Alarm>; STORE_CAPACITY]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let rows: Vec<PersistedRow> = slots
            .iter()
            .map(|slot| match slot {
                Some(alarm) => PersistedRow::from_alarm(alarm),
                None => PersistedRow::default(),
            })
            .collect();
        let rendered = serde_json::to_string_pretty(&rows).expect("alarm rows always serialize");

        let tmp_path = tmp_sibling(&self.path);
        fs::write(&tmp_path, rendered.as_bytes())?;
        let file = fs::File::open(&tmp_path)?;
        file.sync_all()?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let filename = path
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_else(|| "alarms.json".to_string());
    path.with_file_name(format!("{filename}.tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Alarm;

    #[test]
    fn round_trips_slots() {
        let dir = tempfile::tempdir().unwrap();
        let table = AlarmTable::new(dir.path().join("alarms.json"));

        let mut slots: [Option<Alarm>; STORE_CAPACITY] = Default::default();
        slots[0] = Some(Alarm {
            name: "wake".to_string(),
            next_fire: 1_700_000_000,
            repeat: Repeat::Daily,
            days_mask: 0b111_1111,
            enabled: true,
        });
        table.save(&slots).unwrap();

        let loaded = table.load();
        assert_eq!(loaded[0].as_ref().unwrap().name, "wake");
        assert_eq!(loaded[0].as_ref().unwrap().repeat, Repeat::Daily);
        assert!(loaded[1].is_none());
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let table = AlarmTable::new(dir.path().join("does-not-exist.json"));
        let loaded = table.load();
        assert!(loaded.iter().all(Option::is_none));
    }

    #[test]
    fn corrupt_file_loads_empty_instead_of_failing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alarms.json");
        fs::write(&path, b"not json").unwrap();
        let table = AlarmTable::new(path);
        let loaded = table.load();
        assert!(loaded.iter().all(Option::is_none));
    }

    #[test]
    fn unknown_repeat_tag_falls_back_to_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alarms.json");
        let raw = serde_json::json!([
            {"alarm": "x", "alarm_time": 10, "alarm_type": "bogus", "alarm_days": 0, "alarm_en": true}
        ]);
        fs::write(&path, raw.to_string()).unwrap();
        let table = AlarmTable::new(path);
        let loaded = table.load();
        assert_eq!(loaded[0].as_ref().unwrap().repeat, Repeat::Once);
    }

    #[test]
    fn missing_enabled_field_reverts_to_true() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alarms.json");
        let raw = serde_json::json!([
            {"alarm": "x", "alarm_time": 10, "alarm_type": "once", "alarm_days": 0}
        ]);
        fs::write(&path, raw.to_string()).unwrap();
        let table = AlarmTable::new(path);
        let loaded = table.load();
        assert!(loaded[0].as_ref().unwrap().enabled);
    }
}
