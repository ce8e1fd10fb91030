//! `AlarmClock` thing (spec SPEC_FULL.md §4 Additions, grounded on
//! `original_source/main/iot/things/alarm.cc`): exposes the scheduler's
//! enable/cancel operations through the generic IoT dispatch path (spec
//! §4.5), alongside the dedicated scheduler API of §4.2.

use std::sync::Arc;

use kestrel_alarm::AlarmScheduler;
use kestrel_iot::{Thing, ThingError};
use serde_json::Value;

pub struct AlarmThing {
    scheduler: Arc<AlarmScheduler>,
}

impl AlarmThing {
    pub fn new(scheduler: Arc<AlarmScheduler>) -> Self {
        Self { scheduler }
    }
}

impl Thing for AlarmThing {
    fn name(&self) -> &str {
        "AlarmClock"
    }

    fn invoke(&mut self, method: &str, parameters: &Value) -> Result<(), ThingError> {
        let name = parameters
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| ThingError::InvalidParameter("name".to_string()))?;
        match method {
            "SetEnabled" => {
                let enabled = parameters
                    .get("enabled")
                    .and_then(Value::as_bool)
                    .ok_or_else(|| ThingError::InvalidParameter("enabled".to_string()))?;
                self.scheduler
                    .enable(name, enabled)
                    .map_err(|err| ThingError::InvalidParameter(err.to_string()))
            }
            "Cancel" => self
                .scheduler
                .cancel(name)
                .map_err(|err| ThingError::InvalidParameter(err.to_string())),
            other => Err(ThingError::UnknownMethod(other.to_string())),
        }
    }

    fn state(&self) -> Value {
        let alarms: Vec<Value> = self
            .scheduler
            .all()
            .into_iter()
            .map(|alarm| {
                serde_json::json!({
                    "name": alarm.name,
                    "next_fire": alarm.next_fire,
                    "repeat": alarm.repeat.as_str(),
                    "enabled": alarm.enabled,
                })
            })
            .collect();
        serde_json::json!({"alarms": alarms})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_alarm::AlarmTable;
    use chrono::TimeZone;

    fn thing() -> (AlarmThing, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let table = AlarmTable::new(dir.path().join("alarms.json"));
        let scheduler = Arc::new(AlarmScheduler::new(table));
        let now = chrono_tz::UTC.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        scheduler.set_relative("tea", now, 60, kestrel_alarm::Repeat::Once, 0).unwrap();
        (AlarmThing::new(scheduler), dir)
    }

    #[test]
    fn disables_then_reflects_in_state() {
        let (mut thing, _dir) = thing();
        thing
            .invoke("SetEnabled", &serde_json::json!({"name": "tea", "enabled": false}))
            .unwrap();
        let state = thing.state();
        assert_eq!(state["alarms"][0]["enabled"], false);
    }

    #[test]
    fn cancel_removes_from_state() {
        let (mut thing, _dir) = thing();
        thing.invoke("Cancel", &serde_json::json!({"name": "tea"})).unwrap();
        assert_eq!(thing.state()["alarms"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn unknown_alarm_is_an_error() {
        let (mut thing, _dir) = thing();
        assert!(thing
            .invoke("Cancel", &serde_json::json!({"name": "nope"}))
            .is_err());
    }
}
