//! `Telemetry` thing (spec SPEC_FULL.md §4 Additions, grounded on
//! `original_source/main/iot/things/telemetry.cc`): a read-only device
//! surfacing battery/network health alongside the heartbeat uplink (spec
//! §6 `TelemetryConfig`). Accepts no methods — a downlink command naming
//! it always fails, matching the firmware's read-only device.

use kestrel_iot::{Thing, ThingError};
use serde_json::Value;

pub struct Telemetry {
    battery_percent: u8,
    charging: bool,
    wifi_signal_dbm: i32,
}

impl Telemetry {
    pub fn new() -> Self {
        Self {
            battery_percent: 100,
            charging: false,
            wifi_signal_dbm: -50,
        }
    }

    pub fn update(&mut self, battery_percent: u8, charging: bool, wifi_signal_dbm: i32) {
        self.battery_percent = battery_percent.min(100);
        self.charging = charging;
        self.wifi_signal_dbm = wifi_signal_dbm;
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl Thing for Telemetry {
    fn name(&self) -> &str {
        "Telemetry"
    }

    fn invoke(&mut self, method: &str, _parameters: &Value) -> Result<(), ThingError> {
        Err(ThingError::UnknownMethod(method.to_string()))
    }

    fn state(&self) -> Value {
        serde_json::json!({
            "battery_percent": self.battery_percent,
            "charging": self.charging,
            "wifi_signal_dbm": self.wifi_signal_dbm,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_full_battery() {
        assert_eq!(Telemetry::new().state()["battery_percent"], 100);
    }

    #[test]
    fn update_reflects_in_state() {
        let mut telemetry = Telemetry::new();
        telemetry.update(42, true, -70);
        let state = telemetry.state();
        assert_eq!(state["battery_percent"], 42);
        assert_eq!(state["charging"], true);
        assert_eq!(state["wifi_signal_dbm"], -70);
    }

    #[test]
    fn rejects_every_method() {
        let mut telemetry = Telemetry::new();
        assert!(telemetry.invoke("AnyMethod", &Value::Null).is_err());
    }
}
