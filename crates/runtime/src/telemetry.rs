//! Telemetry uplink payload (spec §6, "~30 s heartbeat"). Battery/Wi-Fi
//! readings are external collaborators (spec §1); [`TelemetrySource`] is
//! the trait boundary the host simulator's null/fake implementation
//! satisfies, the same "inject the concrete collaborator, don't assume
//! one" shape as `kestrel_orchestrator::peripherals`.

use serde_json::Value;

use kestrel_config::DeviceConfig;

pub struct BatteryReading {
    pub level_percent: u8,
    pub charging: bool,
    pub discharging: bool,
}

pub trait TelemetrySource: Send + Sync {
    fn battery(&self) -> Option<BatteryReading>;
    fn wifi_rssi(&self) -> Option<i32>;
    fn memory_free_internal(&self) -> u64;
    fn memory_min_free_internal(&self) -> u64;
}

pub struct NullTelemetrySource;
impl TelemetrySource for NullTelemetrySource {
    fn battery(&self) -> Option<BatteryReading> {
        None
    }
    fn wifi_rssi(&self) -> Option<i32> {
        None
    }
    fn memory_free_internal(&self) -> u64 {
        0
    }
    fn memory_min_free_internal(&self) -> u64 {
        0
    }
}

/// Builds the telemetry payload (spec §6 schema), stamping `ts` from the
/// caller rather than reading the wall clock here (SPEC_FULL.md §8
/// Additions: pass `now` explicitly for deterministic tests).
pub fn build_payload(
    device: &DeviceConfig,
    client_id: &str,
    ts: i64,
    source: &dyn TelemetrySource,
    iot_states: Option<Value>,
) -> Value {
    let mut payload = serde_json::json!({
        "type": "telemetry",
        "online": true,
        "ts": ts,
        "device_name": device.name,
        "ota_version": device.ota_version,
        "mac": device.mac,
        "client_id": client_id,
        "memory": {
            "free_internal": source.memory_free_internal(),
            "min_free_internal": source.memory_min_free_internal(),
        },
    });

    if let Some(battery) = source.battery() {
        payload["battery"] = serde_json::json!({
            "level": battery.level_percent,
            "charging": battery.charging,
            "discharging": battery.discharging,
        });
    }
    if let Some(rssi) = source.wifi_rssi() {
        payload["wifi"] = serde_json::json!({"rssi": rssi});
    }
    if let Some(states) = iot_states {
        payload["iot_states"] = states;
    }
    payload
}
