use std::env;
use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub name: String,
    pub ota_version: String,
    pub mac: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: "kestrel".to_string(),
            ota_version: "0.0.0".to_string(),
            mac: String::new(),
        }
    }
}

/// Persisted in the "mqtt" namespace on the device (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub endpoint: String,
    pub client_id: String,
    pub username: String,
    pub password: String,
    pub downlink_topic: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            client_id: String::new(),
            username: String::new(),
            password: String::new(),
            downlink_topic: String::new(),
        }
    }
}

impl NetworkConfig {
    pub fn uplink_topic(&self) -> String {
        format!("devices/{}/uplink", self.client_id)
    }

    pub fn ack_topic(&self) -> String {
        format!("devices/{}/ack", self.client_id)
    }

    /// The configured downlink topic, or the derived default when unset.
    pub fn downlink_topic(&self) -> String {
        if self.downlink_topic.is_empty() {
            format!("devices/{}/downlink", self.client_id)
        } else {
            self.downlink_topic.clone()
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.endpoint.is_empty() && !self.client_id.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmConfig {
    /// Path to the persisted alarm table (spec §6 "alarm_clock" namespace).
    pub store_path: String,
    /// IANA timezone name used for all civil-calendar recurrence
    /// arithmetic. IP-geolocation lookup is out of scope; this is the
    /// plain string fallback (mirrors `MemoryConfig::timezone` in the
    /// teacher's config layer).
    pub timezone: String,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            store_path: "kestrel-alarms.json".to_string(),
            timezone: "UTC".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub encode_sample_rate_hz: u32,
    pub encode_frame_ms: u32,
    pub default_decode_sample_rate_hz: u32,
    pub default_decode_frame_ms: u32,
    /// Output auto-disable threshold while idle (spec §4.3 invariant iii).
    pub output_idle_timeout_secs: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            encode_sample_rate_hz: 16_000,
            encode_frame_ms: 60,
            default_decode_sample_rate_hz: 16_000,
            default_decode_frame_ms: 60,
            output_idle_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreemptionConfig {
    /// Lead time before an alarm fires at which pre-emption starts (spec §4.7).
    pub lead_seconds: i64,
}

impl Default for PreemptionConfig {
    fn default() -> Self {
        Self { lead_seconds: 5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub heartbeat_interval_secs: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            heartbeat_interval_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct IntegrationsConfig {
    pub iot_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub device: DeviceConfig,
    pub network: NetworkConfig,
    pub alarm: AlarmConfig,
    pub audio: AudioConfig,
    pub preemption: PreemptionConfig,
    pub telemetry: TelemetryConfig,
    pub integrations: IntegrationsConfig,
}

impl AppConfig {
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(path) {
            config = toml::from_str(&raw)?;
        }

        if let Ok(value) = env::var("KESTREL_MQTT_ENDPOINT") {
            if !value.is_empty() {
                config.network.endpoint = value;
            }
        }

        Ok(config)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_not_configured() {
        let config = AppConfig::default();
        assert!(!config.network.is_configured());
        assert_eq!(config.audio.encode_sample_rate_hz, 16_000);
        assert_eq!(config.audio.encode_frame_ms, 60);
    }

    #[test]
    fn derived_topics_follow_client_id() {
        let mut network = NetworkConfig::default();
        network.client_id = "abc123".to_string();
        assert_eq!(network.uplink_topic(), "devices/abc123/uplink");
        assert_eq!(network.ack_topic(), "devices/abc123/ack");
        assert_eq!(network.downlink_topic(), "devices/abc123/downlink");
    }

    #[test]
    fn explicit_downlink_topic_overrides_default() {
        let mut network = NetworkConfig::default();
        network.client_id = "abc123".to_string();
        network.downlink_topic = "custom/topic".to_string();
        assert_eq!(network.downlink_topic(), "custom/topic");
    }

    #[test]
    fn round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = AppConfig::default();
        config.device.name = "kestrel-kitchen".to_string();
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.device.name, "kestrel-kitchen");
    }
}
