//! `Speaker` thing: the volume control surface the intent matcher and
//! downlink handler both target (spec §4.8 `VolumeControl` → device
//! `"Speaker"`, action `"SetVolume"`).

use kestrel_iot::{Thing, ThingError};
use serde_json::Value;

pub struct Speaker {
    volume: i32,
}

impl Default for Speaker {
    fn default() -> Self {
        Self { volume: 50 }
    }
}

impl Speaker {
    pub fn volume(&self) -> i32 {
        self.volume
    }

    fn apply_relative(&mut self, parameters: &Value) -> Result<(), ThingError> {
        match parameters.get("adjustment").and_then(Value::as_str) {
            Some("increase_10") => self.volume = (self.volume + 10).min(100),
            Some("decrease_10") => self.volume = (self.volume - 10).max(0),
            Some("increase") => self.volume = (self.volume + 5).min(100),
            Some("decrease") => self.volume = (self.volume - 5).max(0),
            _ => {
                let value = parameters
                    .get("volume")
                    .and_then(Value::as_i64)
                    .ok_or_else(|| ThingError::InvalidParameter("volume".to_string()))?;
                self.volume = value.clamp(0, 100) as i32;
            }
        }
        Ok(())
    }
}

impl Thing for Speaker {
    fn name(&self) -> &str {
        "Speaker"
    }

    fn invoke(&mut self, method: &str, parameters: &Value) -> Result<(), ThingError> {
        match method {
            "SetVolume" => self.apply_relative(parameters),
            other => Err(ThingError::UnknownMethod(other.to_string())),
        }
    }

    fn state(&self) -> Value {
        serde_json::json!({"volume": self.volume})
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sets_explicit_volume() {
        let mut speaker = Speaker::default();
        speaker.invoke("SetVolume", &serde_json::json!({"volume": 80})).unwrap();
        assert_eq!(speaker.volume(), 80);
    }

    #[test]
    fn explicit_volume_is_clamped() {
        let mut speaker = Speaker::default();
        speaker.invoke("SetVolume", &serde_json::json!({"volume": 500})).unwrap();
        assert_eq!(speaker.volume(), 100);
    }

    #[test]
    fn relative_adjustments_saturate() {
        let mut speaker = Speaker { volume: 95 };
        speaker
            .invoke("SetVolume", &serde_json::json!({"adjustment": "increase_10"}))
            .unwrap();
        assert_eq!(speaker.volume(), 100);
    }

    #[test]
    fn unknown_method_is_rejected() {
        let mut speaker = Speaker::default();
        assert!(speaker.invoke("Mute", &Value::Null).is_err());
    }
}
