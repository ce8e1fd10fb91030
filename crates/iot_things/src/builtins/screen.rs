//! `Screen` thing: brightness, theme, display mode and subtitle control —
//! every non-audio intent the matcher recognizes targets this one thing
//! (spec §4.8).

use kestrel_iot::{Thing, ThingError};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Dark,
    Light,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    Static,
    Animated,
}

pub struct Screen {
    brightness: i32,
    theme: Theme,
    mode: DisplayMode,
    emotion: Option<String>,
    subtitle_visible: bool,
}

impl Default for Screen {
    fn default() -> Self {
        Self {
            brightness: 75,
            theme: Theme::Dark,
            mode: DisplayMode::Animated,
            emotion: None,
            subtitle_visible: true,
        }
    }
}

impl Screen {
    fn apply_brightness(&mut self, parameters: &Value) -> Result<(), ThingError> {
        match parameters.get("adjustment").and_then(Value::as_str) {
            Some("increase_10") => self.brightness = (self.brightness + 10).min(100),
            Some("decrease_10") => self.brightness = (self.brightness - 10).max(0),
            Some("increase") => self.brightness = (self.brightness + 5).min(100),
            Some("decrease") => self.brightness = (self.brightness - 5).max(0),
            _ => {
                let value = parameters
                    .get("brightness")
                    .and_then(Value::as_i64)
                    .ok_or_else(|| ThingError::InvalidParameter("brightness".to_string()))?;
                self.brightness = value.clamp(0, 100) as i32;
            }
        }
        Ok(())
    }

    fn apply_theme(&mut self, parameters: &Value) -> Result<(), ThingError> {
        match parameters.get("theme").and_then(Value::as_str) {
            Some("light") => self.theme = Theme::Light,
            Some("dark") => self.theme = Theme::Dark,
            _ => return Err(ThingError::InvalidParameter("theme".to_string())),
        }
        Ok(())
    }

    fn apply_display_mode(&mut self, parameters: &Value) -> Result<(), ThingError> {
        match parameters.get("mode").and_then(Value::as_str) {
            Some("static") => self.mode = DisplayMode::Static,
            Some("animated") => self.mode = DisplayMode::Animated,
            _ => return Err(ThingError::InvalidParameter("mode".to_string())),
        }
        self.emotion = parameters.get("emotion").and_then(Value::as_str).map(str::to_string);
        Ok(())
    }
}

impl Thing for Screen {
    fn name(&self) -> &str {
        "Screen"
    }

    fn invoke(&mut self, method: &str, parameters: &Value) -> Result<(), ThingError> {
        match method {
            "SetBrightness" => self.apply_brightness(parameters),
            "SetTheme" => self.apply_theme(parameters),
            "SetDisplayMode" => self.apply_display_mode(parameters),
            "ShowSubtitle" => {
                self.subtitle_visible = true;
                Ok(())
            }
            "HideSubtitle" => {
                self.subtitle_visible = false;
                Ok(())
            }
            "ToggleSubtitle" => {
                self.subtitle_visible = !self.subtitle_visible;
                Ok(())
            }
            other => Err(ThingError::UnknownMethod(other.to_string())),
        }
    }

    fn state(&self) -> Value {
        serde_json::json!({
            "brightness": self.brightness,
            "theme": if self.theme == Theme::Dark { "dark" } else { "light" },
            "mode": if self.mode == DisplayMode::Static { "static" } else { "animated" },
            "emotion": self.emotion,
            "subtitle_visible": self.subtitle_visible,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brightness_default_fallback_matches_intent_default() {
        assert_eq!(Screen::default().brightness, 75);
    }

    #[test]
    fn theme_switches() {
        let mut screen = Screen::default();
        screen.invoke("SetTheme", &serde_json::json!({"theme": "light"})).unwrap();
        assert_eq!(screen.theme, Theme::Light);
    }

    #[test]
    fn subtitle_toggle_flips_visibility() {
        let mut screen = Screen::default();
        let before = screen.subtitle_visible;
        screen.invoke("ToggleSubtitle", &Value::Null).unwrap();
        assert_eq!(screen.subtitle_visible, !before);
    }

    #[test]
    fn display_mode_carries_emotion() {
        let mut screen = Screen::default();
        screen
            .invoke("SetDisplayMode", &serde_json::json!({"mode": "animated", "emotion": "happy"}))
            .unwrap();
        assert_eq!(screen.emotion.as_deref(), Some("happy"));
    }
}
