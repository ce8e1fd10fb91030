//! Trait boundaries for the external collaborators spec §1 explicitly
//! excludes from this workspace (display/LVGL rendering, wake-word
//! detection, audio-asset playback). The orchestrator only needs to *call*
//! these, never to implement them — concrete drivers are injected at
//! construction, the same "top-level owned values... injected by explicit
//! reference" shape spec §9 calls for.

/// Drives the on-device status display (spec §4.6 per-state side effects:
/// "display standby", "display connecting", ...).
pub trait DisplaySink: Send + Sync {
    fn show_status(&self, status: &str);
    fn clear_chat(&self);
}

/// Starts/stops local wake-word detection (spec §4.6: "start wake-word
/// detection" / "stop wake-word detection").
pub trait WakeWordSink: Send + Sync {
    fn set_active(&self, active: bool);
}

/// Plays fixed audio assets outside the normal decode queue (spec §4.7
/// preemption prelude, §6 `PlaySound` asset format). Playback errors are
/// logged, never propagated (spec §7 "Audio-asset playback errors are
/// logged but never propagate").
pub trait AssetPlayer: Send + Sync {
    fn play_prelude(&self, alarm_name: &str);
    fn play_fallback_alert(&self);
}

/// No-op implementations for the host simulator and tests.
pub struct NullDisplay;
impl DisplaySink for NullDisplay {
    fn show_status(&self, _status: &str) {}
    fn clear_chat(&self) {}
}

pub struct NullWakeWord;
impl WakeWordSink for NullWakeWord {
    fn set_active(&self, _active: bool) {}
}

pub struct NullAssetPlayer;
impl AssetPlayer for NullAssetPlayer {
    fn play_prelude(&self, _alarm_name: &str) {}
    fn play_fallback_alert(&self) {}
}
