//! Outbound audio-channel vocabulary (spec §4.4/§6): the small JSON
//! envelope set the facade emits on the audio channel, plus
//! [`ListeningMode`] (spec §3), which callers thread through
//! `send_start_listening`.

use serde::{Deserialize, Serialize};

/// Governs how a listen session ends and whether wake-word continues
/// during speech (spec §3 `ListeningMode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListeningMode {
    AutoStop,
    ManualStop,
    Realtime,
}

/// Every non-audio, non-downlink message the facade can emit on the audio
/// channel (spec §4.4 `send_*` operations). Serializes to the same
/// `{"type": ..., ...}` shape as the downlink/ACK schemas in §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Listen {
        state: ListenState,
        #[serde(skip_serializing_if = "Option::is_none")]
        mode: Option<ListeningMode>,
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    Abort {
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Text {
        text: String,
    },
    IotDescriptors {
        descriptors: serde_json::Value,
    },
    IotStates {
        states: serde_json::Value,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenState {
    Detect,
    Start,
    Stop,
}

impl OutboundMessage {
    pub fn wake_word_detected(tag: impl Into<String>) -> Self {
        OutboundMessage::Listen {
            state: ListenState::Detect,
            mode: None,
            text: Some(tag.into()),
        }
    }

    pub fn start_listening(mode: ListeningMode) -> Self {
        OutboundMessage::Listen {
            state: ListenState::Start,
            mode: Some(mode),
            text: None,
        }
    }

    pub fn stop_listening() -> Self {
        OutboundMessage::Listen {
            state: ListenState::Stop,
            mode: None,
            text: None,
        }
    }

    pub fn abort_speaking(reason: Option<String>) -> Self {
        OutboundMessage::Abort { reason }
    }

    pub fn text(payload: impl Into<String>) -> Self {
        OutboundMessage::Text { text: payload.into() }
    }
}
