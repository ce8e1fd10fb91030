//! [`ProtocolFacade`] (C4): the single point through which the rest of the
//! system talks to the network (spec §4.4), presenting the named operation
//! surface spec §4.4 lists rather than a generic pub/sub API. It wraps one
//! concrete [`Transport`] — WebSocket or MQTT/UDP in the real firmware,
//! [`LoopbackTransport`](crate::transport::LoopbackTransport) for the host
//! simulator and tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use bytes::Bytes;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;

use kestrel_config::NetworkConfig;

use crate::events::ProtocolEvent;
use crate::messages::{ListeningMode, OutboundMessage};
use crate::transport::{Transport, TransportError};
use crate::watchdog::{Watchdog, WatchdogState};

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("failed to encode outgoing payload: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode downlink payload: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Audio-channel control frame: a `{"type": "hello"|"bye"}` sent over the
/// same topic as audio payloads to mark channel lifecycle, since the real
/// handshake (WebSocket upgrade / MQTT connect) is an external collaborator
/// (spec §1) this facade does not own.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ChannelControl {
    Hello,
    Bye,
}

pub struct ProtocolFacade<T: Transport> {
    transport: T,
    network: NetworkConfig,
    watchdog: Watchdog,
    channel_open: AtomicBool,
    /// Set for the duration of a locally-initiated close so the event loop
    /// can tell it apart from a silent remote drop (spec §4.4 watchdog).
    local_close_in_flight: AtomicBool,
}

impl<T: Transport> ProtocolFacade<T> {
    pub fn new(transport: T, network: NetworkConfig, watchdog: Watchdog) -> Self {
        Self {
            transport,
            network,
            watchdog,
            channel_open: AtomicBool::new(false),
            local_close_in_flight: AtomicBool::new(false),
        }
    }

    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }

    pub fn is_channel_open(&self) -> bool {
        self.channel_open.load(Ordering::SeqCst)
    }

    fn audio_topic(&self) -> String {
        format!("devices/{}/audio", self.network.client_id)
    }

    /// Opens the audio channel (spec §4.4). Returns `false` — never an
    /// error — on transport failure, matching §7's "TransportFailure:
    /// channel open failed ... transition to Idle" (the caller, not this
    /// facade, owns the Idle transition).
    pub async fn open_audio_channel(&self) -> bool {
        let hello = match serde_json::to_vec(&ChannelControl::Hello) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(?err, "failed to encode channel hello");
                return false;
            }
        };
        match self.transport.publish(&self.audio_topic(), hello).await {
            Ok(()) => {
                self.channel_open.store(true, Ordering::SeqCst);
                true
            }
            Err(err) => {
                warn!(?err, "failed to open audio channel");
                false
            }
        }
    }

    pub async fn close_audio_channel(&self) {
        if !self.channel_open.swap(false, Ordering::SeqCst) {
            return;
        }
        self.local_close_in_flight.store(true, Ordering::SeqCst);
        if let Ok(bye) = serde_json::to_vec(&ChannelControl::Bye) {
            let _ = self.transport.publish(&self.audio_topic(), bye).await;
        }
        self.local_close_in_flight.store(false, Ordering::SeqCst);
    }

    pub async fn send_audio(&self, opus_bytes: Bytes) -> Result<(), ProtocolError> {
        self.transport.publish(&self.audio_topic(), opus_bytes.to_vec()).await?;
        Ok(())
    }

    async fn send_outbound(&self, message: OutboundMessage) -> Result<(), ProtocolError> {
        let bytes = serde_json::to_vec(&message).map_err(ProtocolError::Encode)?;
        self.transport.publish(&self.audio_topic(), bytes).await?;
        Ok(())
    }

    pub async fn send_text(&self, payload: &str) -> Result<(), ProtocolError> {
        self.send_outbound(OutboundMessage::text(payload)).await
    }

    pub async fn send_wake_word_detected(&self, tag: &str) -> Result<(), ProtocolError> {
        self.send_outbound(OutboundMessage::wake_word_detected(tag)).await
    }

    pub async fn send_start_listening(&self, mode: ListeningMode) -> Result<(), ProtocolError> {
        self.send_outbound(OutboundMessage::start_listening(mode)).await
    }

    pub async fn send_stop_listening(&self) -> Result<(), ProtocolError> {
        self.send_outbound(OutboundMessage::stop_listening()).await
    }

    pub async fn send_abort_speaking(&self, reason: Option<String>) -> Result<(), ProtocolError> {
        self.send_outbound(OutboundMessage::abort_speaking(reason)).await
    }

    pub async fn send_iot_descriptors(&self, descriptors: Value) -> Result<(), ProtocolError> {
        self.send_outbound(OutboundMessage::IotDescriptors { descriptors }).await
    }

    pub async fn send_iot_states(&self, states: Value) -> Result<(), ProtocolError> {
        self.send_outbound(OutboundMessage::IotStates { states }).await
    }

    /// Publishes a serializable payload to the uplink topic (telemetry,
    /// spec §6).
    pub async fn send_uplink<P: serde::Serialize>(&self, payload: &P) -> Result<(), ProtocolError> {
        let bytes = serde_json::to_vec(payload).map_err(ProtocolError::Encode)?;
        self.transport.publish(&self.network.uplink_topic(), bytes).await?;
        Ok(())
    }

    /// Acknowledges a downlink request (spec §4.5/§6).
    pub async fn send_ack(&self, ack: &Value) -> Result<(), ProtocolError> {
        let bytes = serde_json::to_vec(ack).map_err(ProtocolError::Encode)?;
        self.transport.publish(&self.network.ack_topic(), bytes).await?;
        Ok(())
    }

    /// Drains one inbound frame, feeds the watchdog, and translates it into
    /// a [`ProtocolEvent`] for the caller's event loop to post onto the
    /// task serializer (spec §9 "callbacks own a sender to the
    /// serializer").
    pub async fn recv_event(&self, now: Instant) -> Result<ProtocolEvent, ProtocolError> {
        loop {
            let (topic, payload) = match self.transport.recv().await {
                Ok(frame) => frame,
                Err(err) => return Ok(ProtocolEvent::NetworkError(err.to_string())),
            };
            self.watchdog.note_activity(now);

            if topic == self.network.downlink_topic() || topic == self.network.uplink_topic() || topic == self.network.ack_topic()
            {
                // Filters out messages on topics the device itself
                // publishes (spec §4.5), except the downlink topic it
                // consumes.
                if topic != self.network.downlink_topic() {
                    continue;
                }
                match serde_json::from_slice::<Value>(&payload) {
                    Ok(value) => return Ok(ProtocolEvent::IncomingJson(value)),
                    Err(err) => return Err(ProtocolError::Decode(err)),
                }
            }

            if topic == self.audio_topic() {
                if let Ok(control) = serde_json::from_slice::<ChannelControl>(&payload) {
                    match control {
                        ChannelControl::Hello => continue,
                        ChannelControl::Bye => {
                            let was_open = self.channel_open.swap(false, Ordering::SeqCst);
                            let local = self.local_close_in_flight.load(Ordering::SeqCst);
                            if was_open {
                                return Ok(ProtocolEvent::ChannelClosed { local });
                            }
                            continue;
                        }
                    }
                }
                return Ok(ProtocolEvent::IncomingAudio(Bytes::from(payload)));
            }

            warn!(%topic, "ignoring frame on unrecognized topic");
        }
    }

    /// Checks the watchdog and, on silence, claims the at-most-once
    /// recovery guard. Returns `true` only when the caller has just
    /// claimed the guard and should attempt reconnection.
    pub fn should_attempt_recovery(&self, now: Instant) -> bool {
        self.watchdog.check(now) == WatchdogState::Silent && self.watchdog.try_begin_recovery()
    }
}

/// Convenience alias for callers that only need the event channel type.
pub type ProtocolEventSender = mpsc::UnboundedSender<ProtocolEvent>;
