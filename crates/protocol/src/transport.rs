//! The wire-level collaborator [`Transport`] abstracts over (spec §4.4):
//! the real socket/MQTT client is an external dependency the facade does
//! not own, so callers depend on this trait and never a concrete client
//! type.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport not connected")]
    NotConnected,
    #[error("transport closed")]
    Closed,
    #[error("transport io error: {0}")]
    Io(String),
}

/// A single inbound frame: the topic it arrived on and its raw payload.
pub type InboundFrame = (String, Vec<u8>);

#[async_trait]
pub trait Transport: Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Blocks until the next inbound frame on any subscribed topic, or
    /// returns `Err` once the transport can no longer produce one.
    async fn recv(&self) -> Result<InboundFrame, TransportError>;
}

/// An in-memory [`Transport`] for the host simulator and tests: frames
/// published to `loopback_topic` are handed back out through `recv`,
/// everything else is swallowed. Stands in for the real MQTT/WebSocket
/// client so the orchestrator core can be exercised without a broker.
pub struct LoopbackTransport {
    loopback_topic: String,
    inbound: tokio::sync::Mutex<tokio::sync::mpsc::UnboundedReceiver<InboundFrame>>,
    inject: tokio::sync::mpsc::UnboundedSender<InboundFrame>,
}

impl LoopbackTransport {
    pub fn new(loopback_topic: impl Into<String>) -> Self {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        Self {
            loopback_topic: loopback_topic.into(),
            inbound: tokio::sync::Mutex::new(rx),
            inject: tx,
        }
    }

    /// Injects a frame as if it had arrived over the wire, for driving
    /// downlink-handling tests without a real broker.
    pub fn inject(&self, topic: impl Into<String>, payload: Vec<u8>) {
        let _ = self.inject.send((topic.into(), payload));
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        if topic == self.loopback_topic {
            let _ = self.inject.send((topic.to_string(), payload));
        }
        Ok(())
    }

    async fn recv(&self) -> Result<InboundFrame, TransportError> {
        let mut rx = self.inbound.lock().await;
        rx.recv().await.ok_or(TransportError::Closed)
    }
}
