//! Incoming events the facade produces (spec §4.4 "Incoming callbacks").
//! Rather than C-style callbacks holding an application back-reference, the
//! facade posts these onto an `mpsc` channel — callbacks own a sender to
//! the serializer, not an application pointer.

use bytes::Bytes;
use serde_json::Value;

#[derive(Debug, Clone)]
pub enum ProtocolEvent {
    NetworkError(String),
    ChannelOpen,
    /// The channel closed. `local` distinguishes a close we initiated
    /// (`close_audio_channel`) from one the far end or transport dropped —
    /// the watchdog (spec §4.4) only reacts to the latter.
    ChannelClosed { local: bool },
    IncomingAudio(Bytes),
    IncomingJson(Value),
}
