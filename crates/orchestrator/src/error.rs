//! `OrchestratorError` (spec §7 taxonomy) and the bounded diagnostics ring
//! that records the last 32 of them (spec SPEC_FULL.md §4 Additions,
//! grounded on `original_source/main/error/error_handling.cc`'s small
//! ring-buffer diagnostics surface).

use std::collections::VecDeque;
use std::sync::Mutex;

use thiserror::Error;

/// One error "kind" per spec §7, independent of which subsystem raised it.
/// Narrower per-crate errors (`kestrel_alarm::AlarmError`,
/// `kestrel_protocol::ProtocolError`) fold into this at the orchestrator
/// call site, which is the one place a caller needs to match on kind —
/// everywhere upstream of it just propagates.
#[derive(Debug, Error, Clone)]
pub enum OrchestratorError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("alarm store is full")]
    Capacity,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("transport failure: {0}")]
    TransportFailure(String),
    #[error("silent protocol timeout")]
    SilentTimeout,
    #[error("corrupted persisted row, defaults substituted: {0}")]
    CorruptedRow(String),
    #[error("fatal: {0}")]
    Fatal(String),
}

impl From<kestrel_alarm::AlarmError> for OrchestratorError {
    fn from(err: kestrel_alarm::AlarmError) -> Self {
        match err {
            kestrel_alarm::AlarmError::InvalidArgument(msg) => OrchestratorError::InvalidArgument(msg),
            kestrel_alarm::AlarmError::Capacity => OrchestratorError::Capacity,
            kestrel_alarm::AlarmError::NotFound(name) => OrchestratorError::NotFound(name),
        }
    }
}

impl From<kestrel_protocol::ProtocolError> for OrchestratorError {
    fn from(err: kestrel_protocol::ProtocolError) -> Self {
        OrchestratorError::TransportFailure(err.to_string())
    }
}

impl From<kestrel_iot::DispatchError> for OrchestratorError {
    fn from(err: kestrel_iot::DispatchError) -> Self {
        match err {
            kestrel_iot::DispatchError::UnknownThing(name) => OrchestratorError::NotFound(name),
            kestrel_iot::DispatchError::Denied { name, method } => {
                OrchestratorError::InvalidArgument(format!("{name}.{method} is denied by policy"))
            }
            kestrel_iot::DispatchError::Thing(err) => OrchestratorError::InvalidArgument(err.to_string()),
        }
    }
}

const RING_CAPACITY: usize = 32;

/// A bounded ring of the most recent errors, surfaced read-only for the
/// simulator's `status` command and the telemetry heartbeat (SPEC_FULL.md
/// §4 Additions).
#[derive(Default)]
pub struct ErrorRing {
    entries: Mutex<VecDeque<OrchestratorError>>,
}

impl ErrorRing {
    pub fn new() -> Self {
        Self { entries: Mutex::new(VecDeque::with_capacity(RING_CAPACITY)) }
    }

    pub fn push(&self, error: OrchestratorError) {
        let mut entries = self.entries.lock().expect("error ring mutex poisoned");
        if entries.len() == RING_CAPACITY {
            entries.pop_front();
        }
        entries.push_back(error);
    }

    /// Oldest-first snapshot of the ring's current contents.
    pub fn snapshot(&self) -> Vec<String> {
        self.entries
            .lock()
            .expect("error ring mutex poisoned")
            .iter()
            .map(|e| e.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_drops_oldest_past_capacity() {
        let ring = ErrorRing::new();
        for i in 0..(RING_CAPACITY + 5) {
            ring.push(OrchestratorError::NotFound(format!("alarm-{i}")));
        }
        let snapshot = ring.snapshot();
        assert_eq!(snapshot.len(), RING_CAPACITY);
        assert!(snapshot[0].contains("alarm-5"));
        assert!(snapshot.last().unwrap().contains(&format!("alarm-{}", RING_CAPACITY + 4)));
    }
}
