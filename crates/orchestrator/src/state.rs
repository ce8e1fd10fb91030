//! Device Lifecycle State Machine (spec §4.6, C6): the 10-state enum and
//! its canonical transition table. This module owns *validity*, not side
//! effects — [`crate::orchestrator::Orchestrator`] drives the actual
//! transition side effects (display, capture, wake-word) once a transition
//! is accepted here, keeping pure bookkeeping separate from the effectful
//! loop around it.

use std::fmt;
use std::sync::Mutex;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceState {
    Unknown,
    Starting,
    Configuring,
    Idle,
    Connecting,
    Listening,
    Speaking,
    Upgrading,
    Activating,
    FatalError,
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceState::Unknown => "unknown",
            DeviceState::Starting => "starting",
            DeviceState::Configuring => "configuring",
            DeviceState::Idle => "idle",
            DeviceState::Connecting => "connecting",
            DeviceState::Listening => "listening",
            DeviceState::Speaking => "speaking",
            DeviceState::Upgrading => "upgrading",
            DeviceState::Activating => "activating",
            DeviceState::FatalError => "fatal_error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("transition {from} -> {to} is not allowed")]
pub struct StateTransitionError {
    pub from: DeviceState,
    pub to: DeviceState,
}

/// The canonical transition table (spec §4.6). `FatalError` is reachable
/// from any state and is terminal; every other edge is listed explicitly.
fn is_canonical(from: DeviceState, to: DeviceState) -> bool {
    use DeviceState::*;
    if to == FatalError {
        return from != FatalError;
    }
    matches!(
        (from, to),
        (Unknown, Starting)
            | (Starting, Configuring)
            | (Configuring, Idle)
            | (Idle, Connecting)
            | (Connecting, Idle)
            | (Connecting, Listening)
            | (Listening, Speaking)
            | (Speaking, Listening)
            | (Listening, Idle)
            | (Speaking, Idle)
            | (Idle, Upgrading)
            | (Idle, Activating)
            | (Activating, Idle)
    )
}

/// A mutex-guarded current state (spec §5 "Device state: written only by
/// the serializer; read elsewhere as atomic observation" — the mutex here
/// stands in for "only the serializer ever calls `transition`").
pub struct StateMachine {
    current: Mutex<DeviceState>,
}

impl StateMachine {
    pub fn new(initial: DeviceState) -> Self {
        Self { current: Mutex::new(initial) }
    }

    pub fn current(&self) -> DeviceState {
        *self.current.lock().expect("state mutex poisoned")
    }

    /// Attempts the transition. Setting the state to itself is always a
    /// no-op that does not count as a transition (spec §8 "no idempotent
    /// transitions") and returns `Ok(false)`; a canonical transition
    /// applies and returns `Ok(true)`; anything else is rejected.
    pub fn transition(&self, to: DeviceState) -> Result<bool, StateTransitionError> {
        let mut current = self.current.lock().expect("state mutex poisoned");
        if *current == to {
            return Ok(false);
        }
        if !is_canonical(*current, to) {
            return Err(StateTransitionError { from: *current, to });
        }
        *current = to;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use DeviceState::*;

    #[test]
    fn starting_path_is_canonical() {
        let sm = StateMachine::new(Unknown);
        assert_eq!(sm.transition(Starting), Ok(true));
        assert_eq!(sm.transition(Configuring), Ok(true));
        assert_eq!(sm.transition(Idle), Ok(true));
    }

    #[test]
    fn same_state_transition_is_a_no_op() {
        let sm = StateMachine::new(Idle);
        assert_eq!(sm.transition(Idle), Ok(false));
        assert_eq!(sm.current(), Idle);
    }

    #[test]
    fn disallowed_edge_is_rejected_and_state_unchanged() {
        let sm = StateMachine::new(Idle);
        assert_eq!(sm.transition(Speaking), Err(StateTransitionError { from: Idle, to: Speaking }));
        assert_eq!(sm.current(), Idle);
    }

    #[test]
    fn any_state_can_reach_fatal_error_except_itself() {
        let sm = StateMachine::new(Listening);
        assert_eq!(sm.transition(FatalError), Ok(true));
        let sm = StateMachine::new(FatalError);
        assert_eq!(sm.transition(FatalError), Ok(false));
    }

    #[test]
    fn listening_speaking_is_bidirectional() {
        let sm = StateMachine::new(Listening);
        assert_eq!(sm.transition(Speaking), Ok(true));
        assert_eq!(sm.transition(Listening), Ok(true));
    }
}
