//! Alarm Pre-emption Protocol (spec §4.7, C7): deciding *whether* and
//! *from which state* a proximate alarm should preempt in-flight activity,
//! plus the small piece of state (`armed flags`) the orchestrator consults
//! each audio-loop iteration. The actual side effects (aborting speech,
//! discarding capture, playing the prelude) live in
//! [`crate::orchestrator::Orchestrator`], which has the collaborators this
//! module deliberately does not depend on.

use std::sync::Mutex;
use std::time::Instant;

use crate::state::DeviceState;

#[derive(Debug, Clone)]
pub struct PendingAlarm {
    pub name: String,
    pub prelude_started_at: Instant,
}

/// Pure trigger rule (spec §4.7 "Trigger"): preemption starts when none is
/// already active, the device is in a preemptible state, and the
/// proximate alarm is strictly within the lead window.
pub fn should_trigger(state: DeviceState, preemption_active: bool, seconds_until_fire: i64, lead_seconds: i64) -> bool {
    if preemption_active {
        return false;
    }
    if !matches!(state, DeviceState::Idle | DeviceState::Listening | DeviceState::Speaking) {
        return false;
    }
    seconds_until_fire > 0 && seconds_until_fire <= lead_seconds
}

#[derive(Default)]
struct Inner {
    active: bool,
    prelude_playing: bool,
    pending: Option<PendingAlarm>,
}

/// The armed flags from spec §4.7: `preemption_active` (re-entry guard),
/// `prelude_playing` (with `prelude_start`), and `pending_alarm_name`.
pub struct PreemptionState {
    inner: Mutex<Inner>,
}

impl Default for PreemptionState {
    fn default() -> Self {
        Self::new()
    }
}

impl PreemptionState {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner::default()) }
    }

    pub fn is_active(&self) -> bool {
        self.inner.lock().expect("preemption mutex poisoned").active
    }

    pub fn prelude_playing(&self) -> bool {
        self.inner.lock().expect("preemption mutex poisoned").prelude_playing
    }

    pub fn pending_alarm_name(&self) -> Option<String> {
        self.inner
            .lock()
            .expect("preemption mutex poisoned")
            .pending
            .as_ref()
            .map(|p| p.name.clone())
    }

    /// Arms preemption for `name` and marks the prelude as playing from
    /// `now`.
    pub fn start(&self, name: String, now: Instant) {
        let mut inner = self.inner.lock().expect("preemption mutex poisoned");
        inner.active = true;
        inner.prelude_playing = true;
        inner.pending = Some(PendingAlarm { name, prelude_started_at: now });
    }

    /// Clears every armed flag (spec §4.7 "Reset" and the fire-handoff
    /// path, both of which fully disarm preemption).
    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("preemption mutex poisoned");
        inner.active = false;
        inner.prelude_playing = false;
        inner.pending = None;
    }

    /// Clears only the prelude flag, leaving `active`/`pending` untouched —
    /// used when state becomes `Idle` outside a preemption (spec §4.7
    /// "Reset": "when state becomes Idle outside a preemption, the prelude
    /// flag is cleared").
    pub fn clear_prelude_only(&self) {
        self.inner.lock().expect("preemption mutex poisoned").prelude_playing = false;
    }
}
