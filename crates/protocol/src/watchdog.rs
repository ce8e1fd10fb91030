//! Silent-link detection (spec §4.4). The facade feeds every successful
//! receive (downlink traffic, acks, or pings) to [`Watchdog::note_activity`];
//! the runtime's clock tick calls [`Watchdog::check`] to learn whether the
//! link has gone quiet for longer than the configured timeout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogState {
    Alive,
    Silent,
}

pub struct Watchdog {
    timeout: Duration,
    last_activity: Mutex<Instant>,
    /// Guards against re-entrant recovery: a second silent-timeout tick
    /// while recovery from the first is still in flight is a no-op.
    recovering: AtomicBool,
}

impl Watchdog {
    pub fn new(timeout: Duration, now: Instant) -> Self {
        Self {
            timeout,
            last_activity: Mutex::new(now),
            recovering: AtomicBool::new(false),
        }
    }

    pub fn note_activity(&self, now: Instant) {
        *self.last_activity.lock().expect("watchdog mutex poisoned") = now;
    }

    pub fn check(&self, now: Instant) -> WatchdogState {
        let last = *self.last_activity.lock().expect("watchdog mutex poisoned");
        if now.duration_since(last) >= self.timeout {
            WatchdogState::Silent
        } else {
            WatchdogState::Alive
        }
    }

    /// At-most-once re-entry guard: returns `true` (and claims the guard)
    /// only if no recovery attempt is already in flight. The caller must
    /// call [`Watchdog::end_recovery`] once the attempt concludes, success
    /// or failure.
    pub fn try_begin_recovery(&self) -> bool {
        self.recovering
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn end_recovery(&self, now: Instant) {
        self.recovering.store(false, Ordering::Release);
        self.note_activity(now);
    }
}
