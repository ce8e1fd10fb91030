//! The alarm scheduler (spec §4.2, C2): a 10-slot table guarded by a single
//! mutex, taking `now` as an explicit parameter everywhere rather than
//! reading the wall clock internally, so recurrence math stays testable.

use std::sync::Mutex;

use chrono::{DateTime, TimeZone};
use chrono_tz::Tz;
use thiserror::Error;
use tracing::warn;

use crate::model::{Alarm, Repeat, MAX_NAME_LEN, STORE_CAPACITY};
use crate::persistence::AlarmTable;
use crate::recurrence;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AlarmError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("alarm table is full")]
    Capacity,
    #[error("no alarm named {0:?}")]
    NotFound(String),
}

pub struct AlarmScheduler {
    table: AlarmTable,
    slots: Mutex<[Option<Alarm>; STORE_CAPACITY]>,
}

impl AlarmScheduler {
    pub fn new(table: AlarmTable) -> Self {
        let slots = table.load();
        Self {
            table,
            slots: Mutex::new(slots),
        }
    }

    fn persist(&self, slots: &[Option<Alarm>; STORE_CAPACITY]) {
        if let Err(err) = self.table.save(slots) {
            warn!(?err, "failed to persist alarm table");
        }
    }

    fn validate_name(name: &str) -> Result<(), AlarmError> {
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(AlarmError::InvalidArgument(format!(
                "alarm name must be 1..={MAX_NAME_LEN} bytes, got {}",
                name.len()
            )));
        }
        Ok(())
    }

    fn validate_hhmm(hour: u32, minute: u32) -> Result<(), AlarmError> {
        if hour > 23 || minute > 59 {
            return Err(AlarmError::InvalidArgument(format!(
                "invalid time of day {hour:02}:{minute:02}"
            )));
        }
        Ok(())
    }

    /// The §3 invariant mask for `repeat`, or — for `Weekly` — `days_mask`
    /// itself, validated non-zero.
    fn effective_mask(repeat: Repeat, days_mask: u8) -> Result<u8, AlarmError> {
        match repeat.fixed_days_mask() {
            Some(fixed) => Ok(fixed),
            None => {
                if days_mask == 0 || days_mask > 0b111_1111 {
                    Err(AlarmError::InvalidArgument(format!(
                        "weekly days_mask must be in 1..=127, got {days_mask}"
                    )))
                } else {
                    Ok(days_mask)
                }
            }
        }
    }

    /// Finds the alarm's existing slot by name, or the first free slot.
    /// Upserting an existing name never consumes table capacity.
    fn slot_for_upsert(slots: &[Option<Alarm>; STORE_CAPACITY], name: &str) -> Result<usize, AlarmError> {
        if let Some(i) = slots.iter().position(|s| s.as_ref().map(|a| a.name == name).unwrap_or(false)) {
            return Ok(i);
        }
        slots
            .iter()
            .position(|s| s.is_none())
            .ok_or(AlarmError::Capacity)
    }

    fn upsert(
        &self,
        name: &str,
        next_fire: DateTime<Tz>,
        repeat: Repeat,
        days_mask: u8,
    ) -> Result<(), AlarmError> {
        Self::validate_name(name)?;
        let mut slots = self.slots.lock().expect("alarm mutex poisoned");
        let i = Self::slot_for_upsert(&slots, name)?;
        slots[i] = Some(Alarm {
            name: name.to_string(),
            next_fire: next_fire.timestamp(),
            repeat,
            days_mask,
            enabled: true,
        });
        self.persist(&slots);
        Ok(())
    }

    /// `seconds_from_now` arms the fire time; `repeat`/`days_mask` set the
    /// recurrence the same as the dedicated `set_*` operations (spec §4.2).
    pub fn set_relative(
        &self,
        name: &str,
        now: DateTime<Tz>,
        seconds_from_now: i64,
        repeat: Repeat,
        days_mask: u8,
    ) -> Result<(), AlarmError> {
        if seconds_from_now <= 0 {
            return Err(AlarmError::InvalidArgument(
                "relative alarms must fire strictly in the future".to_string(),
            ));
        }
        let mask = Self::effective_mask(repeat, days_mask)?;
        let fire = now + chrono::Duration::seconds(seconds_from_now);
        self.upsert(name, fire, repeat, mask)
    }

    pub fn set_daily(&self, name: &str, now: DateTime<Tz>, hour: u32, minute: u32) -> Result<(), AlarmError> {
        Self::validate_hhmm(hour, minute)?;
        let fire = recurrence::next_instant_for_time(now, hour, minute);
        self.upsert(name, fire, Repeat::Daily, Repeat::Daily.fixed_days_mask().unwrap())
    }

    pub fn set_weekly(
        &self,
        name: &str,
        now: DateTime<Tz>,
        hour: u32,
        minute: u32,
        days_mask: u8,
    ) -> Result<(), AlarmError> {
        Self::validate_hhmm(hour, minute)?;
        let mask = Self::effective_mask(Repeat::Weekly, days_mask)?;
        let fire = recurrence::next_instant_for_weekday_mask(now, hour, minute, mask)
            .expect("a non-zero mask always matches within a week");
        self.upsert(name, fire, Repeat::Weekly, mask)
    }

    pub fn set_workdays(&self, name: &str, now: DateTime<Tz>, hour: u32, minute: u32) -> Result<(), AlarmError> {
        Self::validate_hhmm(hour, minute)?;
        let mask = Repeat::Workdays.fixed_days_mask().unwrap();
        let fire = recurrence::next_instant_for_weekday_mask(now, hour, minute, mask)
            .expect("workdays mask always matches within a week");
        self.upsert(name, fire, Repeat::Workdays, mask)
    }

    pub fn set_weekends(&self, name: &str, now: DateTime<Tz>, hour: u32, minute: u32) -> Result<(), AlarmError> {
        Self::validate_hhmm(hour, minute)?;
        let mask = Repeat::Weekends.fixed_days_mask().unwrap();
        let fire = recurrence::next_instant_for_weekday_mask(now, hour, minute, mask)
            .expect("weekends mask always matches within a week");
        self.upsert(name, fire, Repeat::Weekends, mask)
    }

    pub fn enable(&self, name: &str, enabled: bool) -> Result<(), AlarmError> {
        let mut slots = self.slots.lock().expect("alarm mutex poisoned");
        let slot = slots
            .iter_mut()
            .find(|s| s.as_ref().map(|a| a.name == name).unwrap_or(false))
            .ok_or_else(|| AlarmError::NotFound(name.to_string()))?;
        slot.as_mut().unwrap().enabled = enabled;
        self.persist(&slots);
        Ok(())
    }

    pub fn cancel(&self, name: &str) -> Result<(), AlarmError> {
        let mut slots = self.slots.lock().expect("alarm mutex poisoned");
        let i = slots
            .iter()
            .position(|s| s.as_ref().map(|a| a.name == name).unwrap_or(false))
            .ok_or_else(|| AlarmError::NotFound(name.to_string()))?;
        slots[i] = None;
        self.persist(&slots);
        Ok(())
    }

    /// The enabled alarm with the smallest `next_fire` strictly after `now`.
    pub fn proximate(&self, now: DateTime<Tz>) -> Option<Alarm> {
        let slots = self.slots.lock().expect("alarm mutex poisoned");
        slots
            .iter()
            .flatten()
            .filter(|a| a.enabled && a.next_fire > now.timestamp())
            .min_by_key(|a| a.next_fire)
            .cloned()
    }

    /// The delay, in seconds, at which the caller's single timer should be
    /// armed — `proximate(now).next_fire - now`, or `None` when nothing is
    /// armed.
    pub fn next_wakeup(&self, now: DateTime<Tz>) -> Option<i64> {
        self.proximate(now).map(|a| a.next_fire - now.timestamp())
    }

    /// Every occupied slot, in slot order — used by the `AlarmClock` IoT
    /// thing adapter to report a state snapshot without needing a `now`.
    pub fn all(&self) -> Vec<Alarm> {
        self.slots
            .lock()
            .expect("alarm mutex poisoned")
            .iter()
            .flatten()
            .cloned()
            .collect()
    }

    /// Removes `Once` alarms with `next_fire <= now`, regardless of
    /// `enabled`; recurring alarms are untouched (spec §4.2/§8).
    pub fn clear_overdue(&self, now: DateTime<Tz>) -> usize {
        let mut slots = self.slots.lock().expect("alarm mutex poisoned");
        let mut cleared = 0;
        for slot in slots.iter_mut() {
            let overdue = slot
                .as_ref()
                .map(|a| a.repeat == Repeat::Once && a.next_fire <= now.timestamp())
                .unwrap_or(false);
            if overdue {
                *slot = None;
                cleared += 1;
            }
        }
        if cleared > 0 {
            self.persist(&slots);
        }
        cleared
    }

    /// Boot-time catch-up (spec §4.2): every enabled recurring alarm whose
    /// `next_fire` is already in the past is advanced, possibly through
    /// several occurrences, until strictly future. `Once` alarms are left
    /// for [`clear_overdue`].
    pub fn catch_up(&self, now: DateTime<Tz>) {
        let mut slots = self.slots.lock().expect("alarm mutex poisoned");
        let mut touched = false;
        for slot in slots.iter_mut() {
            let Some(alarm) = slot.as_mut() else { continue };
            if alarm.repeat == Repeat::Once || !alarm.enabled || alarm.next_fire > now.timestamp() {
                continue;
            }
            touched = true;
            let mask = alarm.effective_days_mask();
            while alarm.next_fire <= now.timestamp() {
                let prev_local = now.timezone().timestamp_opt(alarm.next_fire, 0).single().unwrap_or(now);
                match advance(alarm.repeat, prev_local, mask) {
                    Some(next) => alarm.next_fire = next.timestamp(),
                    None => break,
                }
            }
        }
        if touched {
            self.persist(&slots);
        }
    }

    /// Fire-handoff (spec §4.7): the first enabled alarm (by slot order)
    /// with `next_fire <= now` is reported back (for the caller to read its
    /// `name`/`repeat`); recurring alarms are rescheduled in place, and any
    /// overdue `Once` alarms — including the one just reported, if it was
    /// `Once` — are swept away. Returns `None` if nothing is due.
    pub fn on_alarm(&self, now: DateTime<Tz>) -> Option<Alarm> {
        let mut slots = self.slots.lock().expect("alarm mutex poisoned");
        let i = slots
            .iter()
            .position(|s| s.as_ref().map(|a| a.enabled && a.next_fire <= now.timestamp()).unwrap_or(false))?;
        let fired = slots[i].clone().unwrap();

        if fired.repeat != Repeat::Once {
            let alarm = slots[i].as_mut().unwrap();
            let mask = alarm.effective_days_mask();
            // Anchor on the alarm's own scheduled fire time, not `now` —
            // using `now` would let timer-firing jitter drift the hh:mm
            // forward by a few seconds every cycle instead of holding it
            // fixed (spec §4.2 "interpret the alarm's current fire time").
            let prev_local = now.timezone().timestamp_opt(alarm.next_fire, 0).single().unwrap_or(now);
            if let Some(next) = advance(alarm.repeat, prev_local, mask) {
                alarm.next_fire = next.timestamp();
            }
        }

        for slot in slots.iter_mut() {
            let overdue = slot
                .as_ref()
                .map(|a| a.repeat == Repeat::Once && a.next_fire <= now.timestamp())
                .unwrap_or(false);
            if overdue {
                *slot = None;
            }
        }

        self.persist(&slots);
        Some(fired)
    }
}

fn advance(repeat: Repeat, prev_fire_local: DateTime<Tz>, days_mask: u8) -> Option<DateTime<Tz>> {
    match repeat {
        Repeat::Once => None,
        Repeat::Daily => Some(recurrence::advance_daily(prev_fire_local)),
        Repeat::Weekly | Repeat::Workdays | Repeat::Weekends => {
            recurrence::advance_weekday_mask(prev_fire_local, days_mask)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler() -> (AlarmScheduler, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let table = AlarmTable::new(dir.path().join("alarms.json"));
        (AlarmScheduler::new(table), dir)
    }

    #[test]
    fn set_relative_then_proximate() {
        let (sched, _dir) = scheduler();
        let now = chrono_tz::UTC.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        sched.set_relative("tea", now, 60, Repeat::Once, 0).unwrap();
        let proximate = sched.proximate(now).unwrap();
        assert_eq!(proximate.name, "tea");
        assert_eq!(proximate.next_fire, now.timestamp() + 60);
    }

    #[test]
    fn proximate_excludes_non_future_alarms() {
        let (sched, _dir) = scheduler();
        let now = chrono_tz::UTC.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        sched.set_relative("tea", now, 60, Repeat::Once, 0).unwrap();
        let at_fire = now + chrono::Duration::seconds(60);
        assert!(sched.proximate(at_fire).is_none());
    }

    #[test]
    fn set_relative_rejects_non_positive_offsets() {
        let (sched, _dir) = scheduler();
        let now = chrono_tz::UTC.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        assert_eq!(
            sched.set_relative("x", now, 0, Repeat::Once, 0),
            Err(AlarmError::InvalidArgument(
                "relative alarms must fire strictly in the future".to_string()
            ))
        );
    }

    #[test]
    fn set_relative_rejects_zero_weekly_mask() {
        let (sched, _dir) = scheduler();
        let now = chrono_tz::UTC.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        assert!(sched.set_relative("x", now, 60, Repeat::Weekly, 0).is_err());
    }

    #[test]
    fn capacity_is_enforced_but_upsert_is_free() {
        let (sched, _dir) = scheduler();
        let now = chrono_tz::UTC.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        for i in 0..STORE_CAPACITY {
            sched.set_relative(&format!("a{i}"), now, 60, Repeat::Once, 0).unwrap();
        }
        assert_eq!(
            sched.set_relative("overflow", now, 60, Repeat::Once, 0),
            Err(AlarmError::Capacity)
        );
        // Re-setting an existing name is an upsert, not a new allocation.
        sched.set_relative("a0", now, 120, Repeat::Once, 0).unwrap();
        assert_eq!(sched.proximate(now).unwrap().next_fire, now.timestamp() + 60);
    }

    #[test]
    fn cancel_then_not_found() {
        let (sched, _dir) = scheduler();
        let now = chrono_tz::UTC.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        sched.set_relative("once", now, 60, Repeat::Once, 0).unwrap();
        sched.cancel("once").unwrap();
        assert_eq!(sched.cancel("once"), Err(AlarmError::NotFound("once".to_string())));
    }

    #[test]
    fn on_alarm_retires_once_and_rearms_daily() {
        let (sched, _dir) = scheduler();
        let now = chrono_tz::UTC.with_ymd_and_hms(2024, 1, 1, 7, 0, 0).unwrap();
        sched.set_relative("once", now, 60, Repeat::Once, 0).unwrap();
        sched.set_daily("daily", now, 6, 0).unwrap();

        let at_fire = now + chrono::Duration::seconds(60);
        let fired = sched.on_alarm(at_fire).unwrap();
        assert_eq!(fired.name, "once");
        assert!(sched.proximate(at_fire).is_some());

        let fired_at = chrono_tz::UTC.with_ymd_and_hms(2024, 1, 2, 6, 0, 0).unwrap();
        let fired = sched.on_alarm(fired_at).unwrap();
        assert_eq!(fired.name, "daily");
        let rearmed = sched.proximate(fired_at).unwrap();
        assert_eq!(rearmed.name, "daily");
        assert!(rearmed.next_fire > fired_at.timestamp());
    }

    #[test]
    fn clear_overdue_drops_past_once_alarms_regardless_of_enabled() {
        let (sched, _dir) = scheduler();
        let now = chrono_tz::UTC.with_ymd_and_hms(2024, 1, 1, 7, 0, 0).unwrap();
        sched.set_relative("stale", now, 60, Repeat::Once, 0).unwrap();
        let later = now + chrono::Duration::seconds(120);
        assert_eq!(sched.clear_overdue(later), 1);
        assert!(sched.proximate(later).is_none());
    }

    #[test]
    fn catch_up_advances_recurring_but_leaves_once_for_clear_overdue() {
        let (sched, _dir) = scheduler();
        let armed_at = chrono_tz::UTC.with_ymd_and_hms(2024, 1, 1, 6, 0, 0).unwrap();
        sched.set_daily("daily", armed_at, 6, 0).unwrap();
        sched.set_relative("missed", armed_at, 60, Repeat::Once, 0).unwrap();

        let reboot_at = armed_at + chrono::Duration::days(3) + chrono::Duration::hours(1);
        sched.catch_up(reboot_at);

        // "missed" is untouched by catch_up and so stays in the past — it no
        // longer counts as proximate, only "daily" (now advanced past reboot) does.
        let proximate = sched.proximate(reboot_at).unwrap();
        assert_eq!(proximate.name, "daily");
        assert!(proximate.next_fire > reboot_at.timestamp());
        assert_eq!(sched.clear_overdue(reboot_at), 1);
    }
}
