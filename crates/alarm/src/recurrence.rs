//! Civil-calendar recurrence math (spec §4.2, §9 Open Question #2).
//!
//! All arithmetic is performed on local civil time (`NaiveDateTime` in a
//! given `Tz`) and only converted to an absolute instant at the very end, so
//! DST transitions are respected uniformly rather than via raw `+86400`
//! second arithmetic.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Weekday};
use chrono_tz::Tz;

/// Maps a [`Weekday`] to the spec's bit index (bit 0 = Sunday … bit 6 = Saturday).
fn weekday_bit(day: Weekday) -> u8 {
    match day {
        Weekday::Sun => 0,
        Weekday::Mon => 1,
        Weekday::Tue => 2,
        Weekday::Wed => 3,
        Weekday::Thu => 4,
        Weekday::Fri => 5,
        Weekday::Sat => 6,
    }
}

fn mask_has(days_mask: u8, day: Weekday) -> bool {
    days_mask & (1 << weekday_bit(day)) != 0
}

/// Resolves a civil date + hour/minute in `tz` to an absolute instant,
/// picking the earlier of an ambiguous (fall-back) pair. When the wall-clock
/// `hh:mm` is skipped entirely by a spring-forward on `date`, the whole day
/// is skipped — resolution retries the *same* `hh:mm` on the following
/// calendar date, rather than rolling forward within the gap day, so a
/// `Daily` alarm never fires at some other wall-clock time "of the same
/// day" (spec §8).
fn resolve_local(tz: Tz, date: NaiveDate, hour: u32, minute: u32) -> DateTime<Tz> {
    let mut probe_date = date;
    loop {
        let naive =
            probe_date.and_time(NaiveTime::from_hms_opt(hour, minute, 0).expect("valid hh:mm"));
        match tz.from_local_datetime(&naive) {
            chrono::LocalResult::Single(dt) => break dt,
            chrono::LocalResult::Ambiguous(earlier, _later) => break earlier,
            chrono::LocalResult::None => {
                // hh:mm falls inside the spring-forward gap on this date;
                // the next valid occurrence of this same wall-clock time is
                // on the following calendar day.
                probe_date += Duration::days(1);
            }
        }
    }
}

/// `Daily`/hour-minute scheduling: today at `hh:mm` if still strictly in the
/// future, else tomorrow at `hh:mm`.
pub fn next_instant_for_time(now: DateTime<Tz>, hour: u32, minute: u32) -> DateTime<Tz> {
    let today = resolve_local(now.timezone(), now.date_naive(), hour, minute);
    if today > now {
        today
    } else {
        resolve_local(now.timezone(), now.date_naive() + Duration::days(1), hour, minute)
    }
}

/// Smallest `d ∈ 0..7` such that the weekday of `now + d days` is in
/// `days_mask`, rejecting `d = 0` unless the resulting instant is strictly
/// in the future (spec §4.2).
pub fn next_instant_for_weekday_mask(
    now: DateTime<Tz>,
    hour: u32,
    minute: u32,
    days_mask: u8,
) -> Option<DateTime<Tz>> {
    if days_mask == 0 {
        return None;
    }
    for d in 0..7 {
        let date = now.date_naive() + Duration::days(d);
        if !mask_has(days_mask, date.weekday()) {
            continue;
        }
        let candidate = resolve_local(now.timezone(), date, hour, minute);
        if d == 0 && candidate <= now {
            continue;
        }
        return Some(candidate);
    }
    None
}

/// Recurrence after a `Daily` alarm fires: reinterpret the fire instant as
/// local civil time, add one calendar day, and re-resolve — this is what
/// keeps a 02:30 daily alarm at 02:30 local across a DST transition instead
/// of drifting to 01:30 or 03:30.
pub fn advance_daily(prev_fire_local: DateTime<Tz>) -> DateTime<Tz> {
    let next_date = prev_fire_local.date_naive() + Duration::days(1);
    resolve_local(
        prev_fire_local.timezone(),
        next_date,
        prev_fire_local.hour(),
        prev_fire_local.minute(),
    )
}

/// Recurrence after a `Weekly`/`Workdays`/`Weekends` alarm fires: find the
/// next matching weekday strictly after the previous fire.
pub fn advance_weekday_mask(prev_fire_local: DateTime<Tz>, days_mask: u8) -> Option<DateTime<Tz>> {
    next_instant_for_weekday_mask(
        prev_fire_local,
        prev_fire_local.hour(),
        prev_fire_local.minute(),
        days_mask,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::New_York;

    #[test]
    fn daily_springs_forward_keeps_local_wall_clock() {
        // 2024-03-09 02:30 EST (before the spring-forward night of Mar 10).
        let prev = New_York.with_ymd_and_hms(2024, 3, 9, 2, 30, 0).unwrap();
        let next = advance_daily(prev);
        // 2024-03-10 02:30 local does not exist (clocks jump 2:00 -> 3:00).
        // Per spec §8, the alarm must never fire at 01:30 or 03:30 "of the
        // same day" — the whole gap day is skipped and the next occurrence
        // is 2024-03-11 02:30 EDT, the same wall-clock time one day later.
        assert_eq!(next.date_naive(), NaiveDate::from_ymd_opt(2024, 3, 11).unwrap());
        assert_eq!(next.hour(), 2);
        assert_eq!(next.minute(), 30);
    }

    #[test]
    fn weekday_mask_skips_to_next_matching_day() {
        // Monday 2024-01-01 08:00 UTC, workdays mask (Mon-Fri).
        let now = chrono_tz::UTC.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let workdays = 0b011_1110u8;
        let next = next_instant_for_weekday_mask(now, 7, 0, workdays).unwrap();
        // d=0 would be Monday 07:00 but that's in the past relative to 08:00 now,
        // so the next candidate is Tuesday 07:00.
        assert_eq!(next.weekday(), Weekday::Tue);
    }

    #[test]
    fn weekday_mask_same_day_when_still_future() {
        let now = chrono_tz::UTC.with_ymd_and_hms(2024, 1, 1, 6, 0, 0).unwrap();
        let workdays = 0b011_1110u8;
        let next = next_instant_for_weekday_mask(now, 7, 0, workdays).unwrap();
        assert_eq!(next.weekday(), Weekday::Mon);
        assert_eq!(next.date_naive(), now.date_naive());
    }

    #[test]
    fn next_instant_for_time_rolls_to_tomorrow_when_past() {
        let now = chrono_tz::UTC.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let next = next_instant_for_time(now, 7, 0);
        assert_eq!(next.date_naive(), NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    }
}
