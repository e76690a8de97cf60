//! Time sources and calendar arithmetic for care schedules.
//!
//! All timestamps are stored as UTC.  Anything that depends on "which day is
//! it" (due dates, start of today, reminder fire times) is computed in the
//! garden's local [`Tz`], so adding an interval keeps the local wall-clock
//! time stable across daylight-saving transitions.

use std::sync::Mutex;

use chrono::{
    DateTime, Days, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};
use chrono_tz::Tz;
use serde::Serialize;

use crate::schema::IntervalDays;

/// Source of "now".  Injected so schedules can be evaluated deterministically.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.  Used by tests and replays.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Resolve an IANA timezone name.  An empty name means the system timezone;
/// anything unrecognised falls back to UTC.
pub fn resolve_timezone(name: &str) -> Tz {
    let name = name.trim();
    if name.is_empty() {
        return match iana_time_zone::get_timezone() {
            Ok(system) => system.parse().unwrap_or_else(|_| {
                tracing::warn!(tz = %system, "unrecognised system timezone — falling back to UTC");
                chrono_tz::UTC
            }),
            Err(err) => {
                tracing::warn!(error = %err, "could not detect system timezone — falling back to UTC");
                chrono_tz::UTC
            }
        };
    }

    name.parse().unwrap_or_else(|_| {
        tracing::warn!(tz = %name, "unrecognised timezone — falling back to UTC");
        chrono_tz::UTC
    })
}

/// Map a local wall-clock time to an instant.  Ambiguous times (clocks going
/// back) take the earlier instant; times inside a gap (clocks going forward)
/// move forward by the gap's hour.
pub fn resolve_local(tz: Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(at) => at,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => tz
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .unwrap_or_else(|| tz.from_utc_datetime(&naive)),
    }
}

/// How a due date relates to today, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DueStatus {
    /// Due on an earlier calendar day; `days` counts the calendar days late.
    Overdue { days: u32 },
    Today,
    Tomorrow,
    Upcoming { date: NaiveDate },
}

impl DueStatus {
    pub fn needs_attention(self) -> bool {
        matches!(self, Self::Overdue { .. } | Self::Today)
    }
}

impl std::fmt::Display for DueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Overdue { days } => write!(f, "{days}d overdue"),
            Self::Today => f.write_str("Today"),
            Self::Tomorrow => f.write_str("Tomorrow"),
            Self::Upcoming { date } => write!(f, "{}", date.format("%b %-d")),
        }
    }
}

/// Calendar arithmetic in the garden's local timezone.
#[derive(Debug, Clone, Copy)]
pub struct CareClock {
    tz: Tz,
}

impl CareClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn utc() -> Self {
        Self::new(chrono_tz::UTC)
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    /// Next time a recurring task is due.  A task never completed is due
    /// right now; otherwise it is due `interval` calendar days after the last
    /// completion, at the same local wall-clock time.
    pub fn next_due_date(
        &self,
        last_completed: Option<DateTime<Utc>>,
        interval: IntervalDays,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        match last_completed {
            None => now,
            Some(last) => self.add_days(last, interval.days()),
        }
    }

    pub fn add_days(&self, at: DateTime<Utc>, days: u32) -> DateTime<Utc> {
        let local = at.with_timezone(&self.tz).naive_local();
        match local.checked_add_days(Days::new(u64::from(days))) {
            Some(target) => resolve_local(self.tz, target).with_timezone(&Utc),
            None => at + Duration::days(i64::from(days)),
        }
    }

    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.tz).date_naive()
    }

    /// Local midnight of the day containing `now`.
    pub fn start_of_day(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let midnight = self.local_date(now).and_time(NaiveTime::MIN);
        resolve_local(self.tz, midnight).with_timezone(&Utc)
    }

    /// The instant at which `date` shows `time` on a local wall clock.
    pub fn at_local_time(&self, date: NaiveDate, time: NaiveTime) -> DateTime<Tz> {
        resolve_local(self.tz, date.and_time(time))
    }

    pub fn due_status(&self, due: DateTime<Utc>, now: DateTime<Utc>) -> DueStatus {
        let today = self.local_date(now);
        let due_day = self.local_date(due);
        if due_day == today {
            DueStatus::Today
        } else if due_day < today {
            let days = (today - due_day).num_days().max(1);
            DueStatus::Overdue {
                days: u32::try_from(days).unwrap_or(u32::MAX),
            }
        } else if today.succ_opt() == Some(due_day) {
            DueStatus::Tomorrow
        } else {
            DueStatus::Upcoming { date: due_day }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Timelike};

    use super::*;

    fn interval(days: u32) -> IntervalDays {
        IntervalDays::new(days).unwrap()
    }

    #[test]
    fn never_completed_task_is_due_now() {
        let clock = CareClock::utc();
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 15, 30, 0).unwrap();
        assert_eq!(clock.next_due_date(None, interval(7), now), now);
        assert_eq!(clock.next_due_date(None, interval(1), now), now);
    }

    #[test]
    fn adds_whole_days_for_every_interval() {
        let clock = CareClock::utc();
        let last = Utc.with_ymd_and_hms(2026, 1, 28, 10, 0, 0).unwrap();
        for days in [1, 2, 7, 14, 30, 365] {
            let due = clock.next_due_date(Some(last), interval(days), Utc::now());
            assert_eq!(due, last + Duration::days(i64::from(days)), "interval {days}");
        }
    }

    #[test]
    fn interval_across_spring_forward_keeps_local_time() {
        // Europe/Berlin switches to CEST on 2026-03-29.
        let tz: Tz = "Europe/Berlin".parse().unwrap();
        let clock = CareClock::new(tz);
        let last = tz
            .with_ymd_and_hms(2026, 3, 25, 9, 0, 0)
            .unwrap()
            .with_timezone(&Utc);

        let due = clock.next_due_date(Some(last), interval(7), Utc::now());
        let local = due.with_timezone(&tz);
        assert_eq!(local.date_naive(), NaiveDate::from_ymd_opt(2026, 4, 1).unwrap());
        assert_eq!(local.hour(), 9);
        // One hour less than seven fixed 24h periods.
        assert_eq!(due - last, Duration::days(7) - Duration::hours(1));
    }

    #[test]
    fn interval_across_fall_back_keeps_local_time() {
        // America/New_York leaves DST on 2026-11-01.
        let tz: Tz = "America/New_York".parse().unwrap();
        let clock = CareClock::new(tz);
        let last = tz
            .with_ymd_and_hms(2026, 10, 30, 18, 45, 0)
            .unwrap()
            .with_timezone(&Utc);

        let due = clock.next_due_date(Some(last), interval(3), Utc::now());
        let local = due.with_timezone(&tz);
        assert_eq!(local.date_naive(), NaiveDate::from_ymd_opt(2026, 11, 2).unwrap());
        assert_eq!((local.hour(), local.minute()), (18, 45));
        assert_eq!(due - last, Duration::days(3) + Duration::hours(1));
    }

    #[test]
    fn gap_times_move_forward() {
        let tz: Tz = "Europe/Berlin".parse().unwrap();
        let naive = NaiveDate::from_ymd_opt(2026, 3, 29)
            .unwrap()
            .and_hms_opt(2, 30, 0)
            .unwrap();
        let resolved = resolve_local(tz, naive);
        assert_eq!((resolved.hour(), resolved.minute()), (3, 30));
    }

    #[test]
    fn start_of_day_is_local_midnight() {
        let tz: Tz = "Asia/Tokyo".parse().unwrap();
        let clock = CareClock::new(tz);
        // 2026-05-10 01:00 in Tokyo is still 2026-05-09 in UTC.
        let now = tz.with_ymd_and_hms(2026, 5, 10, 1, 0, 0).unwrap().with_timezone(&Utc);
        let start = clock.start_of_day(now).with_timezone(&tz);
        assert_eq!(start.date_naive(), NaiveDate::from_ymd_opt(2026, 5, 10).unwrap());
        assert_eq!((start.hour(), start.minute()), (0, 0));
    }

    #[test]
    fn due_status_buckets() {
        let clock = CareClock::utc();
        let now = Utc.with_ymd_and_hms(2026, 7, 10, 12, 0, 0).unwrap();
        assert_eq!(clock.due_status(now - Duration::hours(3), now), DueStatus::Today);
        assert_eq!(clock.due_status(now + Duration::hours(6), now), DueStatus::Today);
        assert_eq!(clock.due_status(now + Duration::days(1), now), DueStatus::Tomorrow);
        assert_eq!(
            clock.due_status(now - Duration::days(2), now),
            DueStatus::Overdue { days: 2 }
        );
        assert_eq!(
            clock.due_status(now + Duration::days(5), now),
            DueStatus::Upcoming {
                date: NaiveDate::from_ymd_opt(2026, 7, 15).unwrap()
            }
        );
        assert_eq!(DueStatus::Overdue { days: 2 }.to_string(), "2d overdue");
        assert_eq!(
            DueStatus::Upcoming { date: NaiveDate::from_ymd_opt(2026, 7, 15).unwrap() }.to_string(),
            "Jul 15"
        );
    }

    #[test]
    fn unknown_timezone_falls_back_to_utc() {
        assert_eq!(resolve_timezone("Mars/Olympus_Mons"), chrono_tz::UTC);
        assert_eq!(resolve_timezone("Europe/Paris"), chrono_tz::Europe::Paris);
    }

    #[test]
    fn manual_clock_moves_only_when_told() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);
        clock.advance(Duration::days(2));
        assert_eq!(clock.now(), start + Duration::days(2));
        clock.set(start);
        assert_eq!(clock.now(), start);
    }
}
