//! Calendar-week arithmetic for period evaluation.
//!
//! A period is one calendar week, half-open `[Monday 00:00 UTC, next Monday
//! 00:00 UTC)`. Monday is weekday 0.

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};

/// The most recent Monday at 00:00:00 UTC at or before `t`.
pub fn start_of_week(t: DateTime<Utc>) -> DateTime<Utc> {
    let days_from_monday = t.weekday().num_days_from_monday() as i64;
    let monday = t.date_naive() - Duration::days(days_from_monday);
    monday.and_time(NaiveTime::MIN).and_utc()
}

/// The week window enclosing `anchor`: `(start, start + 7 days)`.
///
/// `start <= anchor < end`; an anchor that is itself a Monday midnight is its
/// own period start.
pub fn week_period(anchor: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = start_of_week(anchor);
    (start, start + Duration::days(7))
}
