//! Provider-local wall-clock ↔ UTC conversion with DST handling.
//!
//! Wall-clock times are resolved with a single policy:
//!
//! - **Ambiguous** (fall-back overlap, the wall clock repeats): the earlier UTC
//!   instant, i.e. the first occurrence.
//! - **Nonexistent** (spring-forward gap): no instant; callers skip the time.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::conflict::Interval;
use crate::error::{BookingError, Result};

/// Parse an IANA timezone name.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|_| BookingError::Validation(format!("invalid timezone '{}'", name)))
}

/// Interpret `date` + `time` on the provider's wall clock as an absolute instant.
///
/// Returns `None` when the wall-clock time does not exist on that date.
pub fn local_to_utc(tz: &Tz, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// The provider-local calendar date containing `instant`.
pub fn local_date(tz: &Tz, instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(tz).date_naive()
}

/// Weekday index with 0 = Sunday ... 6 = Saturday.
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// First instant of the provider-local day.
///
/// A handful of zones jump over local midnight; the day then starts at the
/// first wall-clock minute that exists.
pub fn start_of_day(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    for minute in 0..=180 {
        let candidate = midnight + Duration::minutes(minute);
        if let Some(dt) = tz.from_local_datetime(&candidate).earliest() {
            return dt.with_timezone(&Utc);
        }
    }
    // No real zone has a gap this long.
    midnight.and_utc()
}

/// `[start_of_day(date), start_of_day(date + 1))` for the provider's zone.
pub fn day_bounds(tz: &Tz, date: NaiveDate) -> Interval {
    let next = date.succ_opt().unwrap_or(date);
    Interval::new(start_of_day(tz, date), start_of_day(tz, next))
}

/// Every provider-local date the interval touches, ascending.
pub fn local_dates_touched(tz: &Tz, interval: &Interval) -> Vec<NaiveDate> {
    let first = local_date(tz, interval.start);
    // The end is exclusive; step back the smallest representable amount.
    let last_instant = if interval.end > interval.start {
        interval.end - Duration::nanoseconds(1)
    } else {
        interval.start
    };
    let last = local_date(tz, last_instant);

    let mut dates = vec![first];
    let mut cursor = first;
    while cursor < last {
        match cursor.succ_opt() {
            Some(next) => {
                dates.push(next);
                cursor = next;
            }
            None => break,
        }
    }
    dates
}

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| BookingError::Validation(format!("invalid date '{}': {}", s, e)))
}

/// Parse an RFC 3339 instant (e.g. `"2030-03-18T13:00:00Z"`) into UTC.
///
/// A bare datetime without an offset is rejected: which zone it belongs to is
/// exactly the ambiguity this crate refuses to guess.
pub fn parse_instant(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| BookingError::Validation(format!("invalid instant '{}': {}", s, e)))
}
