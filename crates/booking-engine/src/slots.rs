//! Bookable slot generation for one provider, one appointment type, one day.
//!
//! The generator is a pure function of its [`SlotQuery`]: calling it twice on
//! the same inputs yields the same ordered output. Walking happens on the
//! provider's wall clock; only the final candidates are converted to UTC.

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use chrono_tz::Tz;
use tracing::{debug, warn};

use crate::conflict::{effective_interval, Interval};
use crate::exception::{self, DayPolicy, TimeRange};
use crate::model::{AppointmentType, BlockedRange, DateException, WeeklyRule};
use crate::tz;

/// Everything the generator needs, already loaded from the store.
#[derive(Debug, Clone, Copy)]
pub struct SlotQuery<'a> {
    /// Provider timezone; all wall-clock interpretation uses it.
    pub timezone: &'a Tz,
    pub appointment_type: &'a AppointmentType,
    /// Provider-local calendar day.
    pub date: NaiveDate,
    pub weekly_rules: &'a [WeeklyRule],
    pub exceptions: &'a [DateException],
    pub blocked_ranges: &'a [BlockedRange],
    /// Effective intervals of the provider's confirmed bookings.
    pub existing: &'a [Interval],
}

/// Ordered UTC start instants that can still be booked on `query.date`.
pub fn generate_slots(query: &SlotQuery<'_>) -> Vec<DateTime<Utc>> {
    let appointment_type = query.appointment_type;
    if appointment_type.duration_minutes == 0 {
        return Vec::new();
    }

    let policy = exception::resolve(query.exceptions, query.date, Some(&appointment_type.id));
    let windows = day_windows(&policy, query.weekly_rules, query.date);
    if windows.is_empty() {
        debug!(date = %query.date, ?policy, "no working windows");
        return Vec::new();
    }

    let duration = i64::from(appointment_type.duration_minutes);
    let step = duration + i64::from(appointment_type.buffer_after_minutes);
    let blocked = blocked_intervals(query.timezone, query.blocked_ranges);

    let mut slots = Vec::new();
    for window in &windows {
        let end = minutes_of(window.end);
        let mut cursor = minutes_of(window.start);

        while cursor + duration <= end {
            if let Some(start) = wall_minute_to_utc(query.timezone, query.date, cursor) {
                let candidate = effective_interval(
                    start,
                    appointment_type.duration_minutes,
                    appointment_type.buffer_before_minutes,
                    appointment_type.buffer_after_minutes,
                );
                let clashes = query.existing.iter().any(|i| candidate.overlaps(i))
                    || blocked.iter().any(|i| candidate.overlaps(i));
                if !clashes {
                    slots.push(start);
                }
            }
            cursor += step;
        }
    }

    // Overlapping rules emit the same start more than once.
    slots.sort();
    slots.dedup();
    debug!(
        date = %query.date,
        appointment_type = %appointment_type.id,
        count = slots.len(),
        "generated slots"
    );
    slots
}

/// Provider-local working windows for `date` under `policy`, ordered by start.
///
/// Rules with `start >= end` contribute nothing. Spanning midnight is not
/// supported.
pub fn day_windows(
    policy: &DayPolicy,
    weekly_rules: &[WeeklyRule],
    date: NaiveDate,
) -> Vec<TimeRange> {
    let mut windows: Vec<TimeRange> = match policy {
        DayPolicy::Blocked => return Vec::new(),
        DayPolicy::CustomHours(ranges) => ranges.clone(),
        DayPolicy::UseWeeklyRules => {
            let weekday = tz::weekday_index(date);
            weekly_rules
                .iter()
                .filter(|r| r.weekday == weekday && r.is_available)
                .map(|r| TimeRange {
                    start: r.start_time,
                    end: r.end_time,
                })
                .collect()
        }
    };

    windows.retain(|w| {
        if w.start > w.end {
            warn!(start = %w.start, end = %w.end, "ignoring window that ends before it starts");
        }
        w.start < w.end
    });
    // Stable: ties keep their original order.
    windows.sort_by_key(|w| w.start);
    windows
}

/// Whether a booking of `duration_minutes` can start at `local` within one of
/// the windows.
pub fn fits_window(windows: &[TimeRange], local: NaiveTime, duration_minutes: u32) -> bool {
    // Exact to the nanosecond: a start at 16:30:59 does not fit a 30 min slot
    // before 17:00.
    let start = nanos_of(local);
    let end = start + i64::from(duration_minutes) * NANOS_PER_MINUTE;
    windows
        .iter()
        .any(|w| nanos_of(w.start) <= start && end <= nanos_of(w.end))
}

/// Blocked ranges as absolute intervals, all-day ranges widened to whole
/// provider-local days.
pub fn blocked_intervals(timezone: &Tz, ranges: &[BlockedRange]) -> Vec<Interval> {
    ranges
        .iter()
        .map(|r| {
            let raw = Interval::new(r.start, r.end);
            if !r.is_all_day {
                return raw;
            }
            let dates = tz::local_dates_touched(timezone, &raw);
            match (dates.first(), dates.last()) {
                (Some(first), Some(last)) => Interval::new(
                    tz::start_of_day(timezone, *first),
                    tz::day_bounds(timezone, *last).end,
                ),
                _ => raw,
            }
        })
        .collect()
}

const NANOS_PER_MINUTE: i64 = 60 * 1_000_000_000;

fn minutes_of(time: NaiveTime) -> i64 {
    i64::from(time.num_seconds_from_midnight() / 60)
}

fn nanos_of(time: NaiveTime) -> i64 {
    i64::from(time.num_seconds_from_midnight()) * 1_000_000_000 + i64::from(time.nanosecond())
}

fn wall_minute_to_utc(timezone: &Tz, date: NaiveDate, minute: i64) -> Option<DateTime<Utc>> {
    let seconds = u32::try_from(minute * 60).ok()?;
    let time = NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0)?;
    let instant = tz::local_to_utc(timezone, date, time);
    if instant.is_none() {
        debug!(%date, %time, "skipping wall-clock time inside a DST gap");
    }
    instant
}
