//! Overlap detection on half-open UTC intervals.
//!
//! Intervals are `[start, end)`. Adjacent intervals (one ends exactly when the
//! other starts) are NOT conflicts, so back-to-back bookings with zero buffer
//! are legal.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{AppointmentType, Booking};

/// A half-open time span in absolute UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        overlaps(self, other)
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

/// `a.start < b.end && b.start < a.end`.
pub fn overlaps(a: &Interval, b: &Interval) -> bool {
    a.start < b.end && b.start < a.end
}

/// `[start - before, start + duration + after)`.
pub fn effective_interval(
    start: DateTime<Utc>,
    duration_minutes: u32,
    buffer_before_minutes: u32,
    buffer_after_minutes: u32,
) -> Interval {
    Interval {
        start: start - Duration::minutes(i64::from(buffer_before_minutes)),
        end: start
            + Duration::minutes(i64::from(duration_minutes) + i64::from(buffer_after_minutes)),
    }
}

/// Effective interval of a booking under its own appointment type.
///
/// Internal bookings, and bookings whose type is gone, get zero buffers.
pub fn booking_interval(booking: &Booking, appointment_type: Option<&AppointmentType>) -> Interval {
    let (before, after) = appointment_type
        .map(|t| (t.buffer_before_minutes, t.buffer_after_minutes))
        .unwrap_or((0, 0));
    effective_interval(booking.start, booking.duration_minutes, before, after)
}

/// Effective intervals of the confirmed bookings only.
///
/// `types` maps appointment type ids to their definitions.
pub fn confirmed_effective_intervals(
    bookings: &[Booking],
    types: &HashMap<String, AppointmentType>,
) -> Vec<Interval> {
    bookings
        .iter()
        .filter(|b| b.is_confirmed())
        .map(|b| {
            let t = b.appointment_type_id.as_ref().and_then(|id| types.get(id));
            booking_interval(b, t)
        })
        .collect()
}

/// A detected overlap between two intervals.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlap {
    pub a: Interval,
    pub b: Interval,
    pub overlap_minutes: i64,
}

/// Find all pairwise overlaps between two interval lists.
///
/// The overlap duration is `min(a.end, b.end) - max(a.start, b.start)`.
pub fn find_overlaps(intervals_a: &[Interval], intervals_b: &[Interval]) -> Vec<Overlap> {
    let mut found = Vec::new();

    for a in intervals_a {
        for b in intervals_b {
            if overlaps(a, b) {
                let overlap_start = a.start.max(b.start);
                let overlap_end = a.end.min(b.end);
                found.push(Overlap {
                    a: *a,
                    b: *b,
                    overlap_minutes: (overlap_end - overlap_start).num_minutes(),
                });
            }
        }
    }

    found
}
