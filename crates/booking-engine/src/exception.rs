//! Date-level overrides applied before slot generation.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::model::{DateException, ExceptionKind};

/// A provider-local wall-clock window on a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// What a day's exceptions say about its availability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayPolicy {
    /// No slots at all on this day.
    Blocked,
    /// Fall through to the weekly rules for the weekday.
    UseWeeklyRules,
    /// Replace the weekly rules with these windows.
    ///
    /// [`resolve`] does not emit this yet: `custom_hours` exceptions carry no
    /// hours payload. The slot generator already honours it.
    CustomHours(Vec<TimeRange>),
}

/// Resolve the policy for `date` (provider-local).
///
/// An `unavailable` exception blocks the day when it is unscoped or scoped to
/// `appointment_type_id`. With no appointment type in play only unscoped
/// exceptions apply. `custom_hours` and `available` fall back to weekly rules.
pub fn resolve(
    exceptions: &[DateException],
    date: NaiveDate,
    appointment_type_id: Option<&str>,
) -> DayPolicy {
    let blocked = exceptions
        .iter()
        .filter(|e| e.date == date && e.kind == ExceptionKind::Unavailable)
        .any(|e| match e.appointment_type_id.as_deref() {
            None => true,
            Some(scoped) => appointment_type_id == Some(scoped),
        });

    if blocked {
        DayPolicy::Blocked
    } else {
        DayPolicy::UseWeeklyRules
    }
}
