//! Error types for booking-engine operations.

use chrono::NaiveDate;
use thiserror::Error;

/// Which invariant a rejected booking would have violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    /// The local date is closed by an `unavailable` exception or a blocked range.
    BlockedDate,
    /// Another confirmed booking's effective interval overlaps the candidate.
    SlotTaken,
    /// The start does not fall inside any of the day's working windows.
    OutsideHours,
}

impl std::fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            ConflictReason::BlockedDate => "blocked date",
            ConflictReason::SlotTaken => "slot no longer available",
            ConflictReason::OutsideHours => "outside available hours",
        };
        f.write_str(msg)
    }
}

/// Failures reported by a [`TimeRuleStore`](crate::store::TimeRuleStore).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate booking for provider {provider_id} at {start}")]
    Duplicate { provider_id: String, start: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Failures reported by a [`BookingNotifier`](crate::notify::BookingNotifier).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NotifyError {
    #[error("notification channel unavailable: {0}")]
    Unavailable(String),

    #[error("notification rejected: {0}")]
    Rejected(String),
}

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(ConflictReason),

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Timed out waiting for the booking lock of provider {provider_id} on {date}")]
    Busy { provider_id: String, date: NaiveDate },
}

impl BookingError {
    /// True for the expected, user-facing "pick another slot" outcome.
    pub fn is_conflict(&self) -> bool {
        matches!(self, BookingError::Conflict(_))
    }
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => BookingError::NotFound(what),
            StoreError::Duplicate { .. } => BookingError::Conflict(ConflictReason::SlotTaken),
            other => BookingError::Store(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, BookingError>;
