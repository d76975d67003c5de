//! Records held by the TimeRule Store.
//!
//! Everything here is plain data with serde derives so a store snapshot can be
//! round-tripped through JSON. Instants are UTC (`DateTime<Utc>`), calendar days
//! are `NaiveDate`s interpreted in the provider's timezone, and weekly rule
//! bounds are provider-local wall-clock times serialized as `HH:MM`.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{BookingError, Result};

/// Shortest bookable appointment, in minutes.
pub const MIN_DURATION_MINUTES: u32 = 5;
/// Longest bookable appointment, in minutes.
pub const MAX_DURATION_MINUTES: u32 = 480;
/// Upper bound on buffer before + duration + buffer after.
///
/// Conflict checks only load bookings starting within one local day of the
/// candidate, so no effective interval may be longer than the shortest
/// (DST) day.
pub const MAX_EFFECTIVE_SPAN_MINUTES: u32 = 720;

/// The business whose calendar is scheduled against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    /// IANA timezone name, e.g. `"America/New_York"`.
    pub timezone: String,
}

/// A bookable service with its own duration and buffers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentType {
    pub id: String,
    pub provider_id: String,
    pub duration_minutes: u32,
    #[serde(default)]
    pub buffer_before_minutes: u32,
    #[serde(default)]
    pub buffer_after_minutes: u32,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

impl AppointmentType {
    /// Reject durations outside the bookable range and oversized buffers.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&self.duration_minutes) {
            return Err(BookingError::Validation(format!(
                "appointment type '{}' has duration {} min, expected {}-{}",
                self.id, self.duration_minutes, MIN_DURATION_MINUTES, MAX_DURATION_MINUTES
            )));
        }
        let span = u64::from(self.buffer_before_minutes)
            + u64::from(self.duration_minutes)
            + u64::from(self.buffer_after_minutes);
        if span > u64::from(MAX_EFFECTIVE_SPAN_MINUTES) {
            return Err(BookingError::Validation(format!(
                "appointment type '{}' spans {} min with buffers, at most {} allowed",
                self.id, span, MAX_EFFECTIVE_SPAN_MINUTES
            )));
        }
        Ok(())
    }
}

/// A recurring block of working hours on one weekday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyRule {
    pub provider_id: String,
    /// 0 = Sunday ... 6 = Saturday.
    pub weekday: u8,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    #[serde(default = "default_true")]
    pub is_available: bool,
}

/// How a [`DateException`] overrides the weekly pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionKind {
    Unavailable,
    CustomHours,
    Available,
}

/// A date-specific override of the weekly availability pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateException {
    pub provider_id: String,
    /// Calendar day in the provider's timezone.
    pub date: NaiveDate,
    pub kind: ExceptionKind,
    /// Limits the exception to a single service when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appointment_type_id: Option<String>,
}

/// A vacation or hold, always subtracted from availability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedRange {
    pub provider_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Covers whole provider-local days from `start`'s date through `end`'s date.
    #[serde(default)]
    pub is_all_day: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

/// Who the booking is for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    pub email: String,
}

impl Customer {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(BookingError::Validation("customer name is empty".to_string()));
        }
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(BookingError::Validation(format!(
                "invalid customer email '{}'",
                self.email
            )));
        }
        Ok(())
    }
}

/// A committed appointment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub provider_id: String,
    /// `None` for internal bookings made by the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appointment_type_id: Option<String>,
    pub customer_name: String,
    pub customer_email: String,
    pub start: DateTime<Utc>,
    pub duration_minutes: u32,
    pub status: BookingStatus,
    pub access_token: String,
}

impl Booking {
    /// A fresh confirmed booking with a random id and access token.
    pub fn confirmed(
        provider_id: &str,
        appointment_type_id: Option<&str>,
        customer: &Customer,
        start: DateTime<Utc>,
        duration_minutes: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            provider_id: provider_id.to_string(),
            appointment_type_id: appointment_type_id.map(str::to_string),
            customer_name: customer.name.trim().to_string(),
            customer_email: customer.email.trim().to_string(),
            start,
            duration_minutes,
            status: BookingStatus::Confirmed,
            access_token: Uuid::new_v4().simple().to_string(),
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == BookingStatus::Confirmed
    }
}

/// `HH:MM` serde for wall-clock times. Seconds are accepted on input.
pub(crate) mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    fn parse(raw: &str) -> Result<NaiveTime, String> {
        NaiveTime::parse_from_str(raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
            .map_err(|e| format!("invalid wall-clock time '{}': {}", raw, e))
    }
}
