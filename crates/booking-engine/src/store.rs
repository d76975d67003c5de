//! The TimeRule Store seam and an in-memory implementation.
//!
//! The engine only talks to storage through [`TimeRuleStore`]. Retry and
//! backoff for a remote store belong behind this trait, not in the engine.

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::model::{
    AppointmentType, BlockedRange, Booking, BookingStatus, DateException, Provider, WeeklyRule,
};
use crate::tz;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Read/write accessors the engine consumes.
#[async_trait]
pub trait TimeRuleStore: Send + Sync + 'static {
    async fn provider(&self, provider_id: &str) -> StoreResult<Provider>;

    async fn weekly_rules(&self, provider_id: &str) -> StoreResult<Vec<WeeklyRule>>;

    async fn exceptions(&self, provider_id: &str) -> StoreResult<Vec<DateException>>;

    async fn blocked_ranges(&self, provider_id: &str) -> StoreResult<Vec<BlockedRange>>;

    async fn appointment_type(&self, appointment_type_id: &str) -> StoreResult<AppointmentType>;

    /// Confirmed bookings whose start falls on `local_date` in the provider's
    /// timezone.
    async fn confirmed_bookings_on_date(
        &self,
        provider_id: &str,
        local_date: NaiveDate,
    ) -> StoreResult<Vec<Booking>>;

    async fn booking(&self, booking_id: &str) -> StoreResult<Booking>;

    async fn booking_by_token(&self, access_token: &str) -> StoreResult<Booking>;

    /// Must fail with [`StoreError::Duplicate`] when a confirmed booking for the
    /// same provider already starts at the same instant.
    async fn insert_booking(&self, booking: Booking) -> StoreResult<Booking>;

    async fn update_booking_time(
        &self,
        booking_id: &str,
        new_start: DateTime<Utc>,
    ) -> StoreResult<Booking>;

    async fn update_booking_status(
        &self,
        booking_id: &str,
        status: BookingStatus,
    ) -> StoreResult<Booking>;
}

/// Serializable contents of a store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSnapshot {
    pub providers: Vec<Provider>,
    pub appointment_types: Vec<AppointmentType>,
    pub weekly_rules: Vec<WeeklyRule>,
    pub exceptions: Vec<DateException>,
    pub blocked_ranges: Vec<BlockedRange>,
    pub bookings: Vec<Booking>,
}

/// A [`TimeRuleStore`] held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    data: RwLock<StoreSnapshot>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            data: RwLock::new(snapshot),
        }
    }

    /// A copy of the current contents.
    pub fn snapshot(&self) -> StoreResult<StoreSnapshot> {
        self.read(|data| data.clone())
    }

    pub fn add_provider(&self, provider: Provider) -> StoreResult<()> {
        self.write(|data| data.providers.push(provider))
    }

    pub fn add_appointment_type(&self, appointment_type: AppointmentType) -> StoreResult<()> {
        self.write(|data| data.appointment_types.push(appointment_type))
    }

    pub fn add_weekly_rule(&self, rule: WeeklyRule) -> StoreResult<()> {
        self.write(|data| data.weekly_rules.push(rule))
    }

    pub fn add_exception(&self, exception: DateException) -> StoreResult<()> {
        self.write(|data| data.exceptions.push(exception))
    }

    pub fn add_blocked_range(&self, range: BlockedRange) -> StoreResult<()> {
        self.write(|data| data.blocked_ranges.push(range))
    }

    fn read<T>(&self, f: impl FnOnce(&StoreSnapshot) -> T) -> StoreResult<T> {
        let guard = self
            .data
            .read()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))?;
        Ok(f(&guard))
    }

    fn write<T>(&self, f: impl FnOnce(&mut StoreSnapshot) -> T) -> StoreResult<T> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))?;
        Ok(f(&mut guard))
    }
}

fn duplicate_start(
    data: &StoreSnapshot,
    booking_id: &str,
    provider_id: &str,
    start: DateTime<Utc>,
) -> bool {
    data.bookings.iter().any(|b| {
        b.id != booking_id && b.provider_id == provider_id && b.start == start && b.is_confirmed()
    })
}

fn duplicate_error(provider_id: &str, start: DateTime<Utc>) -> StoreError {
    StoreError::Duplicate {
        provider_id: provider_id.to_string(),
        start: start.to_rfc3339(),
    }
}

#[async_trait]
impl TimeRuleStore for InMemoryStore {
    async fn provider(&self, provider_id: &str) -> StoreResult<Provider> {
        self.read(|data| data.providers.iter().find(|p| p.id == provider_id).cloned())?
            .ok_or_else(|| StoreError::NotFound(format!("provider '{}'", provider_id)))
    }

    async fn weekly_rules(&self, provider_id: &str) -> StoreResult<Vec<WeeklyRule>> {
        self.read(|data| {
            data.weekly_rules
                .iter()
                .filter(|r| r.provider_id == provider_id)
                .cloned()
                .collect()
        })
    }

    async fn exceptions(&self, provider_id: &str) -> StoreResult<Vec<DateException>> {
        self.read(|data| {
            data.exceptions
                .iter()
                .filter(|e| e.provider_id == provider_id)
                .cloned()
                .collect()
        })
    }

    async fn blocked_ranges(&self, provider_id: &str) -> StoreResult<Vec<BlockedRange>> {
        self.read(|data| {
            data.blocked_ranges
                .iter()
                .filter(|r| r.provider_id == provider_id)
                .cloned()
                .collect()
        })
    }

    async fn appointment_type(&self, appointment_type_id: &str) -> StoreResult<AppointmentType> {
        self.read(|data| {
            data.appointment_types
                .iter()
                .find(|t| t.id == appointment_type_id)
                .cloned()
        })?
        .ok_or_else(|| StoreError::NotFound(format!("appointment type '{}'", appointment_type_id)))
    }

    async fn confirmed_bookings_on_date(
        &self,
        provider_id: &str,
        local_date: NaiveDate,
    ) -> StoreResult<Vec<Booking>> {
        let provider = self.provider(provider_id).await?;
        let timezone = tz::parse_timezone(&provider.timezone)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        self.read(|data| {
            data.bookings
                .iter()
                .filter(|b| {
                    b.provider_id == provider_id
                        && b.is_confirmed()
                        && tz::local_date(&timezone, b.start) == local_date
                })
                .cloned()
                .collect()
        })
    }

    async fn booking(&self, booking_id: &str) -> StoreResult<Booking> {
        self.read(|data| data.bookings.iter().find(|b| b.id == booking_id).cloned())?
            .ok_or_else(|| StoreError::NotFound(format!("booking '{}'", booking_id)))
    }

    async fn booking_by_token(&self, access_token: &str) -> StoreResult<Booking> {
        self.read(|data| {
            data.bookings
                .iter()
                .find(|b| b.access_token == access_token)
                .cloned()
        })?
        .ok_or_else(|| StoreError::NotFound("booking for access token".to_string()))
    }

    async fn insert_booking(&self, booking: Booking) -> StoreResult<Booking> {
        self.write(|data| {
            if booking.is_confirmed()
                && duplicate_start(data, &booking.id, &booking.provider_id, booking.start)
            {
                return Err(duplicate_error(&booking.provider_id, booking.start));
            }
            data.bookings.push(booking.clone());
            Ok(booking)
        })?
    }

    async fn update_booking_time(
        &self,
        booking_id: &str,
        new_start: DateTime<Utc>,
    ) -> StoreResult<Booking> {
        self.write(|data| {
            let provider_id = data
                .bookings
                .iter()
                .find(|b| b.id == booking_id)
                .map(|b| b.provider_id.clone())
                .ok_or_else(|| StoreError::NotFound(format!("booking '{}'", booking_id)))?;
            if duplicate_start(data, booking_id, &provider_id, new_start) {
                return Err(duplicate_error(&provider_id, new_start));
            }
            let booking = data
                .bookings
                .iter_mut()
                .find(|b| b.id == booking_id)
                .ok_or_else(|| StoreError::NotFound(format!("booking '{}'", booking_id)))?;
            booking.start = new_start;
            Ok(booking.clone())
        })?
    }

    async fn update_booking_status(
        &self,
        booking_id: &str,
        status: BookingStatus,
    ) -> StoreResult<Booking> {
        self.write(|data| {
            let booking = data
                .bookings
                .iter_mut()
                .find(|b| b.id == booking_id)
                .ok_or_else(|| StoreError::NotFound(format!("booking '{}'", booking_id)))?;
            booking.status = status;
            Ok(booking.clone())
        })?
    }
}
