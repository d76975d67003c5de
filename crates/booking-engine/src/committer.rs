//! Re-validate, then persist.
//!
//! The committer re-checks a requested start against the *current* store state
//! and writes it only if it still fits. The check and the write run under the
//! [`DayLocks`] of every provider-local date the candidate touches, which
//! closes the check-then-act window between concurrent requests.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::conflict::{confirmed_effective_intervals, effective_interval, Interval};
use crate::error::{BookingError, ConflictReason, Result, StoreError};
use crate::exception::{self, DayPolicy};
use crate::locks::DayLocks;
use crate::model::{
    AppointmentType, Booking, BookingStatus, Customer, Provider, MAX_DURATION_MINUTES,
};
use crate::slots;
use crate::store::TimeRuleStore;
use crate::tz;

/// A start being checked, before it is written anywhere.
#[derive(Debug, Clone)]
struct Candidate {
    start: DateTime<Utc>,
    duration_minutes: u32,
    appointment_type: Option<AppointmentType>,
    /// The booking being moved, which must not conflict with itself.
    exclude_booking_id: Option<String>,
}

impl Candidate {
    fn interval(&self) -> Interval {
        let (before, after) = self
            .appointment_type
            .as_ref()
            .map(|t| (t.buffer_before_minutes, t.buffer_after_minutes))
            .unwrap_or((0, 0));
        effective_interval(self.start, self.duration_minutes, before, after)
    }
}

enum Write {
    Insert(Booking),
    Move { booking_id: String },
}

pub struct BookingCommitter<S> {
    store: Arc<S>,
    locks: DayLocks,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
}

impl<S: TimeRuleStore> BookingCommitter<S> {
    pub fn new(store: Arc<S>, config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            locks: DayLocks::new(),
            config,
            clock,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Book `appointment_type_id` at `requested_start` for `customer`.
    pub async fn commit(
        &self,
        provider_id: &str,
        appointment_type_id: &str,
        requested_start: DateTime<Utc>,
        customer: &Customer,
    ) -> Result<Booking> {
        customer.validate()?;
        let (provider, timezone) = load_provider(self.store.as_ref(), provider_id).await?;
        let appointment_type =
            load_bookable_type(self.store.as_ref(), provider_id, appointment_type_id).await?;
        self.check_not_past(requested_start)?;

        let booking = Booking::confirmed(
            &provider.id,
            Some(&appointment_type.id),
            customer,
            requested_start,
            appointment_type.duration_minutes,
        );
        let candidate = Candidate {
            start: requested_start,
            duration_minutes: appointment_type.duration_minutes,
            appointment_type: Some(appointment_type),
            exclude_booking_id: None,
        };

        let booking = self
            .decide_and_write(&provider, &timezone, candidate, Write::Insert(booking))
            .await?;
        info!(booking_id = %booking.id, provider_id, start = %booking.start, "booking confirmed");
        Ok(booking)
    }

    /// Book time without an appointment type, e.g. a provider-side hold.
    ///
    /// Uses `duration_minutes` or the configured internal default, zero
    /// buffers, and skips the working-hours check.
    pub async fn commit_internal(
        &self,
        provider_id: &str,
        requested_start: DateTime<Utc>,
        duration_minutes: Option<u32>,
        customer: &Customer,
    ) -> Result<Booking> {
        customer.validate()?;
        let (provider, timezone) = load_provider(self.store.as_ref(), provider_id).await?;
        let duration = duration_minutes.unwrap_or(self.config.internal_booking_minutes);
        if !(1..=MAX_DURATION_MINUTES).contains(&duration) {
            return Err(BookingError::Validation(format!(
                "internal booking duration {} min, expected 1-{}",
                duration, MAX_DURATION_MINUTES
            )));
        }
        self.check_not_past(requested_start)?;

        let booking = Booking::confirmed(&provider.id, None, customer, requested_start, duration);
        let candidate = Candidate {
            start: requested_start,
            duration_minutes: duration,
            appointment_type: None,
            exclude_booking_id: None,
        };

        let booking = self
            .decide_and_write(&provider, &timezone, candidate, Write::Insert(booking))
            .await?;
        info!(booking_id = %booking.id, provider_id, start = %booking.start, "internal booking confirmed");
        Ok(booking)
    }

    /// Move a confirmed booking to `new_start` under the same rules as creation.
    pub async fn reschedule(
        &self,
        provider_id: &str,
        booking_id: &str,
        new_start: DateTime<Utc>,
    ) -> Result<Booking> {
        let existing = load_owned_booking(self.store.as_ref(), provider_id, booking_id).await?;
        if !existing.is_confirmed() {
            return Err(BookingError::Validation(format!(
                "booking '{}' is cancelled and cannot be rescheduled",
                booking_id
            )));
        }
        let (provider, timezone) = load_provider(self.store.as_ref(), provider_id).await?;
        let appointment_type = match existing.appointment_type_id.as_deref() {
            Some(id) => optional(self.store.appointment_type(id).await)?,
            None => None,
        };
        if let Some(t) = &appointment_type {
            t.validate()?;
        }
        self.check_not_past(new_start)?;

        let candidate = Candidate {
            start: new_start,
            duration_minutes: existing.duration_minutes,
            appointment_type,
            exclude_booking_id: Some(existing.id.clone()),
        };
        let write = Write::Move {
            booking_id: existing.id.clone(),
        };

        let booking = self
            .decide_and_write(&provider, &timezone, candidate, write)
            .await?;
        info!(
            booking_id = %booking.id,
            provider_id,
            from = %existing.start,
            to = %booking.start,
            "booking rescheduled"
        );
        Ok(booking)
    }

    /// Cancel a booking. Cancelling twice returns the cancelled booking.
    pub async fn cancel(&self, provider_id: &str, booking_id: &str) -> Result<Booking> {
        let existing = load_owned_booking(self.store.as_ref(), provider_id, booking_id).await?;
        if !existing.is_confirmed() {
            return Ok(existing);
        }
        let booking = self
            .store
            .update_booking_status(booking_id, BookingStatus::Cancelled)
            .await?;
        info!(booking_id, provider_id, "booking cancelled");
        Ok(booking)
    }

    fn check_not_past(&self, start: DateTime<Utc>) -> Result<()> {
        if !self.config.allow_past_bookings && start < self.clock.now() {
            return Err(BookingError::Validation(format!(
                "requested start {} is in the past",
                start.to_rfc3339()
            )));
        }
        Ok(())
    }

    async fn decide_and_write(
        &self,
        provider: &Provider,
        timezone: &Tz,
        candidate: Candidate,
        write: Write,
    ) -> Result<Booking> {
        let interval = candidate.interval();
        let dates = tz::local_dates_touched(timezone, &interval);
        let _guard = self
            .locks
            .acquire(&provider.id, &dates, self.config.lock_timeout())
            .await?;

        self.check_candidate(provider, timezone, &candidate, &interval, &dates)
            .await?;

        let booking = match write {
            Write::Insert(booking) => self.store.insert_booking(booking).await?,
            Write::Move { booking_id } => {
                self.store
                    .update_booking_time(&booking_id, candidate.start)
                    .await?
            }
        };
        Ok(booking)
    }

    async fn check_candidate(
        &self,
        provider: &Provider,
        timezone: &Tz,
        candidate: &Candidate,
        interval: &Interval,
        dates: &[NaiveDate],
    ) -> Result<()> {
        let store = self.store.as_ref();
        let local_date = tz::local_date(timezone, candidate.start);
        let type_id = candidate.appointment_type.as_ref().map(|t| t.id.as_str());

        let exceptions = store.exceptions(&provider.id).await?;
        let policy = exception::resolve(&exceptions, local_date, type_id);
        if policy == DayPolicy::Blocked {
            return Err(BookingError::Conflict(ConflictReason::BlockedDate));
        }

        let blocked = store.blocked_ranges(&provider.id).await?;
        if slots::blocked_intervals(timezone, &blocked)
            .iter()
            .any(|b| b.overlaps(interval))
        {
            return Err(BookingError::Conflict(ConflictReason::BlockedDate));
        }

        let existing = existing_intervals(
            store,
            &provider.id,
            dates,
            candidate.exclude_booking_id.as_deref(),
        )
        .await?;
        if existing.iter().any(|e| e.overlaps(interval)) {
            debug!(provider_id = %provider.id, start = %candidate.start, "candidate overlaps a confirmed booking");
            return Err(BookingError::Conflict(ConflictReason::SlotTaken));
        }

        if candidate.appointment_type.is_some() {
            let rules = store.weekly_rules(&provider.id).await?;
            let windows = slots::day_windows(&policy, &rules, local_date);
            let local_time = candidate.start.with_timezone(timezone).time();
            if !slots::fits_window(&windows, local_time, candidate.duration_minutes) {
                return Err(BookingError::Conflict(ConflictReason::OutsideHours));
            }
        }

        Ok(())
    }
}

/// Effective intervals of confirmed bookings that could reach into `dates`.
///
/// Bookings are stored by the local date of their start, but buffers and long
/// durations can spill across midnight, so the neighbouring days are loaded
/// too.
pub(crate) async fn existing_intervals<S: TimeRuleStore + ?Sized>(
    store: &S,
    provider_id: &str,
    dates: &[NaiveDate],
    exclude_booking_id: Option<&str>,
) -> Result<Vec<Interval>> {
    let (first, last) = match (dates.iter().min(), dates.iter().max()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return Ok(Vec::new()),
    };

    let mut bookings = Vec::new();
    let mut day = first - Duration::days(1);
    while day <= last + Duration::days(1) {
        bookings.extend(store.confirmed_bookings_on_date(provider_id, day).await?);
        day += Duration::days(1);
    }
    bookings.retain(|b| Some(b.id.as_str()) != exclude_booking_id);

    let types = load_types(store, &bookings).await?;
    Ok(confirmed_effective_intervals(&bookings, &types))
}

async fn load_types<S: TimeRuleStore + ?Sized>(
    store: &S,
    bookings: &[Booking],
) -> Result<HashMap<String, AppointmentType>> {
    let mut types = HashMap::new();
    for id in bookings.iter().filter_map(|b| b.appointment_type_id.as_deref()) {
        if types.contains_key(id) {
            continue;
        }
        if let Some(t) = optional(store.appointment_type(id).await)? {
            types.insert(id.to_string(), t);
        }
    }
    Ok(types)
}

pub(crate) async fn load_provider<S: TimeRuleStore + ?Sized>(
    store: &S,
    provider_id: &str,
) -> Result<(Provider, Tz)> {
    let provider = store.provider(provider_id).await?;
    let timezone = tz::parse_timezone(&provider.timezone)?;
    Ok((provider, timezone))
}

/// The appointment type, checked to be active, in range, and owned by the provider.
pub(crate) async fn load_bookable_type<S: TimeRuleStore + ?Sized>(
    store: &S,
    provider_id: &str,
    appointment_type_id: &str,
) -> Result<AppointmentType> {
    let appointment_type = store.appointment_type(appointment_type_id).await?;
    if appointment_type.provider_id != provider_id {
        return Err(BookingError::NotFound(format!(
            "appointment type '{}' for provider '{}'",
            appointment_type_id, provider_id
        )));
    }
    if !appointment_type.active {
        return Err(BookingError::Validation(format!(
            "appointment type '{}' is not active",
            appointment_type_id
        )));
    }
    appointment_type.validate()?;
    Ok(appointment_type)
}

async fn load_owned_booking<S: TimeRuleStore + ?Sized>(
    store: &S,
    provider_id: &str,
    booking_id: &str,
) -> Result<Booking> {
    let booking = store.booking(booking_id).await?;
    if booking.provider_id != provider_id {
        return Err(BookingError::NotFound(format!(
            "booking '{}' for provider '{}'",
            booking_id, provider_id
        )));
    }
    Ok(booking)
}

/// Turn a store `NotFound` into `None`, keeping every other failure.
fn optional<T>(result: std::result::Result<T, StoreError>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(StoreError::NotFound(_)) => Ok(None),
        Err(other) => Err(other.into()),
    }
}

