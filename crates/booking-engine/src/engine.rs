//! The engine façade: slot queries and booking commands over one store.
//!
//! This is what a transport layer (HTTP handlers, the `booking` CLI) calls.
//! The caller supplies an already-authenticated `provider_id`; nothing here
//! reads ambient request state.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::warn;

use crate::clock::{Clock, SystemClock};
use crate::committer::{self, BookingCommitter};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::model::{Booking, Customer};
use crate::notify::{BookingEvent, BookingNotifier, NoopNotifier};
use crate::slots::{self, SlotQuery};
use crate::store::TimeRuleStore;
use crate::tz;

pub struct BookingEngine<S> {
    store: Arc<S>,
    committer: BookingCommitter<S>,
    notifier: Arc<dyn BookingNotifier>,
}

impl<S: TimeRuleStore> BookingEngine<S> {
    pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
        Self::with_parts(store, config, Arc::new(SystemClock), Arc::new(NoopNotifier))
    }

    pub fn with_parts(
        store: Arc<S>,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn BookingNotifier>,
    ) -> Self {
        Self {
            committer: BookingCommitter::new(Arc::clone(&store), config, clock),
            store,
            notifier,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        self.committer.config()
    }

    /// Bookable starts for `appointment_type_id` on the provider-local `date`.
    ///
    /// Takes no locks. Starts already in the past are dropped unless the
    /// config allows past bookings.
    pub async fn available_slots(
        &self,
        provider_id: &str,
        appointment_type_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<DateTime<Utc>>> {
        let store = self.store.as_ref();
        let (_provider, timezone) = committer::load_provider(store, provider_id).await?;
        let appointment_type =
            committer::load_bookable_type(store, provider_id, appointment_type_id).await?;

        let weekly_rules = store.weekly_rules(provider_id).await?;
        let exceptions = store.exceptions(provider_id).await?;
        let blocked_ranges = store.blocked_ranges(provider_id).await?;
        let existing = committer::existing_intervals(store, provider_id, &[date], None).await?;

        let mut found = slots::generate_slots(&SlotQuery {
            timezone: &timezone,
            appointment_type: &appointment_type,
            date,
            weekly_rules: &weekly_rules,
            exceptions: &exceptions,
            blocked_ranges: &blocked_ranges,
            existing: &existing,
        });

        if !self.config().allow_past_bookings {
            let now = self.committer.now();
            found.retain(|start| *start >= now);
        }
        Ok(found)
    }

    /// Parse a `YYYY-MM-DD` day and list its slots.
    pub async fn available_slots_on(
        &self,
        provider_id: &str,
        appointment_type_id: &str,
        date: &str,
    ) -> Result<Vec<DateTime<Utc>>> {
        let date = tz::parse_date(date)?;
        self.available_slots(provider_id, appointment_type_id, date).await
    }

    pub async fn book(
        &self,
        provider_id: &str,
        appointment_type_id: &str,
        start: DateTime<Utc>,
        customer: &Customer,
    ) -> Result<Booking> {
        let booking = self
            .committer
            .commit(provider_id, appointment_type_id, start, customer)
            .await?;
        self.dispatch(BookingEvent::Confirmed, &booking);
        Ok(booking)
    }

    pub async fn book_internal(
        &self,
        provider_id: &str,
        start: DateTime<Utc>,
        duration_minutes: Option<u32>,
        customer: &Customer,
    ) -> Result<Booking> {
        let booking = self
            .committer
            .commit_internal(provider_id, start, duration_minutes, customer)
            .await?;
        self.dispatch(BookingEvent::Confirmed, &booking);
        Ok(booking)
    }

    pub async fn reschedule(
        &self,
        provider_id: &str,
        booking_id: &str,
        new_start: DateTime<Utc>,
    ) -> Result<Booking> {
        let booking = self
            .committer
            .reschedule(provider_id, booking_id, new_start)
            .await?;
        self.dispatch(BookingEvent::Rescheduled, &booking);
        Ok(booking)
    }

    pub async fn cancel(&self, provider_id: &str, booking_id: &str) -> Result<Booking> {
        let before = self.store.booking(booking_id).await?;
        let booking = self.committer.cancel(provider_id, booking_id).await?;
        if before.is_confirmed() {
            self.dispatch(BookingEvent::Cancelled, &booking);
        }
        Ok(booking)
    }

    /// Look a booking up by the opaque token handed to the customer.
    pub async fn booking_by_token(&self, access_token: &str) -> Result<Booking> {
        Ok(self.store.booking_by_token(access_token).await?)
    }

    /// Fire-and-forget: the booking is already committed.
    fn dispatch(&self, event: BookingEvent, booking: &Booking) {
        let notifier = Arc::clone(&self.notifier);
        let booking = booking.clone();
        tokio::spawn(async move {
            if let Err(err) = notifier.notify(event, &booking).await {
                warn!(booking_id = %booking.id, ?event, error = %err, "booking notification failed");
            }
        });
    }
}
