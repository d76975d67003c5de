//! Post-commit notifications (email, external calendar sync).
//!
//! Notifications run after the commit lock is released, on their own task.
//! A failed notification is logged and never undoes the booking.

use async_trait::async_trait;

use crate::error::NotifyError;
use crate::model::Booking;

/// What happened to the booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingEvent {
    Confirmed,
    Rescheduled,
    Cancelled,
}

#[async_trait]
pub trait BookingNotifier: Send + Sync + 'static {
    async fn notify(&self, event: BookingEvent, booking: &Booking) -> Result<(), NotifyError>;
}

/// Drops every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl BookingNotifier for NoopNotifier {
    async fn notify(&self, _event: BookingEvent, _booking: &Booking) -> Result<(), NotifyError> {
        Ok(())
    }
}
