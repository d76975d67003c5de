//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for [`BookingEngine`](crate::engine::BookingEngine).
///
/// Every field has a default so a partial JSON document is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Duration of internal bookings made without an appointment type.
    pub internal_booking_minutes: u32,
    /// Accept bookings whose start is already in the past.
    pub allow_past_bookings: bool,
    /// Upper bound on waiting for a provider-day commit lock.
    pub lock_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            internal_booking_minutes: 30,
            allow_past_bookings: false,
            lock_timeout_ms: 5_000,
        }
    }
}

impl EngineConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}
