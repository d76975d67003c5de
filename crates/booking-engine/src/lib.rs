//! # booking-engine
//!
//! Availability and booking conflict resolution for appointment scheduling.
//!
//! Turns a provider's weekly hours, date exceptions, blocked ranges, and
//! committed bookings into bookable slots, then commits new bookings only if
//! they still collide with nothing, including concurrent requests.
//!
//! ## Modules
//!
//! - [`model`] — Providers, appointment types, rules, exceptions, bookings
//! - [`tz`] — Provider-local wall clock → UTC with DST gap/overlap handling
//! - [`conflict`] — Half-open interval overlap and effective intervals
//! - [`exception`] — Date exceptions → day policy
//! - [`slots`] — Slot generation for one day and appointment type
//! - [`locks`] — Per-provider, per-day commit serialization
//! - [`committer`] — Locked re-check and write for book / reschedule / cancel
//! - [`engine`] — Façade over a [`store::TimeRuleStore`]
//! - [`store`] — Storage seam and in-memory store
//! - [`notify`] — Post-commit notifications
//! - [`config`], [`clock`] — Tunables and the "now" source
//! - [`error`] — Error types

pub mod clock;
pub mod committer;
pub mod config;
pub mod conflict;
pub mod engine;
pub mod error;
pub mod exception;
pub mod locks;
pub mod model;
pub mod notify;
pub mod slots;
pub mod store;
pub mod tz;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::EngineConfig;
pub use conflict::{effective_interval, find_overlaps, overlaps, Interval};
pub use engine::BookingEngine;
pub use error::{BookingError, ConflictReason, NotifyError, StoreError};
pub use exception::{resolve, DayPolicy, TimeRange};
pub use model::{
    AppointmentType, BlockedRange, Booking, BookingStatus, Customer, DateException, ExceptionKind,
    Provider, WeeklyRule,
};
pub use notify::{BookingEvent, BookingNotifier, NoopNotifier};
pub use slots::{generate_slots, SlotQuery};
pub use store::{InMemoryStore, StoreSnapshot, TimeRuleStore};
