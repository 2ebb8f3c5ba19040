//! # booking-engine
//!
//! Slot availability and session recurrence for practice booking.
//!
//! The engine answers two questions for a booking portal: which start times
//! are free for a given appointment type on a given day, and which concrete
//! sessions follow from a recurring template. Both are pure computations over
//! explicit inputs; [`service::BookingService`] wires them to an injected store.
//!
//! ## Modules
//!
//! - [`availability`] — working schedules + bookings → ordered 15-minute slots
//! - [`recurrence`] — session template + rule + end date → dated instances
//! - [`conflict`] — overlap checks between booked intervals
//! - [`dst`] — DST transition policies for local wall-clock times
//! - [`model`] — domain types
//! - [`store`] — store traits, row mapping, in-memory store
//! - [`notify`] — post-booking notifications
//! - [`service`] — store-backed entry points with deadlines
//! - [`config`] — layered engine configuration
//! - [`error`] — Error types

pub mod availability;
pub mod config;
pub mod conflict;
pub mod dst;
pub mod error;
pub mod model;
pub mod notify;
pub mod recurrence;
pub mod service;
pub mod store;

pub use availability::{compute_available_slots, AvailabilityInput, SlotPolicy};
pub use config::EngineConfig;
pub use conflict::find_conflicts;
pub use dst::DstPolicy;
pub use error::{BookingError, ConfigError, StoreError};
pub use model::{
    AppointmentType, BookedInterval, BookingRequest, BookingStatus, BreakWindow, RecurrenceType,
    SessionInstance, SessionTemplate, SlotRequest, TimeSlot, WorkingSchedule,
};
pub use notify::{LogNotifier, Notification, Notifier, NotifyError};
pub use recurrence::{expand_recurrence, ExpansionOptions};
pub use service::BookingService;
pub use store::{BookingStore, InMemoryStore, StoreSnapshot};
