//! The booking store boundary.
//!
//! The engine never talks to a database directly. Callers inject an
//! implementation of these traits; [`InMemoryStore`] backs the CLI and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;
use crate::model::{
    AppointmentType, BookedInterval, NewBooking, SessionInstance, SessionTemplate, WorkingSchedule,
};

pub mod memory;
pub mod records;

pub use memory::InMemoryStore;
pub use records::StoreSnapshot;

/// Half-open instant range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleFilter {
    pub doctor_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BookingFilter {
    pub staff_id: Option<Uuid>,
    pub include_cancelled: bool,
}

#[async_trait]
pub trait ScheduleReader: Send + Sync {
    /// Active schedules for an ISO weekday, narrowed by `filter`.
    async fn working_schedules(
        &self,
        day_of_week: u8,
        filter: &ScheduleFilter,
    ) -> Result<Vec<WorkingSchedule>, StoreError>;
}

#[async_trait]
pub trait BookingReader: Send + Sync {
    /// Bookings whose start lies in `range`.
    async fn booked_intervals(
        &self,
        range: TimeRange,
        filter: &BookingFilter,
    ) -> Result<Vec<BookedInterval>, StoreError>;
}

#[async_trait]
pub trait AppointmentTypeReader: Send + Sync {
    async fn appointment_type(&self, id: Uuid) -> Result<Option<AppointmentType>, StoreError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn session_template(&self, id: Uuid) -> Result<Option<SessionTemplate>, StoreError>;

    /// Persist instances in the given order and return them as stored.
    async fn create_session_instances(
        &self,
        instances: &[SessionInstance],
    ) -> Result<Vec<SessionInstance>, StoreError>;

    async fn link_staff_to_instances(
        &self,
        instance_ids: &[Uuid],
        staff_ids: &[Uuid],
    ) -> Result<(), StoreError>;

    /// Remove instances (and their staff links) created by a failed attempt.
    async fn delete_session_instances(&self, instance_ids: &[Uuid]) -> Result<(), StoreError>;
}

#[async_trait]
pub trait BookingWriter: Send + Sync {
    /// Insert a booking, failing with [`StoreError::Conflict`] if it overlaps an
    /// existing time-blocking booking of the same staff member. The check and
    /// the insert must be atomic.
    async fn insert_booking(&self, booking: NewBooking) -> Result<BookedInterval, StoreError>;
}

/// Everything the booking service needs from a store.
pub trait BookingStore:
    ScheduleReader + BookingReader + AppointmentTypeReader + SessionStore + BookingWriter
{
}

impl<T> BookingStore for T where
    T: ScheduleReader + BookingReader + AppointmentTypeReader + SessionStore + BookingWriter
{
}
