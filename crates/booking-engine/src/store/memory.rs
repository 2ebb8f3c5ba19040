//! In-memory [`BookingStore`](super::BookingStore) built from a [`StoreSnapshot`].

use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::records::StoreSnapshot;
use super::{
    AppointmentTypeReader, BookingFilter, BookingReader, BookingWriter, ScheduleFilter,
    ScheduleReader, SessionStore, TimeRange,
};
use crate::conflict::find_conflicts;
use crate::error::StoreError;
use crate::model::{
    AppointmentType, BookedInterval, BookingStatus, NewBooking, SessionInstance, SessionTemplate,
    WorkingSchedule,
};

#[derive(Debug, Default)]
struct State {
    schedules: Vec<WorkingSchedule>,
    appointment_types: Vec<AppointmentType>,
    bookings: Vec<BookedInterval>,
    templates: Vec<SessionTemplate>,
    instances: Vec<SessionInstance>,
    staff_links: BTreeSet<(Uuid, Uuid)>,
}

/// A store held entirely in memory. All operations take one lock, so each
/// call is atomic with respect to the others.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map every row of `snapshot` into the domain model.
    ///
    /// # Errors
    /// Fails on the first malformed row, or if two stored bookings of the same
    /// staff member overlap.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Result<Self, StoreError> {
        let state = State {
            schedules: map_rows(snapshot.working_schedules)?,
            appointment_types: map_rows(snapshot.appointment_types)?,
            bookings: map_rows(snapshot.appointments)?,
            templates: map_rows(snapshot.sessions)?,
            ..State::default()
        };

        if let Some(conflict) = find_conflicts(&state.bookings).first() {
            return Err(StoreError::malformed(
                "appointment",
                conflict.booking_b.id,
                format!(
                    "overlaps appointment {} by {} minutes",
                    conflict.booking_a.id, conflict.overlap_minutes
                ),
            ));
        }

        Ok(Self {
            state: Mutex::new(state),
        })
    }

    /// Load a JSON snapshot file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let raw = std::fs::read_to_string(path)?;
        let snapshot: StoreSnapshot = serde_json::from_str(&raw)?;
        Self::from_snapshot(snapshot)
    }

    pub async fn add_schedule(&self, schedule: WorkingSchedule) -> Result<(), StoreError> {
        schedule
            .validate()
            .map_err(|reason| StoreError::malformed("working_schedule", schedule.id, reason))?;
        self.state.lock().await.schedules.push(schedule);
        Ok(())
    }

    pub async fn add_appointment_type(&self, appointment_type: AppointmentType) {
        self.state.lock().await.appointment_types.push(appointment_type);
    }

    pub async fn add_booking(&self, booking: BookedInterval) {
        self.state.lock().await.bookings.push(booking);
    }

    pub async fn add_template(&self, template: SessionTemplate) {
        self.state.lock().await.templates.push(template);
    }

    /// Instances stored so far, in insertion order.
    pub async fn instances(&self) -> Vec<SessionInstance> {
        self.state.lock().await.instances.clone()
    }

    /// `(instance_id, staff_id)` links stored so far.
    pub async fn staff_links(&self) -> Vec<(Uuid, Uuid)> {
        self.state.lock().await.staff_links.iter().copied().collect()
    }

    pub async fn bookings(&self) -> Vec<BookedInterval> {
        self.state.lock().await.bookings.clone()
    }
}

fn map_rows<R, T>(rows: Vec<R>) -> Result<Vec<T>, StoreError>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

#[async_trait]
impl ScheduleReader for InMemoryStore {
    async fn working_schedules(
        &self,
        day_of_week: u8,
        filter: &ScheduleFilter,
    ) -> Result<Vec<WorkingSchedule>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .schedules
            .iter()
            .filter(|s| s.is_active && s.day_of_week == day_of_week)
            .filter(|s| filter.doctor_id.map_or(true, |id| s.staff_id == id))
            .filter(|s| filter.location_id.map_or(true, |id| s.location_id == id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl BookingReader for InMemoryStore {
    async fn booked_intervals(
        &self,
        range: TimeRange,
        filter: &BookingFilter,
    ) -> Result<Vec<BookedInterval>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .bookings
            .iter()
            .filter(|b| range.contains(b.start))
            .filter(|b| filter.include_cancelled || b.status.blocks_time())
            .filter(|b| filter.staff_id.map_or(true, |id| b.staff_id == id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AppointmentTypeReader for InMemoryStore {
    async fn appointment_type(&self, id: Uuid) -> Result<Option<AppointmentType>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.appointment_types.iter().find(|t| t.id == id).cloned())
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn session_template(&self, id: Uuid) -> Result<Option<SessionTemplate>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.templates.iter().find(|t| t.id == id).cloned())
    }

    async fn create_session_instances(
        &self,
        instances: &[SessionInstance],
    ) -> Result<Vec<SessionInstance>, StoreError> {
        let mut state = self.state.lock().await;
        if let Some(dup) = instances
            .iter()
            .find(|i| state.instances.iter().any(|stored| stored.id == i.id))
        {
            return Err(StoreError::Conflict(format!("session {} already exists", dup.id)));
        }
        state.instances.extend_from_slice(instances);
        Ok(instances.to_vec())
    }

    async fn link_staff_to_instances(
        &self,
        instance_ids: &[Uuid],
        staff_ids: &[Uuid],
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if let Some(missing) = instance_ids
            .iter()
            .find(|id| !state.instances.iter().any(|i| i.id == **id))
        {
            return Err(StoreError::Unavailable(format!("session {missing} does not exist")));
        }
        for instance_id in instance_ids {
            for staff_id in staff_ids {
                state.staff_links.insert((*instance_id, *staff_id));
            }
        }
        Ok(())
    }

    async fn delete_session_instances(&self, instance_ids: &[Uuid]) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.instances.retain(|i| !instance_ids.contains(&i.id));
        state
            .staff_links
            .retain(|(instance_id, _)| !instance_ids.contains(instance_id));
        Ok(())
    }
}

#[async_trait]
impl BookingWriter for InMemoryStore {
    async fn insert_booking(&self, booking: NewBooking) -> Result<BookedInterval, StoreError> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state
            .bookings
            .iter()
            .find(|b| b.staff_id == booking.staff_id && b.blocks(booking.start, booking.end))
        {
            return Err(StoreError::Conflict(format!(
                "staff {} is already booked {} - {}",
                booking.staff_id, existing.start, existing.end
            )));
        }

        let stored = BookedInterval {
            id: Uuid::new_v4(),
            staff_id: booking.staff_id,
            start: booking.start,
            end: booking.end,
            status: BookingStatus::Scheduled,
        };
        state.bookings.push(stored.clone());
        Ok(stored)
    }
}
