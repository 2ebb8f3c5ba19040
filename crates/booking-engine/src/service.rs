//! Store-backed entry points.
//!
//! [`BookingService`] fetches inputs from an injected [`BookingStore`], runs the
//! pure calculators and writes results back. Every operation runs under the
//! configured deadline; on expiry (or when the caller drops the future) nothing
//! partial is returned.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, NaiveDate};
use chrono_tz::Tz;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::availability::{compute_available_slots, ensure_bookable, AvailabilityInput};
use crate::config::EngineConfig;
use crate::dst::DstPolicy;
use crate::error::{BookingError, ConfigError, Result, StoreError};
use crate::model::{
    iso_day_of_week, AppointmentType, BookedInterval, BookingRequest, NewBooking, SessionInstance,
    SessionTemplate, SlotRequest, TimeSlot,
};
use crate::notify::{dispatch, Notification, Notifier};
use crate::recurrence::expand_recurrence;
use crate::store::{
    AppointmentTypeReader, BookingFilter, BookingReader, BookingStore, BookingWriter,
    ScheduleFilter, ScheduleReader, SessionStore, TimeRange,
};

pub struct BookingService {
    store: Arc<dyn BookingStore>,
    notifier: Arc<dyn Notifier>,
    config: EngineConfig,
    timezone: Tz,
    timeout: Duration,
}

impl BookingService {
    /// # Errors
    /// Fails if `config` does not validate.
    pub fn new(
        store: Arc<dyn BookingStore>,
        notifier: Arc<dyn Notifier>,
        config: EngineConfig,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            store,
            notifier,
            timezone: config.tz()?,
            timeout: config.store_timeout(),
            config,
        })
    }

    /// Override the per-operation deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Compute the slot list for `request.date`.
    ///
    /// # Errors
    /// `NotFound` for an unknown appointment type, `Validation` for an inactive
    /// one, `Store` / `TimedOut` when the store fails or stalls.
    #[instrument(skip(self), fields(date = %request.date))]
    pub async fn available_slots(&self, request: &SlotRequest) -> Result<Vec<TimeSlot>> {
        self.bounded(async {
            let appointment_type = self.appointment_type(request.appointment_type_id).await?;
            self.slots_on(request, request.date, &appointment_type).await
        })
        .await
    }

    /// First available slot on or after `request.date`, searching
    /// `search_horizon_days` days.
    #[instrument(skip(self), fields(from = %request.date))]
    pub async fn next_available_slot(&self, request: &SlotRequest) -> Result<Option<TimeSlot>> {
        self.bounded(async {
            let appointment_type = self.appointment_type(request.appointment_type_id).await?;
            for offset in 0..self.config.search_horizon_days {
                let Some(date) = request.date.checked_add_days(Days::new(u64::from(offset))) else {
                    break;
                };
                let slots = self.slots_on(request, date, &appointment_type).await?;
                if let Some(slot) = slots.into_iter().find(|s| s.available) {
                    return Ok(Some(slot));
                }
            }
            Ok::<_, BookingError>(None)
        })
        .await
    }

    /// Expand the stored template `template_id` using its own recurrence settings.
    #[instrument(skip(self))]
    pub async fn expand_session_series(&self, template_id: Uuid) -> Result<Vec<SessionInstance>> {
        let template = self
            .bounded(async {
                self.store
                    .session_template(template_id)
                    .await?
                    .ok_or_else(|| BookingError::not_found("session", template_id))
            })
            .await?;
        self.create_recurring_series(&template).await
    }

    /// Generate the instances following `template` and persist them with their
    /// staff links as one batch.
    ///
    /// If linking staff fails or the deadline expires mid-write, the instances
    /// of this series are deleted again before the error is returned.
    #[instrument(skip(self, template), fields(template_id = %template.id, recurrence = %template.recurrence_type))]
    pub async fn create_recurring_series(
        &self,
        template: &SessionTemplate,
    ) -> Result<Vec<SessionInstance>> {
        let options = self
            .config
            .expansion_options()
            .map_err(|e| BookingError::Validation(e.to_string()))?;
        let instances = expand_recurrence(
            template,
            template.recurrence_type,
            template.recurrence_end_date,
            &options,
        )?;
        if instances.is_empty() {
            return Ok(instances);
        }

        let created =
            match tokio::time::timeout(self.timeout, self.persist_series(template, &instances))
                .await
            {
                Ok(result) => result?,
                Err(_) => {
                    // The write may have committed before the deadline hit.
                    let ids: Vec<Uuid> = instances.iter().map(|i| i.id).collect();
                    self.discard_series(&ids).await;
                    return Err(BookingError::TimedOut(self.timeout));
                }
            };
        debug!(count = created.len(), "series persisted");

        let notification = Notification::SeriesCreated {
            template_id: template.id,
            instance_count: created.len(),
            staff_ids: template.staff_ids.clone(),
            first_start: created.first().map(|i| i.start),
            last_start: created.last().map(|i| i.start),
        };
        dispatch(self.notifier.as_ref(), &notification, self.config.notify_timeout()).await;

        Ok(created)
    }

    /// Book one appointment at an exact start time.
    ///
    /// The start must match a slot of `request.staff_id`'s schedule. The store
    /// re-checks for overlap when writing, so a slot taken between the read and
    /// the write still fails with `Conflict`.
    #[instrument(skip(self), fields(staff_id = %request.staff_id, start = %request.start))]
    pub async fn book_appointment(&self, request: &BookingRequest) -> Result<BookedInterval> {
        let booked = self
            .bounded(async {
                let appointment_type = self.appointment_type(request.appointment_type_id).await?;
                let date = request.start.with_timezone(&self.timezone).date_naive();
                let slot_request = SlotRequest {
                    date,
                    appointment_type_id: appointment_type.id,
                    doctor_id: Some(request.staff_id),
                    location_id: request.location_id,
                };
                let slots = self.slots_on(&slot_request, date, &appointment_type).await?;
                let slot = slots
                    .into_iter()
                    .find(|s| s.starts_at == request.start)
                    .ok_or_else(|| {
                        BookingError::Validation(format!(
                            "{} is not a bookable start time for staff {}",
                            request.start, request.staff_id
                        ))
                    })?;
                if !slot.available {
                    return Err(BookingError::Conflict(format!(
                        "slot {} is already booked",
                        slot.label()
                    )));
                }

                let booking = NewBooking {
                    staff_id: request.staff_id,
                    appointment_type_id: appointment_type.id,
                    patient_id: request.patient_id,
                    location_id: request.location_id.or(Some(slot.location_id)),
                    start: slot.starts_at,
                    end: slot.ends_at,
                };
                self.store.insert_booking(booking).await.map_err(|err| match err {
                    StoreError::Conflict(reason) => BookingError::Conflict(reason),
                    other => BookingError::Store(other),
                })
            })
            .await?;

        let notification = Notification::BookingCreated {
            booking_id: booked.id,
            staff_id: booked.staff_id,
            appointment_type_id: request.appointment_type_id,
            patient_id: request.patient_id,
            start: booked.start,
            end: booked.end,
        };
        dispatch(self.notifier.as_ref(), &notification, self.config.notify_timeout()).await;

        Ok(booked)
    }

    async fn bounded<T>(&self, operation: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.timeout, operation)
            .await
            .map_err(|_| BookingError::TimedOut(self.timeout))?
    }

    /// Fetch an appointment type that can be booked. Checked before any
    /// schedule read so the answer does not depend on the weekday.
    async fn appointment_type(&self, id: Uuid) -> Result<AppointmentType> {
        let appointment_type = self
            .store
            .appointment_type(id)
            .await?
            .ok_or_else(|| BookingError::not_found("appointment type", id))?;
        ensure_bookable(&appointment_type)?;
        Ok(appointment_type)
    }

    async fn slots_on(
        &self,
        request: &SlotRequest,
        date: NaiveDate,
        appointment_type: &AppointmentType,
    ) -> Result<Vec<TimeSlot>> {
        let schedule_filter = ScheduleFilter {
            doctor_id: request.doctor_id,
            location_id: request.location_id,
        };
        let schedules = self
            .store
            .working_schedules(iso_day_of_week(date), &schedule_filter)
            .await?;
        if schedules.is_empty() {
            debug!(%date, "no working schedules");
            return Ok(Vec::new());
        }

        let booked = self
            .store
            .booked_intervals(self.day_range(date)?, &BookingFilter::default())
            .await?;

        let slots = compute_available_slots(&AvailabilityInput {
            date,
            appointment_type,
            schedules: &schedules,
            booked: &booked,
            doctor_id: request.doctor_id,
            location_id: request.location_id,
            timezone: self.timezone,
            policy: self.config.slot_policy(),
        })?;
        debug!(
            %date,
            schedules = schedules.len(),
            booked = booked.len(),
            slots = slots.len(),
            "slots computed"
        );
        Ok(slots)
    }

    /// Local midnight to the next local midnight, as instants.
    fn day_range(&self, date: NaiveDate) -> Result<TimeRange> {
        let next = date
            .succ_opt()
            .ok_or_else(|| BookingError::Validation(format!("no day after {date}")))?;
        let midnight = |d: NaiveDate| {
            d.and_hms_opt(0, 0, 0)
                .and_then(|local| DstPolicy::ShiftForward.resolve(self.timezone, local))
                .ok_or_else(|| BookingError::Validation(format!("{d} has no local midnight")))
        };
        Ok(TimeRange {
            start: midnight(date)?,
            end: midnight(next)?,
        })
    }

    async fn persist_series(
        &self,
        template: &SessionTemplate,
        instances: &[SessionInstance],
    ) -> Result<Vec<SessionInstance>> {
        let created = self.store.create_session_instances(instances).await?;
        if template.staff_ids.is_empty() {
            return Ok(created);
        }

        let ids: Vec<Uuid> = created.iter().map(|i| i.id).collect();
        if let Err(err) = self
            .store
            .link_staff_to_instances(&ids, &template.staff_ids)
            .await
        {
            self.discard_series(&ids).await;
            return Err(err.into());
        }
        Ok(created)
    }

    /// Best-effort removal of a half-written series, under its own deadline.
    async fn discard_series(&self, ids: &[Uuid]) {
        match tokio::time::timeout(self.timeout, self.store.delete_session_instances(ids)).await {
            Ok(Ok(())) => debug!(count = ids.len(), "partial series removed"),
            Ok(Err(err)) => {
                warn!(error = %err, count = ids.len(), "failed to remove partially created series");
            }
            Err(_) => warn!(count = ids.len(), "timed out removing partially created series"),
        }
    }
}
