//! Bookable time slots for one date.
//!
//! Walks every matching working schedule in 15-minute steps, drops candidates
//! that collide with the schedule's break or run past its end, and flags each
//! remaining candidate as available unless its service window overlaps an
//! existing booking of the same staff member. The result is a snapshot: no
//! slot is reserved, so booking creation must re-check at write time.

use chrono::{Duration, NaiveDate, NaiveTime, Timelike};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dst::DstPolicy;
use crate::error::{BookingError, Result};
use crate::model::{
    iso_day_of_week, AppointmentType, BookedInterval, TimeSlot, WorkingSchedule,
    SLOT_GRANULARITY_MINUTES,
};

/// Knobs for candidate generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotPolicy {
    /// Drop candidates whose service window would run past the schedule's end.
    pub clip_to_schedule_end: bool,
    pub dst_policy: DstPolicy,
}

impl Default for SlotPolicy {
    fn default() -> Self {
        Self {
            clip_to_schedule_end: true,
            dst_policy: DstPolicy::default(),
        }
    }
}

/// Everything the calculator needs, already fetched from the store.
#[derive(Debug, Clone)]
pub struct AvailabilityInput<'a> {
    pub date: NaiveDate,
    pub appointment_type: &'a AppointmentType,
    pub schedules: &'a [WorkingSchedule],
    /// Bookings starting on `date`. Cancelled ones are ignored.
    pub booked: &'a [BookedInterval],
    pub doctor_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub timezone: Tz,
    pub policy: SlotPolicy,
}

/// Compute the ordered slot list for one date.
///
/// Schedules that are inactive, on another weekday, or excluded by the
/// doctor/location filters contribute nothing. The output is stably sorted by
/// time of day, so staff sharing a start time keep schedule order.
///
/// A candidate is dropped when its whole service window `[start, start + D)`
/// touches the break, not just its 15-minute grid cell.
///
/// # Errors
/// Returns `BookingError::Validation` if the appointment type is inactive or
/// has a zero duration.
pub fn compute_available_slots(input: &AvailabilityInput<'_>) -> Result<Vec<TimeSlot>> {
    let appointment_type = input.appointment_type;
    ensure_bookable(appointment_type)?;

    let duration = appointment_type.duration();
    let day_of_week = iso_day_of_week(input.date);
    let mut slots = Vec::new();

    let schedules = input.schedules.iter().filter(|s| {
        s.is_active
            && s.day_of_week == day_of_week
            && input.doctor_id.map_or(true, |id| s.staff_id == id)
            && input.location_id.map_or(true, |id| s.location_id == id)
    });

    for schedule in schedules {
        let busy: Vec<&BookedInterval> = input
            .booked
            .iter()
            .filter(|b| b.staff_id == schedule.staff_id)
            .collect();

        for time in candidate_starts(schedule, duration, input.policy.clip_to_schedule_end) {
            let local = input.date.and_time(time);
            let Some(starts_at) = input.policy.dst_policy.resolve(input.timezone, local) else {
                continue;
            };
            let ends_at = starts_at + duration;

            slots.push(TimeSlot {
                time,
                starts_at,
                ends_at,
                available: !busy.iter().any(|b| b.blocks(starts_at, ends_at)),
                staff_id: schedule.staff_id,
                staff_name: schedule.staff_name.clone(),
                location_id: schedule.location_id,
                appointment_type_id: appointment_type.id,
            });
        }
    }

    slots.sort_by_key(|slot| slot.time);
    Ok(slots)
}

/// Reject appointment types that cannot be offered at all.
pub(crate) fn ensure_bookable(appointment_type: &AppointmentType) -> Result<()> {
    if !appointment_type.is_active {
        return Err(BookingError::Validation(format!(
            "appointment type '{}' is not active",
            appointment_type.name
        )));
    }
    if appointment_type.duration_minutes == 0 {
        return Err(BookingError::Validation(format!(
            "appointment type '{}' has no duration",
            appointment_type.name
        )));
    }
    Ok(())
}

/// Candidate start times for one schedule, ascending.
///
/// A candidate is kept when it starts before `end_time`, its service window
/// avoids the break, and (when clipping) the window ends by `end_time`.
fn candidate_starts(
    schedule: &WorkingSchedule,
    duration: Duration,
    clip_to_end: bool,
) -> impl Iterator<Item = NaiveTime> + '_ {
    let step = SLOT_GRANULARITY_MINUTES * 60;
    let service = duration.num_seconds();
    let open = seconds_of(schedule.start_time);
    let close = seconds_of(schedule.end_time);

    (open..close)
        .step_by(step as usize)
        .filter(move |&start| !clip_to_end || start + service <= close)
        .filter(move |&start| {
            schedule.break_window.map_or(true, |br| {
                !(start < seconds_of(br.end) && start + service > seconds_of(br.start))
            })
        })
        .filter_map(|start| NaiveTime::from_num_seconds_from_midnight_opt(start as u32, 0))
}

fn seconds_of(time: NaiveTime) -> i64 {
    i64::from(time.num_seconds_from_midnight())
}
