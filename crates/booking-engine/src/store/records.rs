//! Raw store rows and their mapping into the domain model.
//!
//! Rows mirror what the hosted data layer hands back: string identifiers,
//! string times, optional columns and free-form status text. Every conversion
//! validates and fails with [`StoreError::Malformed`]; nothing is defaulted.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;
use crate::model::{
    hhmm, AppointmentType, BookedInterval, BookingStatus, BreakWindow, RecurrenceType,
    SessionTemplate, WorkingSchedule, SLOT_GRANULARITY_MINUTES,
};

/// A full store dump, as loaded by [`super::InMemoryStore::from_snapshot`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub working_schedules: Vec<WorkingScheduleRow>,
    #[serde(default)]
    pub appointment_types: Vec<AppointmentTypeRow>,
    #[serde(default)]
    pub appointments: Vec<AppointmentRow>,
    #[serde(default)]
    pub sessions: Vec<SessionRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingScheduleRow {
    pub id: String,
    pub doctor_id: String,
    pub doctor_name: String,
    pub location_id: String,
    pub day_of_week: i64,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub break_start: Option<String>,
    #[serde(default)]
    pub break_end: Option<String>,
    pub is_active: bool,
    #[serde(default)]
    pub slot_duration_minutes: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentTypeRow {
    pub id: String,
    pub name: String,
    pub duration_minutes: i64,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentRow {
    pub id: String,
    pub doctor_id: String,
    pub start_time: String,
    pub end_time: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRow {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub patient_id: Option<String>,
    #[serde(default)]
    pub location_id: Option<String>,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub staff_ids: Vec<String>,
    #[serde(default)]
    pub recurrence_type: Option<String>,
    #[serde(default)]
    pub recurrence_end_date: Option<String>,
}

/// Field parser bound to one record, so every error names its entity and id.
struct Fields<'a> {
    entity: &'static str,
    id: &'a str,
}

impl<'a> Fields<'a> {
    fn new(entity: &'static str, id: &'a str) -> Self {
        Self { entity, id }
    }

    fn malformed(&self, reason: impl Into<String>) -> StoreError {
        StoreError::malformed(self.entity, self.id, reason)
    }

    fn uuid(&self, field: &str, raw: &str) -> Result<Uuid, StoreError> {
        Uuid::parse_str(raw.trim()).map_err(|e| self.malformed(format!("{field} '{raw}': {e}")))
    }

    fn opt_uuid(&self, field: &str, raw: Option<&str>) -> Result<Option<Uuid>, StoreError> {
        raw.map(|value| self.uuid(field, value)).transpose()
    }

    fn time(&self, field: &str, raw: &str) -> Result<NaiveTime, StoreError> {
        hhmm::parse(raw.trim()).map_err(|e| self.malformed(format!("{field} '{raw}': {e}")))
    }

    fn timestamp(&self, field: &str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
        DateTime::parse_from_rfc3339(raw.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| self.malformed(format!("{field} '{raw}': {e}")))
    }

    fn date(&self, field: &str, raw: &str) -> Result<NaiveDate, StoreError> {
        NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map_err(|e| self.malformed(format!("{field} '{raw}': {e}")))
    }
}

impl TryFrom<WorkingScheduleRow> for WorkingSchedule {
    type Error = StoreError;

    fn try_from(row: WorkingScheduleRow) -> Result<Self, Self::Error> {
        let f = Fields::new("working_schedule", &row.id);

        if let Some(minutes) = row.slot_duration_minutes {
            if minutes != SLOT_GRANULARITY_MINUTES {
                return Err(f.malformed(format!(
                    "slot_duration_minutes {minutes} differs from the fixed {SLOT_GRANULARITY_MINUTES}-minute granularity"
                )));
            }
        }

        let day_of_week = u8::try_from(row.day_of_week)
            .map_err(|_| f.malformed(format!("day_of_week {} is out of range", row.day_of_week)))?;

        let break_window = match (row.break_start.as_deref(), row.break_end.as_deref()) {
            (None, None) => None,
            (Some(start), Some(end)) => Some(BreakWindow {
                start: f.time("break_start", start)?,
                end: f.time("break_end", end)?,
            }),
            _ => return Err(f.malformed("break_start and break_end must be set together")),
        };

        let schedule = WorkingSchedule {
            id: f.uuid("id", &row.id)?,
            staff_id: f.uuid("doctor_id", &row.doctor_id)?,
            staff_name: row.doctor_name.clone(),
            location_id: f.uuid("location_id", &row.location_id)?,
            day_of_week,
            start_time: f.time("start_time", &row.start_time)?,
            end_time: f.time("end_time", &row.end_time)?,
            break_window,
            is_active: row.is_active,
        };
        schedule.validate().map_err(|reason| f.malformed(reason))?;
        Ok(schedule)
    }
}

impl TryFrom<AppointmentTypeRow> for AppointmentType {
    type Error = StoreError;

    fn try_from(row: AppointmentTypeRow) -> Result<Self, Self::Error> {
        let f = Fields::new("appointment_type", &row.id);
        let duration_minutes = u32::try_from(row.duration_minutes)
            .ok()
            .filter(|minutes| *minutes > 0)
            .ok_or_else(|| {
                f.malformed(format!("duration_minutes {} must be positive", row.duration_minutes))
            })?;

        Ok(AppointmentType {
            id: f.uuid("id", &row.id)?,
            name: row.name,
            duration_minutes,
            is_active: row.is_active,
        })
    }
}

impl TryFrom<AppointmentRow> for BookedInterval {
    type Error = StoreError;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        let f = Fields::new("appointment", &row.id);
        let start = f.timestamp("start_time", &row.start_time)?;
        let end = f.timestamp("end_time", &row.end_time)?;
        if start >= end {
            return Err(f.malformed(format!("start_time {start} is not before end_time {end}")));
        }

        Ok(BookedInterval {
            id: f.uuid("id", &row.id)?,
            staff_id: f.uuid("doctor_id", &row.doctor_id)?,
            start,
            end,
            status: BookingStatus::from_str(&row.status).map_err(|e| f.malformed(e))?,
        })
    }
}

impl TryFrom<SessionRow> for SessionTemplate {
    type Error = StoreError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let f = Fields::new("session", &row.id);
        let recurrence_type = row
            .recurrence_type
            .as_deref()
            .map(RecurrenceType::from_str)
            .transpose()
            .map_err(|e| f.malformed(e))?
            .unwrap_or_default();
        let recurrence_end_date = row
            .recurrence_end_date
            .as_deref()
            .map(|raw| f.date("recurrence_end_date", raw))
            .transpose()?;

        Ok(SessionTemplate {
            id: f.uuid("id", &row.id)?,
            title: row.title.clone(),
            description: row.description.clone(),
            group_id: f.opt_uuid("group_id", row.group_id.as_deref())?,
            patient_id: f.opt_uuid("patient_id", row.patient_id.as_deref())?,
            location_id: f.opt_uuid("location_id", row.location_id.as_deref())?,
            start: f.timestamp("start_time", &row.start_time)?,
            end: f.timestamp("end_time", &row.end_time)?,
            staff_ids: row
                .staff_ids
                .iter()
                .map(|raw| f.uuid("staff_ids", raw))
                .collect::<Result<_, _>>()?,
            recurrence_type,
            recurrence_end_date,
        })
    }
}
