//! Domain model shared by the availability calculator and the recurrence expander.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Step between candidate appointment start times.
pub const SLOT_GRANULARITY_MINUTES: i64 = 15;

/// ISO day of week for `date`: Monday = 1 … Sunday = 7.
pub fn iso_day_of_week(date: NaiveDate) -> u8 {
    date.weekday().number_from_monday() as u8
}

/// A break inside a working day. Half-open: `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// A staff member's recurring weekly availability at one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingSchedule {
    pub id: Uuid,
    pub staff_id: Uuid,
    pub staff_name: String,
    pub location_id: Uuid,
    /// ISO day of week, Monday = 1.
    pub day_of_week: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub break_window: Option<BreakWindow>,
    pub is_active: bool,
}

impl WorkingSchedule {
    /// Check the schedule invariants, returning the first violation.
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=7).contains(&self.day_of_week) {
            return Err(format!("day_of_week {} is outside 1..=7", self.day_of_week));
        }
        if self.start_time >= self.end_time {
            return Err(format!(
                "start_time {} is not before end_time {}",
                self.start_time, self.end_time
            ));
        }
        if let Some(br) = self.break_window {
            if br.start >= br.end {
                return Err(format!("break_start {} is not before break_end {}", br.start, br.end));
            }
            if br.start < self.start_time || br.end > self.end_time {
                return Err(format!(
                    "break {}-{} lies outside working hours {}-{}",
                    br.start, br.end, self.start_time, self.end_time
                ));
            }
        }
        Ok(())
    }
}

/// A bookable service; its duration sets the length of every slot offered for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentType {
    pub id: Uuid,
    pub name: String,
    pub duration_minutes: u32,
    pub is_active: bool,
}

impl AppointmentType {
    /// Length of one appointment of this type.
    pub fn duration(&self) -> Duration {
        Duration::minutes(i64::from(self.duration_minutes))
    }
}

/// Lifecycle state of a stored appointment or session booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl BookingStatus {
    /// Cancelled bookings free their time; every other state occupies it.
    pub fn blocks_time(self) -> bool {
        !matches!(self, BookingStatus::Cancelled)
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scheduled" | "pending" => Ok(BookingStatus::Scheduled),
            "confirmed" | "approved" => Ok(BookingStatus::Confirmed),
            "completed" => Ok(BookingStatus::Completed),
            "cancelled" | "canceled" => Ok(BookingStatus::Cancelled),
            "no_show" | "no-show" => Ok(BookingStatus::NoShow),
            other => Err(format!("unknown booking status '{other}'")),
        }
    }
}

/// An existing appointment or session occupying one staff member's time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookedInterval {
    pub id: Uuid,
    pub staff_id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: BookingStatus,
}

/// A candidate appointment start for one staff member. Recomputed on every query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub available: bool,
    pub staff_id: Uuid,
    pub staff_name: String,
    pub location_id: Uuid,
    pub appointment_type_id: Uuid,
}

impl TimeSlot {
    /// Time of day as `HH:MM`.
    pub fn label(&self) -> String {
        self.time.format(hhmm::FORMAT).to_string()
    }
}

/// Availability query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRequest {
    pub date: NaiveDate,
    pub appointment_type_id: Uuid,
    #[serde(default)]
    pub doctor_id: Option<Uuid>,
    #[serde(default)]
    pub location_id: Option<Uuid>,
}

/// Request to book a single appointment at an exact start time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub appointment_type_id: Uuid,
    pub staff_id: Uuid,
    pub start: DateTime<Utc>,
    #[serde(default)]
    pub patient_id: Option<Uuid>,
    #[serde(default)]
    pub location_id: Option<Uuid>,
}

/// A booking handed to the store for an atomic overlap-checked insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBooking {
    pub staff_id: Uuid,
    pub appointment_type_id: Uuid,
    pub patient_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// How often a session series repeats. `None` marks a one-off session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceType {
    #[default]
    None,
    Daily,
    Weekly,
    Biweekly,
    Monthly,
}

impl RecurrenceType {
    /// Whether this type produces instances after the template.
    pub fn is_recurring(self) -> bool {
        !matches!(self, RecurrenceType::None)
    }

    /// The RFC 5545 rule body for this recurrence, without DTSTART or UNTIL.
    pub fn to_rrule(self) -> Option<&'static str> {
        match self {
            RecurrenceType::None => None,
            RecurrenceType::Daily => Some("FREQ=DAILY"),
            RecurrenceType::Weekly => Some("FREQ=WEEKLY"),
            RecurrenceType::Biweekly => Some("FREQ=WEEKLY;INTERVAL=2"),
            RecurrenceType::Monthly => Some("FREQ=MONTHLY"),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            RecurrenceType::None => "none",
            RecurrenceType::Daily => "daily",
            RecurrenceType::Weekly => "weekly",
            RecurrenceType::Biweekly => "biweekly",
            RecurrenceType::Monthly => "monthly",
        }
    }
}

impl fmt::Display for RecurrenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecurrenceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(RecurrenceType::None),
            "daily" => Ok(RecurrenceType::Daily),
            "weekly" => Ok(RecurrenceType::Weekly),
            "biweekly" => Ok(RecurrenceType::Biweekly),
            "monthly" => Ok(RecurrenceType::Monthly),
            other => Err(format!(
                "unknown recurrence type '{other}' (expected none, daily, weekly, biweekly or monthly)"
            )),
        }
    }
}

/// The first, persisted occurrence of a (possibly) repeating session series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionTemplate {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub group_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub staff_ids: Vec<Uuid>,
    pub recurrence_type: RecurrenceType,
    /// Inclusive cutoff date, in the practice's local calendar.
    pub recurrence_end_date: Option<NaiveDate>,
}

impl SessionTemplate {
    /// Length copied onto every generated instance.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// A concrete occurrence generated from a [`SessionTemplate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInstance {
    pub id: Uuid,
    pub parent_session_id: Uuid,
    /// 1-based position after the template (the template itself is occurrence 0).
    pub occurrence: u32,
    pub title: String,
    pub description: Option<String>,
    pub group_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub staff_ids: Vec<Uuid>,
    pub recurrence_type: RecurrenceType,
}

/// `HH:MM` serde representation for wall-clock times.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%H:%M";

    /// Parse `HH:MM` or `HH:MM:SS`.
    pub fn parse(s: &str) -> Result<NaiveTime, chrono::ParseError> {
        NaiveTime::parse_from_str(s, FORMAT).or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
    }

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&time.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(de::Error::custom)
    }
}
