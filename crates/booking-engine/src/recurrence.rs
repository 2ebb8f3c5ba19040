//! Session series expansion -- turns a recurring template into concrete instances.
//!
//! Occurrences are generated in the practice's local wall-clock time by the
//! `rrule` crate (RFC 5545), anchored to the template's start, then resolved to
//! UTC with the configured DST policy. Anchoring means a monthly series started
//! on the 31st lands on the last day of shorter months and returns to the 31st
//! afterwards, instead of drifting.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use rrule::RRuleSet;
use uuid::Uuid;

use crate::dst::DstPolicy;
use crate::error::{BookingError, Result};
use crate::model::{RecurrenceType, SessionInstance, SessionTemplate};

/// Upper bound on generated instances when no other limit is configured.
pub const DEFAULT_MAX_INSTANCES: u16 = 500;

/// Settings that shape an expansion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpansionOptions {
    pub timezone: Tz,
    pub dst_policy: DstPolicy,
    /// A series needing more instances than this is rejected, never truncated.
    pub max_instances: u16,
}

impl Default for ExpansionOptions {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            dst_policy: DstPolicy::default(),
            max_instances: DEFAULT_MAX_INSTANCES,
        }
    }
}

/// Expand `template` into the instances that follow it, up to `series_end`.
///
/// The template's own occurrence is not returned. Every instance keeps the
/// template's duration, linkage and staff set, and points back at it through
/// `parent_session_id`. Instance ids are derived from the template id and the
/// occurrence number, so expanding the same template twice yields the same ids.
///
/// # Arguments
/// - `template` -- The persisted first occurrence.
/// - `recurrence` -- `None` short-circuits to an empty list.
/// - `series_end` -- Inclusive local cutoff date; required for any other recurrence.
/// - `options` -- Timezone, DST policy and series length limit.
///
/// # Errors
/// Returns `BookingError::Validation` when the end date is missing or precedes
/// the template, when the template ends before it starts, or when the series
/// exceeds `options.max_instances`.
pub fn expand_recurrence(
    template: &SessionTemplate,
    recurrence: RecurrenceType,
    series_end: Option<NaiveDate>,
    options: &ExpansionOptions,
) -> Result<Vec<SessionInstance>> {
    if !recurrence.is_recurring() {
        return Ok(Vec::new());
    }

    let series_end = series_end.ok_or_else(|| {
        BookingError::Validation("recurring sessions require an end date".to_string())
    })?;

    let duration = template.duration();
    if duration <= chrono::Duration::zero() {
        return Err(BookingError::Validation(format!(
            "session '{}' ends before it starts",
            template.title
        )));
    }

    let local_start = template.start.with_timezone(&options.timezone).naive_local();
    if series_end < local_start.date() {
        return Err(BookingError::Validation(format!(
            "series end date {} is before the first session on {}",
            series_end,
            local_start.date()
        )));
    }

    let occurrences = local_occurrences(recurrence, local_start, series_end, options.max_instances)?;

    let instances = occurrences
        .into_iter()
        .zip(1u32..)
        .filter_map(|(local, occurrence)| {
            let start = options.dst_policy.resolve(options.timezone, local)?;
            Some(instance_at(template, recurrence, occurrence, start))
        })
        .collect();

    Ok(instances)
}

/// Local start times after `local_start`, up to and including `series_end`.
fn local_occurrences(
    recurrence: RecurrenceType,
    local_start: NaiveDateTime,
    series_end: NaiveDate,
    max_instances: u16,
) -> Result<Vec<NaiveDateTime>> {
    let rule = rule_body(recurrence, local_start.day())
        .ok_or_else(|| BookingError::Validation(format!("'{recurrence}' does not repeat")))?;

    // Local wall-clock times are expanded in UTC so no DST shift leaks in;
    // the caller resolves them in the real timezone afterwards.
    let dtstart = local_start.format("%Y%m%dT%H%M%S");
    let until = series_end.format("%Y%m%dT235959Z");
    let rrule_text = format!("DTSTART;TZID=UTC:{dtstart}\nRRULE:{rule};UNTIL={until}");

    let rrule_set: RRuleSet = rrule_text
        .parse()
        .map_err(|e| BookingError::Validation(format!("invalid recurrence rule: {e}")))?;

    // One for the template itself, one to detect an over-long series.
    let limit = max_instances.saturating_add(2);
    let dates: Vec<NaiveDateTime> = rrule_set
        .all(limit)
        .dates
        .into_iter()
        .map(|dt| dt.with_timezone(&Utc).naive_utc())
        .filter(|dt| *dt > local_start)
        .collect();

    if dates.len() > usize::from(max_instances) {
        return Err(BookingError::Validation(format!(
            "series until {series_end} exceeds the limit of {max_instances} sessions"
        )));
    }

    Ok(dates)
}

/// RRULE body for `recurrence`. Monthly rules anchored after the 28th select
/// the anchor day or, when the month is shorter, its last day.
fn rule_body(recurrence: RecurrenceType, anchor_day: u32) -> Option<String> {
    let base = recurrence.to_rrule()?;
    if recurrence == RecurrenceType::Monthly && anchor_day > 28 {
        return Some(format!("{base};BYMONTHDAY={anchor_day},-1;BYSETPOS=1"));
    }
    Some(base.to_string())
}

fn instance_at(
    template: &SessionTemplate,
    recurrence: RecurrenceType,
    occurrence: u32,
    start: DateTime<Utc>,
) -> SessionInstance {
    SessionInstance {
        id: instance_id(template.id, occurrence),
        parent_session_id: template.id,
        occurrence,
        title: template.title.clone(),
        description: template.description.clone(),
        group_id: template.group_id,
        patient_id: template.patient_id,
        location_id: template.location_id,
        start,
        end: start + template.duration(),
        staff_ids: template.staff_ids.clone(),
        recurrence_type: recurrence,
    }
}

/// Stable id for the `occurrence`-th instance of the series rooted at `parent`.
pub fn instance_id(parent: Uuid, occurrence: u32) -> Uuid {
    Uuid::new_v5(&parent, format!("occurrence:{occurrence}").as_bytes())
}
