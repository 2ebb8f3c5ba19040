//! Tests for session series expansion.

use booking_engine::model::{RecurrenceType, SessionInstance, SessionTemplate};
use booking_engine::recurrence::{expand_recurrence, instance_id, ExpansionOptions};
use booking_engine::{BookingError, DstPolicy};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn template(start: &str, minutes: i64) -> SessionTemplate {
    let start: DateTime<Utc> = start.parse().unwrap();
    SessionTemplate {
        id: Uuid::from_u128(0x7e3),
        title: "U12 training".to_string(),
        description: Some("Passing drills".to_string()),
        group_id: Some(Uuid::from_u128(0x9)),
        patient_id: None,
        location_id: Some(Uuid::from_u128(0xa1)),
        start,
        end: start + Duration::minutes(minutes),
        staff_ids: vec![Uuid::from_u128(0x51), Uuid::from_u128(0x52)],
        recurrence_type: RecurrenceType::Weekly,
        recurrence_end_date: None,
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn utc_options() -> ExpansionOptions {
    ExpansionOptions::default()
}

fn dates(instances: &[SessionInstance]) -> Vec<NaiveDate> {
    instances.iter().map(|i| i.start.date_naive()).collect()
}

// ---------------------------------------------------------------------------
// Interval arithmetic
// ---------------------------------------------------------------------------

#[test]
fn weekly_series_excludes_template_and_includes_end_date() {
    let result = expand_recurrence(
        &template("2025-01-06T17:00:00Z", 90),
        RecurrenceType::Weekly,
        Some(date(2025, 1, 27)),
        &utc_options(),
    )
    .expect("should expand");

    assert_eq!(
        dates(&result),
        vec![date(2025, 1, 13), date(2025, 1, 20), date(2025, 1, 27)]
    );
    assert_eq!(
        result[0].start,
        Utc.with_ymd_and_hms(2025, 1, 13, 17, 0, 0).unwrap()
    );
}

#[test]
fn daily_series() {
    let result = expand_recurrence(
        &template("2025-01-06T09:00:00Z", 60),
        RecurrenceType::Daily,
        Some(date(2025, 1, 10)),
        &utc_options(),
    )
    .unwrap();

    assert_eq!(
        dates(&result),
        vec![date(2025, 1, 7), date(2025, 1, 8), date(2025, 1, 9), date(2025, 1, 10)]
    );
}

#[test]
fn biweekly_series() {
    let result = expand_recurrence(
        &template("2025-01-06T09:00:00Z", 60),
        RecurrenceType::Biweekly,
        Some(date(2025, 2, 16)),
        &utc_options(),
    )
    .unwrap();

    assert_eq!(dates(&result), vec![date(2025, 1, 20), date(2025, 2, 3)]);
}

#[test]
fn monthly_series_on_an_early_day() {
    let result = expand_recurrence(
        &template("2025-01-15T09:00:00Z", 30),
        RecurrenceType::Monthly,
        Some(date(2025, 4, 15)),
        &utc_options(),
    )
    .unwrap();

    assert_eq!(
        dates(&result),
        vec![date(2025, 2, 15), date(2025, 3, 15), date(2025, 4, 15)]
    );
}

#[test]
fn monthly_series_clamps_to_month_end_without_drifting() {
    let result = expand_recurrence(
        &template("2025-01-31T09:00:00Z", 30),
        RecurrenceType::Monthly,
        Some(date(2025, 5, 31)),
        &utc_options(),
    )
    .unwrap();

    assert_eq!(
        dates(&result),
        vec![
            date(2025, 2, 28),
            date(2025, 3, 31),
            date(2025, 4, 30),
            date(2025, 5, 31),
        ]
    );
}

#[test]
fn monthly_series_on_the_thirtieth_in_a_leap_year() {
    let result = expand_recurrence(
        &template("2024-01-30T09:00:00Z", 30),
        RecurrenceType::Monthly,
        Some(date(2024, 3, 31)),
        &utc_options(),
    )
    .unwrap();

    assert_eq!(dates(&result), vec![date(2024, 2, 29), date(2024, 3, 30)]);
}

// ---------------------------------------------------------------------------
// Instance contents
// ---------------------------------------------------------------------------

#[test]
fn instances_copy_template_fields_and_duration() {
    let t = template("2025-01-06T17:00:00Z", 90);
    let result = expand_recurrence(
        &t,
        RecurrenceType::Weekly,
        Some(date(2025, 2, 28)),
        &utc_options(),
    )
    .unwrap();

    assert_eq!(result.len(), 7);
    for (n, instance) in result.iter().enumerate() {
        assert_eq!(instance.end - instance.start, t.end - t.start);
        assert_eq!(instance.parent_session_id, t.id);
        assert_eq!(instance.occurrence, n as u32 + 1);
        assert_eq!(instance.title, t.title);
        assert_eq!(instance.description, t.description);
        assert_eq!(instance.group_id, t.group_id);
        assert_eq!(instance.location_id, t.location_id);
        assert_eq!(instance.staff_ids, t.staff_ids);
        assert_eq!(instance.recurrence_type, RecurrenceType::Weekly);
    }
}

#[test]
fn instances_are_chronological() {
    let result = expand_recurrence(
        &template("2025-01-06T09:00:00Z", 60),
        RecurrenceType::Daily,
        Some(date(2025, 3, 1)),
        &utc_options(),
    )
    .unwrap();

    assert!(result.windows(2).all(|w| w[0].start < w[1].start));
}

#[test]
fn instance_ids_are_stable_and_distinct() {
    let t = template("2025-01-06T09:00:00Z", 60);
    let run = || {
        expand_recurrence(&t, RecurrenceType::Daily, Some(date(2025, 1, 12)), &utc_options())
            .unwrap()
    };
    let first = run();
    let second = run();

    let ids: Vec<Uuid> = first.iter().map(|i| i.id).collect();
    assert_eq!(ids, second.iter().map(|i| i.id).collect::<Vec<_>>());
    assert_eq!(ids[0], instance_id(t.id, 1));

    let mut unique = ids.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), ids.len());
    assert!(!ids.contains(&t.id));
}

// ---------------------------------------------------------------------------
// Short-circuits and validation
// ---------------------------------------------------------------------------

#[test]
fn no_recurrence_yields_nothing() {
    let t = template("2025-01-06T09:00:00Z", 60);
    assert!(expand_recurrence(&t, RecurrenceType::None, None, &utc_options())
        .unwrap()
        .is_empty());
    assert!(
        expand_recurrence(&t, RecurrenceType::None, Some(date(2025, 12, 31)), &utc_options())
            .unwrap()
            .is_empty()
    );
}

#[test]
fn missing_end_date_is_rejected() {
    let result = expand_recurrence(
        &template("2025-01-06T09:00:00Z", 60),
        RecurrenceType::Monthly,
        None,
        &utc_options(),
    );
    match result {
        Err(BookingError::Validation(msg)) => assert!(msg.contains("end date"), "got: {msg}"),
        other => panic!("expected Validation, got {other:?}"),
    }
}

#[test]
fn end_date_before_template_is_rejected() {
    let result = expand_recurrence(
        &template("2025-01-06T09:00:00Z", 60),
        RecurrenceType::Weekly,
        Some(date(2025, 1, 5)),
        &utc_options(),
    );
    assert!(matches!(result, Err(BookingError::Validation(_))));
}

#[test]
fn end_date_on_template_day_yields_nothing() {
    let result = expand_recurrence(
        &template("2025-01-06T09:00:00Z", 60),
        RecurrenceType::Daily,
        Some(date(2025, 1, 6)),
        &utc_options(),
    )
    .unwrap();
    assert!(result.is_empty());
}

#[test]
fn template_ending_before_it_starts_is_rejected() {
    let result = expand_recurrence(
        &template("2025-01-06T09:00:00Z", 0),
        RecurrenceType::Daily,
        Some(date(2025, 1, 10)),
        &utc_options(),
    );
    assert!(matches!(result, Err(BookingError::Validation(_))));
}

#[test]
fn series_longer_than_the_limit_is_rejected() {
    let options = ExpansionOptions {
        max_instances: 10,
        ..ExpansionOptions::default()
    };
    let t = template("2025-01-06T09:00:00Z", 60);

    let exactly_ten = expand_recurrence(&t, RecurrenceType::Daily, Some(date(2025, 1, 16)), &options);
    assert_eq!(exactly_ten.unwrap().len(), 10);

    let eleven = expand_recurrence(&t, RecurrenceType::Daily, Some(date(2025, 1, 17)), &options);
    assert!(matches!(eleven, Err(BookingError::Validation(_))));
}

// ---------------------------------------------------------------------------
// Local time and DST
// ---------------------------------------------------------------------------

#[test]
fn weekly_series_keeps_local_time_across_dst() {
    // 09:00 EST = 14:00 UTC; after 2025-03-09, 09:00 EDT = 13:00 UTC.
    let options = ExpansionOptions {
        timezone: chrono_tz::America::New_York,
        ..ExpansionOptions::default()
    };
    let result = expand_recurrence(
        &template("2025-03-02T14:00:00Z", 60),
        RecurrenceType::Weekly,
        Some(date(2025, 3, 16)),
        &options,
    )
    .unwrap();

    assert_eq!(
        result.iter().map(|i| i.start).collect::<Vec<_>>(),
        vec![
            Utc.with_ymd_and_hms(2025, 3, 9, 13, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 16, 13, 0, 0).unwrap(),
        ]
    );
    assert!(result.iter().all(|i| i.end - i.start == Duration::minutes(60)));
}

#[test]
fn end_date_is_a_local_calendar_date() {
    // 23:30 in Berlin on Jan 6 is 22:30 UTC; the Jan 13 occurrence is still
    // on Jan 13 locally and must be included.
    let options = ExpansionOptions {
        timezone: chrono_tz::Europe::Berlin,
        ..ExpansionOptions::default()
    };
    let result = expand_recurrence(
        &template("2025-01-06T22:30:00Z", 30),
        RecurrenceType::Weekly,
        Some(date(2025, 1, 13)),
        &options,
    )
    .unwrap();

    assert_eq!(result.len(), 1);
    assert_eq!(result[0].start, Utc.with_ymd_and_hms(2025, 1, 13, 22, 30, 0).unwrap());
}

#[test]
fn skip_policy_drops_occurrences_in_the_gap() {
    // Daily at 02:30 local; 2025-03-09 02:30 does not exist in New York.
    let options = ExpansionOptions {
        timezone: chrono_tz::America::New_York,
        dst_policy: DstPolicy::Skip,
        ..ExpansionOptions::default()
    };
    let result = expand_recurrence(
        &template("2025-03-07T07:30:00Z", 30),
        RecurrenceType::Daily,
        Some(date(2025, 3, 10)),
        &options,
    )
    .unwrap();

    let local: Vec<NaiveDate> = result
        .iter()
        .map(|i| i.start.with_timezone(&chrono_tz::America::New_York).date_naive())
        .collect();
    assert_eq!(local, vec![date(2025, 3, 8), date(2025, 3, 10)]);
    // Occurrence numbers keep their position in the series.
    assert_eq!(result[1].occurrence, 3);
}

#[test]
fn default_options_use_utc() {
    assert_eq!(ExpansionOptions::default().timezone, Tz::UTC);
}
