//! Tests for the store boundary: row mapping and the in-memory store.

use booking_engine::model::{BookingStatus, NewBooking, RecurrenceType, SessionInstance};
use booking_engine::store::records::{
    AppointmentRow, AppointmentTypeRow, SessionRow, StoreSnapshot, WorkingScheduleRow,
};
use booking_engine::store::{
    AppointmentTypeReader, BookingFilter, BookingReader, BookingWriter, InMemoryStore,
    ScheduleFilter, ScheduleReader, SessionStore, TimeRange,
};
use booking_engine::{AppointmentType, BookedInterval, SessionTemplate, StoreError, WorkingSchedule};
use chrono::{NaiveTime, TimeZone, Utc};
use uuid::Uuid;

// ── Fixtures ────────────────────────────────────────────────────────────────

const SCHEDULE_ID: &str = "00000000-0000-0000-0000-000000000101";
const DOCTOR_ID: &str = "00000000-0000-0000-0000-000000000051";
const LOCATION_ID: &str = "00000000-0000-0000-0000-0000000000a1";
const TYPE_ID: &str = "00000000-0000-0000-0000-000000000007";

fn schedule_row() -> WorkingScheduleRow {
    WorkingScheduleRow {
        id: SCHEDULE_ID.to_string(),
        doctor_id: DOCTOR_ID.to_string(),
        doctor_name: "Dr. Smith".to_string(),
        location_id: LOCATION_ID.to_string(),
        day_of_week: 1,
        start_time: "09:00:00".to_string(),
        end_time: "17:00".to_string(),
        break_start: Some("12:00".to_string()),
        break_end: Some("13:00".to_string()),
        is_active: true,
        slot_duration_minutes: Some(15),
    }
}

fn appointment_row(id: u128, start: &str, end: &str, status: &str) -> AppointmentRow {
    AppointmentRow {
        id: Uuid::from_u128(id).to_string(),
        doctor_id: DOCTOR_ID.to_string(),
        start_time: start.to_string(),
        end_time: end.to_string(),
        status: status.to_string(),
    }
}

fn session_row() -> SessionRow {
    SessionRow {
        id: Uuid::from_u128(0x7e3).to_string(),
        title: "Back rehab".to_string(),
        description: None,
        group_id: None,
        patient_id: Some(Uuid::from_u128(0x99).to_string()),
        location_id: Some(LOCATION_ID.to_string()),
        start_time: "2025-01-06T09:00:00+01:00".to_string(),
        end_time: "2025-01-06T09:45:00+01:00".to_string(),
        staff_ids: vec![DOCTOR_ID.to_string()],
        recurrence_type: Some("Weekly".to_string()),
        recurrence_end_date: Some("2025-02-03".to_string()),
    }
}

fn assert_malformed<T: std::fmt::Debug>(result: Result<T, StoreError>, entity: &str, needle: &str) {
    match result {
        Err(StoreError::Malformed {
            entity: e, reason, ..
        }) => {
            assert_eq!(e, entity);
            assert!(reason.contains(needle), "reason '{reason}' lacks '{needle}'");
        }
        other => panic!("expected Malformed {entity}, got {other:?}"),
    }
}

// ── Row mapping ─────────────────────────────────────────────────────────────

#[test]
fn schedule_row_maps_to_domain() {
    let schedule = WorkingSchedule::try_from(schedule_row()).unwrap();
    assert_eq!(schedule.staff_id, Uuid::parse_str(DOCTOR_ID).unwrap());
    assert_eq!(schedule.start_time, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
    assert_eq!(schedule.end_time, NaiveTime::from_hms_opt(17, 0, 0).unwrap());
    assert_eq!(
        schedule.break_window.unwrap().start,
        NaiveTime::from_hms_opt(12, 0, 0).unwrap()
    );
}

#[test]
fn schedule_row_with_half_a_break_is_rejected() {
    let mut row = schedule_row();
    row.break_end = None;
    assert_malformed(WorkingSchedule::try_from(row), "working_schedule", "together");
}

#[test]
fn schedule_row_with_inverted_hours_is_rejected() {
    let mut row = schedule_row();
    row.end_time = "08:00".to_string();
    assert_malformed(WorkingSchedule::try_from(row), "working_schedule", "not before");
}

#[test]
fn schedule_row_with_break_outside_hours_is_rejected() {
    let mut row = schedule_row();
    row.break_start = Some("16:30".to_string());
    row.break_end = Some("17:30".to_string());
    assert_malformed(WorkingSchedule::try_from(row), "working_schedule", "outside");
}

#[test]
fn schedule_row_with_other_granularity_is_rejected() {
    let mut row = schedule_row();
    row.slot_duration_minutes = Some(30);
    assert_malformed(WorkingSchedule::try_from(row), "working_schedule", "granularity");
}

#[test]
fn schedule_row_with_bad_weekday_or_time_is_rejected() {
    let mut row = schedule_row();
    row.day_of_week = 0;
    assert_malformed(WorkingSchedule::try_from(row), "working_schedule", "day_of_week");

    let mut row = schedule_row();
    row.start_time = "nine".to_string();
    assert_malformed(WorkingSchedule::try_from(row), "working_schedule", "start_time");
}

#[test]
fn appointment_type_needs_positive_duration() {
    let row = AppointmentTypeRow {
        id: TYPE_ID.to_string(),
        name: "Checkup".to_string(),
        duration_minutes: 0,
        is_active: true,
    };
    assert_malformed(AppointmentType::try_from(row), "appointment_type", "positive");
}

#[test]
fn appointment_row_parses_status_and_offsets() {
    let booking = BookedInterval::try_from(appointment_row(
        1,
        "2025-01-06T10:00:00+01:00",
        "2025-01-06T10:30:00+01:00",
        "Canceled",
    ))
    .unwrap();
    assert_eq!(booking.start, Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap());
    assert_eq!(booking.status, BookingStatus::Cancelled);
}

#[test]
fn appointment_row_with_unknown_status_is_rejected() {
    let row = appointment_row(1, "2025-01-06T10:00:00Z", "2025-01-06T10:30:00Z", "maybe");
    assert_malformed(BookedInterval::try_from(row), "appointment", "maybe");
}

#[test]
fn session_row_maps_recurrence_fields() {
    let template = SessionTemplate::try_from(session_row()).unwrap();
    assert_eq!(template.recurrence_type, RecurrenceType::Weekly);
    assert_eq!(
        template.recurrence_end_date,
        Some(chrono::NaiveDate::from_ymd_opt(2025, 2, 3).unwrap())
    );
    assert_eq!(template.duration(), chrono::Duration::minutes(45));
    assert_eq!(template.staff_ids.len(), 1);
}

#[test]
fn session_row_with_bad_staff_id_is_rejected() {
    let mut row = session_row();
    row.staff_ids.push("not-a-uuid".to_string());
    assert_malformed(SessionTemplate::try_from(row), "session", "staff_ids");
}

#[test]
fn snapshot_deserializes_missing_tables_as_empty() {
    let snapshot: StoreSnapshot = serde_json::from_str(r#"{"appointment_types": []}"#).unwrap();
    assert!(snapshot.working_schedules.is_empty());
    assert!(snapshot.sessions.is_empty());
}

#[test]
fn snapshot_row_missing_required_column_fails() {
    let raw = r#"{"working_schedules": [{"id": "x", "doctor_id": "y"}]}"#;
    assert!(serde_json::from_str::<StoreSnapshot>(raw).is_err());
}

// ── In-memory store ─────────────────────────────────────────────────────────

fn snapshot() -> StoreSnapshot {
    StoreSnapshot {
        working_schedules: vec![schedule_row()],
        appointment_types: vec![AppointmentTypeRow {
            id: TYPE_ID.to_string(),
            name: "Checkup".to_string(),
            duration_minutes: 30,
            is_active: true,
        }],
        appointments: vec![
            appointment_row(1, "2025-01-06T10:00:00Z", "2025-01-06T10:30:00Z", "confirmed"),
            appointment_row(2, "2025-01-06T11:00:00Z", "2025-01-06T11:30:00Z", "cancelled"),
            appointment_row(3, "2025-01-07T10:00:00Z", "2025-01-07T10:30:00Z", "scheduled"),
        ],
        sessions: vec![session_row()],
    }
}

fn jan6() -> TimeRange {
    TimeRange {
        start: Utc.with_ymd_and_hms(2025, 1, 6, 0, 0, 0).unwrap(),
        end: Utc.with_ymd_and_hms(2025, 1, 7, 0, 0, 0).unwrap(),
    }
}

#[tokio::test]
async fn snapshot_store_serves_reads() {
    let store = InMemoryStore::from_snapshot(snapshot()).unwrap();

    assert_eq!(
        store
            .working_schedules(1, &ScheduleFilter::default())
            .await
            .unwrap()
            .len(),
        1
    );
    assert!(store
        .working_schedules(2, &ScheduleFilter::default())
        .await
        .unwrap()
        .is_empty());

    let type_id = Uuid::parse_str(TYPE_ID).unwrap();
    assert_eq!(
        store.appointment_type(type_id).await.unwrap().unwrap().duration_minutes,
        30
    );
    assert!(store.appointment_type(Uuid::nil()).await.unwrap().is_none());

    let template = store.session_template(Uuid::from_u128(0x7e3)).await.unwrap();
    assert_eq!(template.unwrap().title, "Back rehab");
}

#[tokio::test]
async fn booked_intervals_exclude_cancelled_and_other_days() {
    let store = InMemoryStore::from_snapshot(snapshot()).unwrap();

    let active = store
        .booked_intervals(jan6(), &BookingFilter::default())
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, Uuid::from_u128(1));

    let all = store
        .booked_intervals(
            jan6(),
            &BookingFilter {
                include_cancelled: true,
                ..BookingFilter::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn schedule_filter_by_location() {
    let store = InMemoryStore::from_snapshot(snapshot()).unwrap();
    let elsewhere = ScheduleFilter {
        location_id: Some(Uuid::nil()),
        ..ScheduleFilter::default()
    };
    assert!(store.working_schedules(1, &elsewhere).await.unwrap().is_empty());
}

#[test]
fn snapshot_with_double_booking_is_rejected() {
    let mut snap = snapshot();
    snap.appointments.push(appointment_row(
        4,
        "2025-01-06T10:15:00Z",
        "2025-01-06T10:45:00Z",
        "confirmed",
    ));
    assert_malformed(InMemoryStore::from_snapshot(snap), "appointment", "overlaps");
}

#[tokio::test]
async fn insert_booking_rejects_overlap_atomically() {
    let store = InMemoryStore::from_snapshot(snapshot()).unwrap();
    let staff_id = Uuid::parse_str(DOCTOR_ID).unwrap();
    let new = |h: u32, m: u32| NewBooking {
        staff_id,
        appointment_type_id: Uuid::parse_str(TYPE_ID).unwrap(),
        patient_id: None,
        location_id: None,
        start: Utc.with_ymd_and_hms(2025, 1, 6, h, m, 0).unwrap(),
        end: Utc.with_ymd_and_hms(2025, 1, 6, h, m + 30, 0).unwrap(),
    };

    assert!(matches!(
        store.insert_booking(new(10, 15)).await,
        Err(StoreError::Conflict(_))
    ));
    // The cancelled 11:00 booking does not block.
    let stored = store.insert_booking(new(11, 0)).await.unwrap();
    assert_eq!(stored.status, BookingStatus::Scheduled);
    assert_eq!(store.bookings().await.len(), 4);
}

#[tokio::test]
async fn session_instances_link_and_delete() {
    let store = InMemoryStore::new();
    let staff = Uuid::from_u128(0x51);
    let instance = SessionInstance {
        id: Uuid::from_u128(0x1001),
        parent_session_id: Uuid::from_u128(0x7e3),
        occurrence: 1,
        title: "Back rehab".to_string(),
        description: None,
        group_id: None,
        patient_id: None,
        location_id: None,
        start: Utc.with_ymd_and_hms(2025, 1, 13, 8, 0, 0).unwrap(),
        end: Utc.with_ymd_and_hms(2025, 1, 13, 8, 45, 0).unwrap(),
        staff_ids: vec![staff],
        recurrence_type: RecurrenceType::Weekly,
    };

    store
        .create_session_instances(std::slice::from_ref(&instance))
        .await
        .unwrap();
    store
        .link_staff_to_instances(&[instance.id], &[staff])
        .await
        .unwrap();
    assert_eq!(store.staff_links().await, vec![(instance.id, staff)]);

    // Same id again is a conflict.
    assert!(matches!(
        store.create_session_instances(&[instance.clone()]).await,
        Err(StoreError::Conflict(_))
    ));

    store.delete_session_instances(&[instance.id]).await.unwrap();
    assert!(store.instances().await.is_empty());
    assert!(store.staff_links().await.is_empty());
}

#[tokio::test]
async fn linking_unknown_instance_fails() {
    let store = InMemoryStore::new();
    let result = store
        .link_staff_to_instances(&[Uuid::from_u128(1)], &[Uuid::from_u128(2)])
        .await;
    assert!(matches!(result, Err(StoreError::Unavailable(_))));
}

#[tokio::test]
async fn added_schedule_is_validated() {
    let store = InMemoryStore::new();
    let mut schedule = WorkingSchedule::try_from(schedule_row()).unwrap();
    schedule.start_time = NaiveTime::from_hms_opt(18, 0, 0).unwrap();
    assert!(store.add_schedule(schedule).await.is_err());
}
