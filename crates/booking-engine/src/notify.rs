//! Post-booking notifications.
//!
//! Delivery (e-mail, push) lives outside the engine. The service hands every
//! notifier a structured payload and only logs failures; a notifier can never
//! fail or stall a booking.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
#[error("Notification failed: {0}")]
pub struct NotifyError(pub String);

/// Payload describing what was just booked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    BookingCreated {
        booking_id: Uuid,
        staff_id: Uuid,
        appointment_type_id: Uuid,
        patient_id: Option<Uuid>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    SeriesCreated {
        template_id: Uuid,
        instance_count: usize,
        staff_ids: Vec<Uuid>,
        first_start: Option<DateTime<Utc>>,
        last_start: Option<DateTime<Utc>>,
    },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Emits each notification as a structured `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let payload =
            serde_json::to_string(notification).map_err(|e| NotifyError(e.to_string()))?;
        tracing::info!(target: "booking_engine::notify", %payload, "notification");
        Ok(())
    }
}

/// Deliver `notification`, logging and swallowing any failure or timeout.
pub(crate) async fn dispatch(notifier: &dyn Notifier, notification: &Notification, limit: Duration) {
    match tokio::time::timeout(limit, notifier.notify(notification)).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::warn!(error = %err, ?notification, "notifier failed"),
        Err(_) => tracing::warn!(?limit, ?notification, "notifier timed out"),
    }
}
