//! Error types for booking-engine operations.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the availability and recurrence operations.
#[derive(Error, Debug)]
pub enum BookingError {
    /// Malformed or missing input (bad date, missing series end date, ...).
    #[error("Validation error: {0}")]
    Validation(String),

    /// A referenced appointment type, staff member or template does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The requested time was claimed by another booking before it could be written.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The booking store failed; propagated unchanged, never retried here.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The store did not answer within the configured deadline.
    #[error("Store call timed out after {0:?}")]
    TimedOut(Duration),
}

impl BookingError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        BookingError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Errors raised at the store boundary.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A row could not be mapped into the domain model.
    #[error("Malformed {entity} record {id}: {reason}")]
    Malformed {
        entity: &'static str,
        id: String,
        reason: String,
    },

    /// The write would overlap an existing booking for the same staff member.
    #[error("Write conflict: {0}")]
    Conflict(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn malformed(entity: &'static str, id: impl ToString, reason: impl Into<String>) -> Self {
        StoreError::Malformed {
            entity,
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while loading [`crate::config::EngineConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config source error: {0}")]
    Source(#[from] config::ConfigError),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid config value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, BookingError>;
