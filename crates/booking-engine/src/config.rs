//! Engine configuration.
//!
//! Sources, lowest precedence first: built-in defaults, an optional TOML file,
//! then `BOOKING_*` environment variables (`BOOKING_TIMEZONE`,
//! `BOOKING_STORE_TIMEOUT_MS`, ...).

use std::path::Path;
use std::time::Duration;

use chrono_tz::Tz;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::availability::SlotPolicy;
use crate::dst::DstPolicy;
use crate::error::ConfigError;
use crate::recurrence::{ExpansionOptions, DEFAULT_MAX_INSTANCES};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// IANA timezone the practice's working hours are expressed in.
    pub timezone: String,
    pub dst_policy: DstPolicy,
    /// Deadline for each service operation, store reads and writes included.
    pub store_timeout_ms: u64,
    pub notify_timeout_ms: u64,
    pub max_series_instances: u16,
    pub clip_to_schedule_end: bool,
    /// How many days `next_available_slot` looks ahead, the start date included.
    pub search_horizon_days: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            dst_policy: DstPolicy::default(),
            store_timeout_ms: 5_000,
            notify_timeout_ms: 2_000,
            max_series_instances: DEFAULT_MAX_INSTANCES,
            clip_to_schedule_end: true,
            search_horizon_days: 30,
        }
    }
}

impl EngineConfig {
    /// Load defaults, then `path` (if given), then the environment.
    ///
    /// # Errors
    /// Returns an error if a source cannot be read or deserialized, or if a
    /// value fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix("BOOKING")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: EngineConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tz()?;
        if self.store_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "store_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.max_series_instances == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_series_instances",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.search_horizon_days == 0 {
            return Err(ConfigError::InvalidValue {
                key: "search_horizon_days",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse()
            .map_err(|_| ConfigError::InvalidTimezone(self.timezone.clone()))
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_millis(self.notify_timeout_ms)
    }

    pub fn slot_policy(&self) -> SlotPolicy {
        SlotPolicy {
            clip_to_schedule_end: self.clip_to_schedule_end,
            dst_policy: self.dst_policy,
        }
    }

    pub fn expansion_options(&self) -> Result<ExpansionOptions, ConfigError> {
        Ok(ExpansionOptions {
            timezone: self.tz()?,
            dst_policy: self.dst_policy,
            max_instances: self.max_series_instances,
        })
    }
}
