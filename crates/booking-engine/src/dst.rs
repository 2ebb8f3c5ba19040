//! DST transition policies for local wall-clock times.
//!
//! Working hours and recurring sessions are expressed in the practice's local
//! time. Converting them to instants needs a rule for the two DST edge cases:
//! the spring-forward gap (the local time does not exist) and the fall-back
//! overlap (the local time exists twice). Overlaps always resolve to the
//! earlier instant; gaps are resolved by the policy.

use chrono::{DateTime, Duration, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Longest DST gap we search across. Real-world gaps are at most one day.
const MAX_GAP_MINUTES: i64 = 24 * 60;

/// Policy for handling local times that fall during DST transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DstPolicy {
    /// Skip instances that fall in the DST gap (e.g., 2:30 AM during spring forward)
    Skip,
    /// Shift to the first valid local time after the gap
    ShiftForward,
    /// Keep the elapsed wall-clock distance: a gap time is read with the offset
    /// in force before the transition (2:30 PST becomes 3:30 PDT)
    #[default]
    WallClock,
}

impl DstPolicy {
    /// Resolve a local wall-clock time in `tz` to a UTC instant.
    ///
    /// Returns `None` only for [`DstPolicy::Skip`] when `local` falls in a gap.
    pub fn resolve(self, tz: Tz, local: NaiveDateTime) -> Option<DateTime<Utc>> {
        if let Some(dt) = tz.from_local_datetime(&local).earliest() {
            return Some(dt.with_timezone(&Utc));
        }

        match self {
            DstPolicy::Skip => None,
            DstPolicy::ShiftForward => (1..=MAX_GAP_MINUTES)
                .map(|m| local + Duration::minutes(m))
                .find_map(|candidate| tz.from_local_datetime(&candidate).earliest())
                .map(|dt| dt.with_timezone(&Utc)),
            DstPolicy::WallClock => {
                let offset = (1..=MAX_GAP_MINUTES / 60)
                    .map(|h| local - Duration::hours(h))
                    .find_map(|probe| tz.from_local_datetime(&probe).earliest())?
                    .offset()
                    .fix();
                let utc = local - Duration::seconds(i64::from(offset.local_minus_utc()));
                Some(Utc.from_utc_datetime(&utc))
            }
        }
    }
}
