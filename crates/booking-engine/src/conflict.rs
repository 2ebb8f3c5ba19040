//! Overlap detection between booked intervals.
//!
//! Intervals are half-open. Adjacent bookings (one ends exactly when another
//! starts) are NOT conflicts.

use chrono::{DateTime, Utc};

use crate::model::BookedInterval;

/// Two half-open intervals overlap iff `a.start < b.end && a.end > b.start`.
pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && a_end > b_start
}

impl BookedInterval {
    /// Whether this booking occupies any part of `[start, end)`.
    ///
    /// Cancelled bookings never occupy time.
    pub fn blocks(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.status.blocks_time() && overlaps(start, end, self.start, self.end)
    }
}

/// A detected double booking of one staff member.
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict {
    pub booking_a: BookedInterval,
    pub booking_b: BookedInterval,
    pub overlap_minutes: i64,
}

/// Find all pairs of time-blocking bookings that overlap for the same staff member.
///
/// Each pair is reported once, in input order.
pub fn find_conflicts(bookings: &[BookedInterval]) -> Vec<Conflict> {
    let mut conflicts = Vec::new();

    for (i, a) in bookings.iter().enumerate() {
        for b in &bookings[i + 1..] {
            if a.staff_id != b.staff_id || !a.status.blocks_time() || !b.blocks(a.start, a.end) {
                continue;
            }
            let overlap_start = a.start.max(b.start);
            let overlap_end = a.end.min(b.end);
            conflicts.push(Conflict {
                booking_a: a.clone(),
                booking_b: b.clone(),
                overlap_minutes: (overlap_end - overlap_start).num_minutes(),
            });
        }
    }

    conflicts
}
