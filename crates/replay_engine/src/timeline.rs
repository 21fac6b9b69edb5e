//! Timeline assembly

use contracts::{Timeline, TimelineEntry};
use telemetry_store::TimelineRows;

/// Build a timeline from stored rows, keeping their lap/driver order
pub fn build_timeline(rows: TimelineRows) -> Timeline {
    Timeline {
        session_key: rows.session.session_key,
        total_laps: rows.total_laps,
        entries: rows.laps.iter().map(TimelineEntry::from).collect(),
    }
}
