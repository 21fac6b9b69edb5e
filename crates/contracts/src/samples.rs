//! Persisted telemetry rows - Ingestion output, Store input
//!
//! Normalized records after timestamp conversion.

use serde::{Deserialize, Serialize};

/// Race-position sample
///
/// One sample per driver per provider tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    /// Car number
    pub driver_number: u32,

    /// Epoch seconds (0.0 = unparseable upstream date)
    pub timestamp: f64,

    /// Running race position (1 = leader)
    pub position: u32,
}

/// Car telemetry sample
///
/// Sampled at a higher rate than positions and never aligned with them.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Car number
    pub driver_number: u32,

    /// Epoch seconds (0.0 = unparseable upstream date)
    pub timestamp: f64,

    /// Speed (km/h)
    pub speed: Option<f64>,

    /// Gear (0 = neutral)
    pub gear: Option<i64>,

    /// Throttle (0-100)
    pub throttle: Option<f64>,

    /// Brake (0 or 100 upstream)
    pub brake: Option<f64>,

    /// Engine RPM
    pub rpm: Option<i64>,

    /// DRS flag as reported upstream
    pub drs: Option<i64>,
}

/// One lap of one driver
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LapRecord {
    pub driver_number: u32,
    pub lap_number: u32,
    /// Lap duration (seconds)
    pub lap_duration: Option<f64>,
    pub sector_1_duration: Option<f64>,
    pub sector_2_duration: Option<f64>,
    pub sector_3_duration: Option<f64>,
    /// Pit entry (epoch seconds)
    pub pit_in_time: Option<f64>,
    /// Pit exit (epoch seconds)
    pub pit_out_time: Option<f64>,
}

impl LapRecord {
    /// Lap involved a pit stop (either pit timestamp present)
    pub fn has_pit_stop(&self) -> bool {
        self.pit_in_time.is_some() || self.pit_out_time.is_some()
    }
}

/// Normalized rows for one session, ready for a bulk store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryBatch {
    pub positions: Vec<PositionSample>,
    pub telemetry: Vec<TelemetrySample>,
    pub laps: Vec<LapRecord>,
}

impl TelemetryBatch {
    /// Total row count across the three tables
    pub fn row_count(&self) -> usize {
        self.positions.len() + self.telemetry.len() + self.laps.len()
    }

    /// Highest lap number in the batch (0 if no laps)
    pub fn total_laps(&self) -> u32 {
        self.laps.iter().map(|l| l.lap_number).max().unwrap_or(0)
    }

    /// Earliest valid position timestamp (sentinels excluded)
    pub fn first_position_timestamp(&self) -> Option<f64> {
        self.positions
            .iter()
            .map(|p| p.timestamp)
            .filter(|t| *t > 0.0)
            .fold(None, |acc: Option<f64>, t| Some(acc.map_or(t, |a| a.min(t))))
    }
}
