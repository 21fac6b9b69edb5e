//! ReplayState / Timeline - Reconstruction Engine output
//!
//! Derived entities, built fresh per query and owned by the caller.

use serde::{Deserialize, Serialize};

use crate::{LapRecord, PositionSample, TelemetrySample};

/// Reconstructed state of one car at a query timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarState {
    /// Car number
    pub driver_number: u32,

    /// Running race position, doubles as the on-screen ordering coordinate
    pub position: u32,

    /// Speed (km/h), 0.0 when no telemetry matched
    pub speed: f64,

    /// Gear, 1 when no telemetry matched
    pub gear: i64,

    /// Throttle (0-100), 0.0 when no telemetry matched
    pub throttle: f64,

    /// Brake pressed
    pub brake: bool,

    /// Timestamp of the contributing position sample
    pub timestamp: f64,
}

impl CarState {
    /// Build from a matched position sample and optional telemetry.
    ///
    /// Missing telemetry fields normalize to neutral values instead of failing.
    pub fn from_samples(position: &PositionSample, telemetry: Option<&TelemetrySample>) -> Self {
        Self {
            driver_number: position.driver_number,
            position: position.position,
            speed: telemetry.and_then(|t| t.speed).unwrap_or(0.0),
            gear: telemetry.and_then(|t| t.gear).unwrap_or(1),
            throttle: telemetry.and_then(|t| t.throttle).unwrap_or(0.0),
            brake: telemetry
                .and_then(|t| t.brake)
                .map(|b| b > 0.0)
                .unwrap_or(false),
            timestamp: position.timestamp,
        }
    }
}

/// Which reconstruction tier produced a replay state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReconstructionTier {
    /// Nearest-match search accepted at this tolerance (seconds)
    Window { tolerance: f64 },
    /// Last known position at or before the query timestamp
    Fallback,
}

/// State of every resolvable car at a timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayState {
    /// Query timestamp (epoch seconds)
    pub timestamp: f64,

    /// One entry per resolvable driver
    pub cars: Vec<CarState>,

    /// Tier that produced `cars`
    pub tier: ReconstructionTier,
}

/// One driver's lap in a timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub lap: u32,
    pub driver_number: u32,
    pub sector1_time: Option<f64>,
    pub sector2_time: Option<f64>,
    pub sector3_time: Option<f64>,
    pub lap_time: Option<f64>,
    pub pit_stop: bool,
}

impl From<&LapRecord> for TimelineEntry {
    fn from(lap: &LapRecord) -> Self {
        Self {
            lap: lap.lap_number,
            driver_number: lap.driver_number,
            sector1_time: lap.sector_1_duration,
            sector2_time: lap.sector_2_duration,
            sector3_time: lap.sector_3_duration,
            lap_time: lap.lap_duration,
            pit_stop: lap.has_pit_stop(),
        }
    }
}

/// Lap-level timeline of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub session_key: String,
    pub total_laps: u32,
    /// Ordered by lap, then driver number
    pub entries: Vec<TimelineEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn car_state_defaults_without_telemetry() {
        let position = PositionSample {
            driver_number: 44,
            timestamp: 99.9,
            position: 3,
        };
        let car = CarState::from_samples(&position, None);
        assert_eq!(car.speed, 0.0);
        assert_eq!(car.gear, 1);
        assert_eq!(car.throttle, 0.0);
        assert!(!car.brake);
        assert_eq!(car.timestamp, 99.9);
    }

    #[test]
    fn car_state_partial_telemetry() {
        let position = PositionSample {
            driver_number: 1,
            timestamp: 10.0,
            position: 1,
        };
        let telemetry = TelemetrySample {
            driver_number: 1,
            timestamp: 10.3,
            speed: Some(301.0),
            brake: Some(100.0),
            ..Default::default()
        };
        let car = CarState::from_samples(&position, Some(&telemetry));
        assert_eq!(car.speed, 301.0);
        assert_eq!(car.gear, 1);
        assert!(car.brake);
    }

    #[test]
    fn tier_serializes_tagged() {
        let json = serde_json::to_string(&ReconstructionTier::Window { tolerance: 10.0 }).unwrap();
        assert_eq!(json, r#"{"kind":"window","tolerance":10.0}"#);
        let json = serde_json::to_string(&ReconstructionTier::Fallback).unwrap();
        assert_eq!(json, r#"{"kind":"fallback"}"#);
    }
}
