//! Reconstruction policy shared by the engine and the config loader.

use serde::{Deserialize, Serialize};

/// Tolerance-expanding search policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructionConfig {
    /// Search tolerances in seconds, tried in ascending order
    pub tolerances_s: Vec<f64>,

    /// Minimum distinct drivers for a window to be accepted
    pub min_drivers: usize,

    /// A window is accepted only if some driver is at or above this position
    pub leader_max_position: u32,

    /// Queries later than `max_ts - margin` go straight to the fallback
    pub end_of_session_margin_s: f64,

    /// Telemetry join window in the nearest-match tier
    pub match_telemetry_window_s: f64,

    /// Telemetry join window in the fallback tier
    pub fallback_telemetry_window_s: f64,
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        Self {
            tolerances_s: vec![1.0, 10.0, 60.0, 300.0, 1800.0],
            min_drivers: 10,
            leader_max_position: 3,
            end_of_session_margin_s: 600.0,
            match_telemetry_window_s: 1.0,
            fallback_telemetry_window_s: 60.0,
        }
    }
}

impl ReconstructionConfig {
    /// Whether `t` falls in the end-of-session short-circuit zone
    pub fn near_session_end(&self, t: f64, max_ts: f64) -> bool {
        t > max_ts - self.end_of_session_margin_s
    }
}
