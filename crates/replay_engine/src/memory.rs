//! In-memory sample source
//!
//! Keeps samples per session in insertion order, mirroring storage order of
//! the persistent store. Used for fixtures and diagnostics.

use std::cmp::Ordering;
use std::collections::HashMap;

use contracts::{ContractError, PositionSample, SampleSource, TelemetryBatch, TelemetrySample};

use crate::nearest::latest_per_driver;

#[derive(Debug, Default, Clone)]
struct SessionSamples {
    positions: Vec<PositionSample>,
    telemetry: Vec<TelemetrySample>,
}

/// Sample source backed by plain vectors
#[derive(Debug, Default, Clone)]
pub struct MemorySampleSource {
    sessions: HashMap<String, SessionSamples>,
}

impl MemorySampleSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append samples of a session (laps are ignored)
    pub fn push_batch(&mut self, session_key: &str, batch: TelemetryBatch) {
        let session = self.sessions.entry(session_key.to_string()).or_default();
        session.positions.extend(batch.positions);
        session.telemetry.extend(batch.telemetry);
    }

    pub fn push_position(&mut self, session_key: &str, sample: PositionSample) {
        self.sessions
            .entry(session_key.to_string())
            .or_default()
            .positions
            .push(sample);
    }

    pub fn push_telemetry(&mut self, session_key: &str, sample: TelemetrySample) {
        self.sessions
            .entry(session_key.to_string())
            .or_default()
            .telemetry
            .push(sample);
    }

    fn positions(&self, session_key: &str) -> &[PositionSample] {
        self.sessions
            .get(session_key)
            .map(|s| s.positions.as_slice())
            .unwrap_or(&[])
    }
}

impl SampleSource for MemorySampleSource {
    fn max_position_timestamp(&self, session_key: &str) -> Result<Option<f64>, ContractError> {
        Ok(self
            .positions(session_key)
            .iter()
            .map(|p| p.timestamp)
            .max_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal)))
    }

    fn positions_near(
        &self,
        session_key: &str,
        t: f64,
        tolerance: f64,
    ) -> Result<Vec<PositionSample>, ContractError> {
        Ok(self
            .positions(session_key)
            .iter()
            .filter(|p| (p.timestamp - t).abs() < tolerance)
            .copied()
            .collect())
    }

    fn latest_positions_at_or_before(
        &self,
        session_key: &str,
        t: f64,
    ) -> Result<Vec<PositionSample>, ContractError> {
        Ok(latest_per_driver(self.positions(session_key), t))
    }

    fn telemetry_near(
        &self,
        session_key: &str,
        driver_number: u32,
        t: f64,
        window: f64,
    ) -> Result<Option<TelemetrySample>, ContractError> {
        let Some(session) = self.sessions.get(session_key) else {
            return Ok(None);
        };
        // min_by keeps the first of equally close samples
        Ok(session
            .telemetry
            .iter()
            .filter(|s| s.driver_number == driver_number && (s.timestamp - t).abs() < window)
            .min_by(|a, b| {
                let da = (a.timestamp - t).abs();
                let db = (b.timestamp - t).abs();
                da.partial_cmp(&db).unwrap_or(Ordering::Equal)
            })
            .copied())
    }
}
