//! SampleSource trait - Reconstruction Engine input interface
//!
//! Read-only sample queries the engine composes into a reconstruction.
//! Implemented by the persistent store and by in-memory sources in tests.

use crate::{ContractError, PositionSample, TelemetrySample};

/// Read-only access to one store's samples
///
/// All comparisons against a tolerance or window are strict (`|ts - t| < w`).
pub trait SampleSource {
    /// Largest position timestamp of a session, `None` when it has no positions
    fn max_position_timestamp(&self, session_key: &str) -> Result<Option<f64>, ContractError>;

    /// Position samples whose timestamp lies strictly within `tolerance` of `t`
    fn positions_near(
        &self,
        session_key: &str,
        t: f64,
        tolerance: f64,
    ) -> Result<Vec<PositionSample>, ContractError>;

    /// Latest position sample per driver with timestamp `<= t`
    fn latest_positions_at_or_before(
        &self,
        session_key: &str,
        t: f64,
    ) -> Result<Vec<PositionSample>, ContractError>;

    /// Telemetry sample of a driver closest to `t`, strictly within `window`
    fn telemetry_near(
        &self,
        session_key: &str,
        driver_number: u32,
        t: f64,
        window: f64,
    ) -> Result<Option<TelemetrySample>, ContractError>;
}
