//! TelemetryProvider trait - Ingestion input interface
//!
//! Abstracts the upstream historical telemetry provider so the pipeline can be
//! driven by a live HTTP client or an in-process mock.

use crate::{ContractError, UpstreamSession};

/// One raw upstream record, kept untyped until normalization
pub type UpstreamRecord = serde_json::Map<String, serde_json::Value>;

/// Upstream provider trait
///
/// Every fetch is keyed by the opaque session key string.
#[trait_variant::make(TelemetryProvider: Send)]
pub trait LocalTelemetryProvider {
    /// Provider name (used for logging/metrics)
    fn name(&self) -> &str;

    /// List sessions for a year and country
    async fn sessions(
        &self,
        year: i32,
        country: &str,
    ) -> Result<Vec<UpstreamSession>, ContractError>;

    /// Fetch raw position records of a session
    async fn positions(&self, session_key: &str) -> Result<Vec<UpstreamRecord>, ContractError>;

    /// Fetch raw car telemetry records of a session
    async fn car_data(&self, session_key: &str) -> Result<Vec<UpstreamRecord>, ContractError>;

    /// Fetch raw lap records of a session
    async fn laps(&self, session_key: &str) -> Result<Vec<UpstreamRecord>, ContractError>;

    /// Release provider resources
    async fn close(&self) -> Result<(), ContractError>;
}
