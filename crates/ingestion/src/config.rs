//! Ingestion configuration and metrics

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use contracts::UpstreamConfig;

/// Pipeline settings
#[derive(Debug, Clone)]
pub struct IngestionConfig {
    /// Bound on the concurrent fetch of one session (and on session lookups)
    pub fetch_timeout: Duration,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(120),
        }
    }
}

impl From<&UpstreamConfig> for IngestionConfig {
    fn from(upstream: &UpstreamConfig) -> Self {
        Self {
            fetch_timeout: Duration::from_secs(upstream.fetch_timeout_secs),
        }
    }
}

/// Ingestion metrics
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Sessions written
    pub sessions_ingested: AtomicU64,

    /// Calls that found the session already present
    pub sessions_skipped: AtomicU64,

    /// Failed ingests
    pub failures: AtomicU64,

    /// Telemetry fetches that failed and were replaced by an empty set
    pub telemetry_failures: AtomicU64,

    /// Malformed upstream records skipped
    pub records_skipped: AtomicU64,

    /// Timestamps replaced by the 0.0 sentinel
    pub sentinel_timestamps: AtomicU64,
}

impl IngestionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_ingested(&self) {
        self.sessions_ingested.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.sessions_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_telemetry_failure(&self) {
        self.telemetry_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_normalization(&self, skipped: usize, sentinels: usize) {
        self.records_skipped
            .fetch_add(skipped as u64, Ordering::Relaxed);
        self.sentinel_timestamps
            .fetch_add(sentinels as u64, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sessions_ingested: self.sessions_ingested.load(Ordering::Relaxed),
            sessions_skipped: self.sessions_skipped.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            telemetry_failures: self.telemetry_failures.load(Ordering::Relaxed),
            records_skipped: self.records_skipped.load(Ordering::Relaxed),
            sentinel_timestamps: self.sentinel_timestamps.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub sessions_ingested: u64,
    pub sessions_skipped: u64,
    pub failures: u64,
    pub telemetry_failures: u64,
    pub records_skipped: u64,
    pub sentinel_timestamps: u64,
}
