//! Replay 指标收集模块
//!
//! Records reconstruction and ingestion metrics through the `metrics` facade
//! and aggregates reconstruction results in memory for run summaries.

use std::collections::BTreeMap;

use contracts::{ReconstructionTier, ReplayState};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

/// Record one reconstruction query
///
/// `state` is `None` when the session had no position data.
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_reconstruction;
///
/// let state = engine.reconstruct(&source, key, t)?;
/// record_reconstruction(state.as_ref(), started.elapsed().as_secs_f64() * 1000.0);
/// ```
pub fn record_reconstruction(state: Option<&ReplayState>, latency_ms: f64) {
    histogram!("replayer_reconstruction_latency_ms").record(latency_ms);

    let Some(state) = state else {
        counter!("replayer_reconstructions_total", "tier" => "not_found").increment(1);
        return;
    };

    match state.tier {
        ReconstructionTier::Window { tolerance } => {
            counter!("replayer_reconstructions_total", "tier" => "window").increment(1);
            histogram!("replayer_reconstruction_tolerance_s").record(tolerance);
        }
        ReconstructionTier::Fallback => {
            counter!("replayer_reconstructions_total", "tier" => "fallback").increment(1);
        }
    }
    histogram!("replayer_reconstruction_cars").record(state.cars.len() as f64);
}

/// Record a finished ingest
pub fn record_ingest(session_key: &str, rows: usize, duration_ms: f64) {
    counter!("replayer_ingests_total", "status" => "ingested").increment(1);
    counter!("replayer_ingested_rows_total").increment(rows as u64);
    histogram!("replayer_ingest_duration_ms").record(duration_ms);
    gauge!("replayer_last_ingest_rows", "session_key" => session_key.to_string())
        .set(rows as f64);
}

/// Record an ingest that found the session already present
pub fn record_ingest_skipped() {
    counter!("replayer_ingests_total", "status" => "already_present").increment(1);
}

/// Record a failed ingest
pub fn record_ingest_failed(reason: &'static str) {
    counter!("replayer_ingests_total", "status" => "failed", "reason" => reason).increment(1);
}

/// Record an upstream request outcome
pub fn record_upstream_request(endpoint: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "replayer_upstream_requests_total",
        "endpoint" => endpoint.to_string(),
        "status" => status
    )
    .increment(1);
}

/// Record upstream records replaced by the timestamp sentinel
pub fn record_sentinel_timestamps(kind: &'static str, count: usize) {
    if count > 0 {
        counter!("replayer_sentinel_timestamps_total", "kind" => kind).increment(count as u64);
    }
}

/// Record upstream records skipped as malformed
pub fn record_skipped_records(kind: &'static str, count: usize) {
    if count > 0 {
        counter!("replayer_skipped_records_total", "kind" => kind).increment(count as u64);
    }
}

/// Register help text for every `replayer_*` metric
///
/// Called once after the Prometheus recorder is installed.
pub fn describe_metrics() {
    describe_counter!(
        "replayer_reconstructions_total",
        "Replay state queries by tier (window, fallback, not_found)"
    );
    describe_counter!(
        "replayer_window_rejections_total",
        "Tolerance windows rejected by the driver-count or leader gate"
    );
    describe_histogram!(
        "replayer_reconstruction_latency_ms",
        Unit::Milliseconds,
        "Replay state query latency"
    );
    describe_histogram!(
        "replayer_reconstruction_tolerance_s",
        Unit::Seconds,
        "Tolerance of the accepted window"
    );
    describe_histogram!("replayer_reconstruction_cars", "Cars per replay state");

    describe_counter!("replayer_ingests_total", "Session ingests by status");
    describe_counter!("replayer_ingested_rows_total", Unit::Count, "Rows written by ingests");
    describe_histogram!(
        "replayer_ingest_duration_ms",
        Unit::Milliseconds,
        "Fetch, normalize and persist time per session"
    );
    describe_gauge!("replayer_last_ingest_rows", "Rows written by the last ingest of a session");
    describe_counter!(
        "replayer_telemetry_fetch_failures_total",
        "Ingests stored without car telemetry"
    );
    describe_counter!("replayer_upstream_requests_total", "Upstream API requests by endpoint");
    describe_counter!(
        "replayer_sentinel_timestamps_total",
        "Records stored with the 0.0 timestamp sentinel"
    );
    describe_counter!("replayer_skipped_records_total", "Malformed upstream records dropped");

    describe_counter!("replayer_store_commits_total", "Committed store transactions");
    describe_counter!("replayer_store_write_failures_total", "Failed store transactions");

    describe_counter!("replayer_http_requests_total", "HTTP requests by route and status");
    describe_histogram!(
        "replayer_http_request_duration_seconds",
        Unit::Seconds,
        "HTTP request latency"
    );
    describe_counter!("replayer_http_request_errors_total", "HTTP responses with status >= 400");
}

/// Reconstruction result aggregator
///
/// Aggregates query results in memory, used to print sweep summaries.
#[derive(Debug, Clone, Default)]
pub struct ReplayMetricsAggregator {
    /// Total queries
    pub total_queries: u64,

    /// Queries that found no position data
    pub not_found: u64,

    /// Queries answered by the fallback tier
    pub fallback_hits: u64,

    /// Window-tier hits keyed by tolerance in milliseconds
    pub window_hits: BTreeMap<u64, u64>,

    /// Cars per resolved state
    pub car_stats: RunningStats,

    /// Query latency (ms)
    pub latency_stats: RunningStats,
}

impl ReplayMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update aggregate statistics with one query result
    pub fn update(&mut self, state: Option<&ReplayState>, latency_ms: f64) {
        self.total_queries += 1;
        self.latency_stats.push(latency_ms);

        let Some(state) = state else {
            self.not_found += 1;
            return;
        };

        match state.tier {
            ReconstructionTier::Window { tolerance } => {
                let key = (tolerance * 1000.0).round() as u64;
                *self.window_hits.entry(key).or_insert(0) += 1;
            }
            ReconstructionTier::Fallback => self.fallback_hits += 1,
        }
        self.car_stats.push(state.cars.len() as f64);
    }

    /// Build a summary report
    pub fn summary(&self) -> ReplaySummary {
        ReplaySummary {
            total_queries: self.total_queries,
            not_found: self.not_found,
            fallback_hits: self.fallback_hits,
            fallback_rate: if self.total_queries > 0 {
                self.fallback_hits as f64 / self.total_queries as f64 * 100.0
            } else {
                0.0
            },
            window_hits: self
                .window_hits
                .iter()
                .map(|(ms, hits)| (*ms as f64 / 1000.0, *hits))
                .collect(),
            cars: StatsSummary::from(&self.car_stats),
            latency_ms: StatsSummary::from(&self.latency_stats),
        }
    }
}

/// Sweep summary
#[derive(Debug, Clone, Default)]
pub struct ReplaySummary {
    pub total_queries: u64,
    pub not_found: u64,
    pub fallback_hits: u64,
    pub fallback_rate: f64,
    /// (tolerance seconds, hits), ascending tolerance
    pub window_hits: Vec<(f64, u64)>,
    pub cars: StatsSummary,
    pub latency_ms: StatsSummary,
}

impl std::fmt::Display for ReplaySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Replay Summary ===")?;
        writeln!(f, "Total queries: {}", self.total_queries)?;
        writeln!(f, "Not found: {}", self.not_found)?;
        for (tolerance, hits) in &self.window_hits {
            writeln!(f, "Window {tolerance}s: {hits}")?;
        }
        writeln!(
            f,
            "Fallback: {} ({:.2}%)",
            self.fallback_hits, self.fallback_rate
        )?;
        writeln!(f, "Cars per state: {}", self.cars)?;
        writeln!(f, "Latency (ms): {}", self.latency_ms)?;
        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            self.m2 += delta * (value - self.mean);
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}
