//! Ingestion Pipeline main entry

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Datelike};
use contracts::{
    SessionMetadata, TelemetryBatch, TelemetryProvider, UpstreamRecord, UpstreamSession,
    UNKNOWN_COUNTRY, UNKNOWN_RACE,
};
use telemetry_store::TelemetryStore;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{IngestionConfig, IngestionMetrics, MetricsSnapshot};
use crate::error::{IngestionError, Result};
use crate::in_flight::InFlight;
use crate::normalize::normalize_session;
use crate::race_name::parse_race_name;

/// Caller-supplied session details
///
/// Missing or blank values fall back to defaults when the session row is written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionDetails {
    pub session_name: Option<String>,
    pub session_type: Option<String>,
    pub country_name: Option<String>,
    pub year: Option<i32>,
    pub date_start: Option<String>,
    pub date_end: Option<String>,
}

impl SessionDetails {
    /// Details with only a display name and country
    pub fn named(session_name: Option<&str>, country_name: Option<&str>) -> Self {
        Self {
            session_name: session_name.map(str::to_string),
            country_name: country_name.map(str::to_string),
            ..Default::default()
        }
    }
}

impl From<&UpstreamSession> for SessionDetails {
    fn from(session: &UpstreamSession) -> Self {
        Self {
            session_name: Some(session.session_name.clone()),
            session_type: Some(session.session_type.clone()),
            country_name: Some(session.country_name.clone()),
            year: Some(session.year),
            date_start: Some(session.date_start.clone()),
            date_end: Some(session.date_end.clone()),
        }
    }
}

/// What one ingest wrote
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub positions: usize,
    pub telemetry: usize,
    pub laps: usize,
    /// Malformed upstream records dropped
    pub skipped_records: usize,
    /// Records stored with the 0.0 sentinel timestamp
    pub sentinel_timestamps: usize,
    /// False when the telemetry fetch failed and an empty set was stored
    pub telemetry_available: bool,
}

impl IngestReport {
    pub fn rows(&self) -> usize {
        self.positions + self.telemetry + self.laps
    }
}

/// Result of an ingest call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Session fetched and stored
    Ingested(IngestReport),
    /// Session row already present, nothing fetched
    AlreadyPresent,
}

struct Fetched {
    positions: Vec<UpstreamRecord>,
    car_data: Vec<UpstreamRecord>,
    laps: Vec<UpstreamRecord>,
    telemetry_available: bool,
}

/// Ingestion Pipeline
///
/// Fetches a session from the provider, normalizes it and persists it in one
/// store transaction. Ingests are idempotent per session key.
pub struct IngestionPipeline<P> {
    provider: Arc<P>,
    store: TelemetryStore,
    in_flight: InFlight,
    config: IngestionConfig,
    metrics: Arc<IngestionMetrics>,
}

impl<P> IngestionPipeline<P>
where
    P: TelemetryProvider + Sync + 'static,
{
    pub fn new(provider: Arc<P>, store: TelemetryStore, config: IngestionConfig) -> Self {
        Self {
            provider,
            store,
            in_flight: InFlight::new(),
            config,
            metrics: Arc::new(IngestionMetrics::new()),
        }
    }

    /// Upstream provider
    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    /// Target store
    pub fn store(&self) -> &TelemetryStore {
        &self.store
    }

    /// Metrics snapshot
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Fetch and persist a session unless it is already stored
    ///
    /// Position and lap fetches are required; a failed telemetry fetch is
    /// logged and replaced by an empty set. Nothing is written on error.
    #[instrument(
        name = "ingest_session",
        skip(self, details),
        fields(provider = self.provider.name())
    )]
    pub async fn ingest_session(
        &self,
        session_key: &str,
        details: SessionDetails,
    ) -> Result<IngestOutcome> {
        let _permit = self.in_flight.acquire(session_key).await;

        if self.store.session_exists(session_key).await? {
            debug!(session_key, "Session already stored, skipping ingest");
            self.metrics.record_skipped();
            observability::record_ingest_skipped();
            return Ok(IngestOutcome::AlreadyPresent);
        }

        match self.ingest_new(session_key, details).await {
            Ok(report) => Ok(IngestOutcome::Ingested(report)),
            Err(e) => {
                error!(session_key, error = %e, "Session ingest failed");
                self.metrics.record_failure();
                observability::record_ingest_failed(e.reason());
                Err(e)
            }
        }
    }

    /// Resolve a free-form race name to its race session and ingest it
    ///
    /// Returns the session key, or `None` when the name cannot be parsed or no
    /// race session matches.
    #[instrument(name = "ingest_by_race_name", skip(self))]
    pub async fn ingest_by_race_name(&self, race_name: &str) -> Result<Option<String>> {
        let Some(query) = parse_race_name(race_name) else {
            info!(race_name, "Race name not recognized");
            return Ok(None);
        };

        let timeout = self.config.fetch_timeout;
        let sessions = tokio::time::timeout(
            timeout,
            self.provider.sessions(query.year, query.country),
        )
        .await
        .map_err(|_| IngestionError::FetchTimeout {
            timeout_secs: timeout.as_secs(),
        })?
        .map_err(IngestionError::Lookup)?;

        let Some(session) = sessions.into_iter().find(UpstreamSession::is_race) else {
            info!(
                race_name,
                year = query.year,
                country = query.country,
                "No race session found"
            );
            return Ok(None);
        };

        self.ingest_session(&session.session_key, SessionDetails::from(&session))
            .await?;
        Ok(Some(session.session_key))
    }

    /// Release provider resources
    pub async fn close(&self) -> std::result::Result<(), contracts::ContractError> {
        self.provider.close().await
    }

    async fn ingest_new(&self, session_key: &str, details: SessionDetails) -> Result<IngestReport> {
        let started = Instant::now();
        let fetched = self.fetch(session_key).await?;

        let normalized = normalize_session(fetched.positions, fetched.car_data, fetched.laps);
        let totals = normalized.totals();
        self.metrics
            .record_normalization(totals.skipped, totals.sentinels);
        observability::record_skipped_records("position", normalized.positions.skipped);
        observability::record_skipped_records("car_data", normalized.telemetry.skipped);
        observability::record_skipped_records("laps", normalized.laps.skipped);
        observability::record_sentinel_timestamps("position", normalized.positions.sentinels);
        observability::record_sentinel_timestamps("car_data", normalized.telemetry.sentinels);

        let metadata = build_metadata(&details, &normalized.batch);
        let report = IngestReport {
            positions: normalized.batch.positions.len(),
            telemetry: normalized.batch.telemetry.len(),
            laps: normalized.batch.laps.len(),
            skipped_records: totals.skipped,
            sentinel_timestamps: totals.sentinels,
            telemetry_available: fetched.telemetry_available,
        };

        let rows = self
            .store
            .store_ingest(session_key, metadata, normalized.batch)
            .await?;

        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.metrics.record_ingested();
        observability::record_ingest(session_key, rows, duration_ms);
        info!(
            session_key,
            positions = report.positions,
            telemetry = report.telemetry,
            laps = report.laps,
            skipped = report.skipped_records,
            duration_ms,
            "Session ingested"
        );
        Ok(report)
    }

    /// Fetch the three record sets concurrently under one deadline
    async fn fetch(&self, session_key: &str) -> Result<Fetched> {
        let timeout = self.config.fetch_timeout;
        let all = async {
            tokio::join!(
                self.provider.positions(session_key),
                self.provider.car_data(session_key),
                self.provider.laps(session_key),
            )
        };
        let (positions, car_data, laps) =
            tokio::time::timeout(timeout, all)
                .await
                .map_err(|_| IngestionError::FetchTimeout {
                    timeout_secs: timeout.as_secs(),
                })?;

        let positions = positions.map_err(|source| IngestionError::Fetch {
            endpoint: "position",
            source,
        })?;
        let laps = laps.map_err(|source| IngestionError::Fetch {
            endpoint: "laps",
            source,
        })?;
        let (car_data, telemetry_available) = match car_data {
            Ok(records) => (records, true),
            Err(e) => {
                warn!(session_key, error = %e, "Telemetry fetch failed, storing session without it");
                self.metrics.record_telemetry_failure();
                metrics::counter!("replayer_telemetry_fetch_failures_total").increment(1);
                (Vec::new(), false)
            }
        };

        Ok(Fetched {
            positions,
            car_data,
            laps,
            telemetry_available,
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Session row for a batch: caller details first, derived values otherwise
fn build_metadata(details: &SessionDetails, batch: &TelemetryBatch) -> SessionMetadata {
    let year = details
        .year
        .filter(|y| *y > 0)
        .or_else(|| batch.first_position_timestamp().and_then(year_of))
        .unwrap_or(0);

    SessionMetadata {
        session_name: non_blank(&details.session_name).unwrap_or_else(|| UNKNOWN_RACE.to_string()),
        session_type: non_blank(&details.session_type).unwrap_or_else(|| "Race".to_string()),
        country_name: non_blank(&details.country_name)
            .unwrap_or_else(|| UNKNOWN_COUNTRY.to_string()),
        year,
        total_laps: batch.total_laps(),
        date_start: details.date_start.clone().unwrap_or_default(),
        date_end: details.date_end.clone().unwrap_or_default(),
    }
}

fn year_of(timestamp: f64) -> Option<i32> {
    DateTime::from_timestamp(timestamp as i64, 0).map(|dt| dt.year())
}
