//! ReplayEngine - async queries over the telemetry store

use std::sync::Arc;
use std::time::Instant;

use contracts::{ReconstructionConfig, ReplayState, Timeline};
use telemetry_store::TelemetryStore;
use tracing::instrument;

use crate::engine::ReconstructionEngine;
use crate::error::Result;
use crate::timeline::build_timeline;

/// Replay queries bound to one store
///
/// Reconstruction runs on the blocking pool with a pooled read-only
/// connection, so queries proceed while an ingest is being written.
#[derive(Debug, Clone)]
pub struct ReplayEngine {
    store: TelemetryStore,
    engine: Arc<ReconstructionEngine>,
}

impl ReplayEngine {
    pub fn new(store: TelemetryStore, config: ReconstructionConfig) -> Self {
        Self {
            store,
            engine: Arc::new(ReconstructionEngine::new(config)),
        }
    }

    pub fn reconstruction(&self) -> &ReconstructionEngine {
        &self.engine
    }

    /// State of every car at `t`, `None` when the session has no positions
    #[instrument(name = "replay_state_at", skip(self))]
    pub async fn state_at(&self, session_key: &str, t: f64) -> Result<Option<ReplayState>> {
        let engine = Arc::clone(&self.engine);
        let key = session_key.to_string();
        let started = Instant::now();

        let state = self
            .store
            .read(move |reader| engine.reconstruct(reader, &key, t))
            .await?;

        observability::record_reconstruction(
            state.as_ref(),
            started.elapsed().as_secs_f64() * 1000.0,
        );
        Ok(state)
    }

    /// Single nearest-match window without the representativeness gate
    #[instrument(name = "replay_search_window", skip(self))]
    pub async fn search_window(
        &self,
        session_key: &str,
        t: f64,
        tolerance: f64,
    ) -> Result<ReplayState> {
        let engine = Arc::clone(&self.engine);
        let key = session_key.to_string();
        self.store
            .read(move |reader| engine.search_window(reader, &key, t, tolerance))
            .await
    }

    /// Lap timeline, `None` when the session row does not exist
    #[instrument(name = "replay_timeline", skip(self))]
    pub async fn timeline(&self, session_key: &str) -> Result<Option<Timeline>> {
        let rows = self.store.query_timeline(session_key).await?;
        Ok(rows.map(build_timeline))
    }
}
