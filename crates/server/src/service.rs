//! ReplayService - composition root
//!
//! Owns the store, the replay engine and the ingestion pipeline; constructed
//! once at startup and shared by every request.

use std::sync::{Arc, PoisonError, RwLock};

use contracts::{ReplayState, ServiceConfig, TelemetryProvider, Timeline};
use ingestion::{IngestOutcome, IngestionConfig, IngestionPipeline, OpenF1Client, SessionDetails};
use replay_engine::ReplayEngine;
use telemetry_store::TelemetryStore;
use tracing::{info, instrument, warn};

use crate::error::Result;

/// Replay service
pub struct ReplayService<P> {
    store: TelemetryStore,
    replay: ReplayEngine,
    pipeline: IngestionPipeline<P>,
    demo_session: RwLock<Option<String>>,
}

impl ReplayService<OpenF1Client> {
    /// Open the configured database and upstream client
    pub fn open(config: &ServiceConfig) -> Result<Self> {
        let store = TelemetryStore::open(&config.store)?;
        let provider = Arc::new(OpenF1Client::new(&config.upstream)?);
        Ok(Self::new(store, provider, config))
    }
}

impl<P> ReplayService<P>
where
    P: TelemetryProvider + Sync + 'static,
{
    pub fn new(store: TelemetryStore, provider: Arc<P>, config: &ServiceConfig) -> Self {
        Self {
            replay: ReplayEngine::new(store.clone(), config.reconstruction.clone()),
            pipeline: IngestionPipeline::new(
                provider,
                store.clone(),
                IngestionConfig::from(&config.upstream),
            ),
            store,
            demo_session: RwLock::new(None),
        }
    }

    pub fn store(&self) -> &TelemetryStore {
        &self.store
    }

    pub fn pipeline(&self) -> &IngestionPipeline<P> {
        &self.pipeline
    }

    /// State of every car at `t`, `None` when the session has no positions
    pub async fn get_replay_state(&self, session_key: &str, t: f64) -> Result<Option<ReplayState>> {
        Ok(self.replay.state_at(session_key, t).await?)
    }

    /// Lap timeline, `None` when the session is unknown
    pub async fn get_timeline(&self, session_key: &str) -> Result<Option<Timeline>> {
        Ok(self.replay.timeline(session_key).await?)
    }

    /// Ingest a session by key (no-op when already stored)
    pub async fn ingest_session(
        &self,
        session_key: &str,
        name: Option<&str>,
        country: Option<&str>,
    ) -> Result<IngestOutcome> {
        Ok(self
            .pipeline
            .ingest_session(session_key, SessionDetails::named(name, country))
            .await?)
    }

    /// Resolve and ingest a race by name, returning its session key
    pub async fn ingest_by_race_name(&self, race_name: &str) -> Result<Option<String>> {
        Ok(self.pipeline.ingest_by_race_name(race_name).await?)
    }

    /// Display name of a stored session
    pub async fn session_name(&self, session_key: &str) -> Result<Option<String>> {
        let session = self.store.session(session_key).await?;
        Ok(session.map(|s| s.metadata.session_name))
    }

    /// Session advertised by `/api/demo`
    pub fn demo_session(&self) -> Option<String> {
        self.demo_session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_demo_session(&self, session_key: Option<String>) {
        *self
            .demo_session
            .write()
            .unwrap_or_else(PoisonError::into_inner) = session_key;
    }

    /// Load the demo race; failures are logged and leave no demo session
    #[instrument(name = "load_demo", skip(self))]
    pub async fn load_demo(&self, race_name: &str) -> Option<String> {
        match self.ingest_by_race_name(race_name).await {
            Ok(Some(session_key)) => {
                info!(race_name, session_key = %session_key, "Demo session ready");
                self.set_demo_session(Some(session_key.clone()));
                Some(session_key)
            }
            Ok(None) => {
                warn!(race_name, "Demo race not found upstream");
                None
            }
            Err(e) => {
                warn!(race_name, error = %e, "Demo race failed to load");
                None
            }
        }
    }

    /// Close the upstream client and stop the store writer
    pub async fn shutdown(&self) -> Result<()> {
        if let Err(e) = self.pipeline.close().await {
            warn!(error = %e, "Provider close failed");
        }
        self.store.shutdown().await?;
        info!("Replay service stopped");
        Ok(())
    }
}
