//! TelemetryStore - async facade over the writer thread and reader pool

use std::path::{Path, PathBuf};
use std::sync::Arc;

use contracts::{SessionMetadata, SessionRecord, StoreConfig, TelemetryBatch};
use rusqlite::Connection;
use tokio::sync::oneshot;
use tracing::{debug, info, instrument};

use crate::error::{Result, StoreError};
use crate::metrics::{MetricsSnapshot, StoreMetrics};
use crate::reader::{ReaderPool, RowCounts, StoreReader, TimelineRows};
use crate::schema;
use crate::writer::{WriteCommand, WriterHandle};

struct StoreInner {
    path: PathBuf,
    readers: ReaderPool,
    writer: WriterHandle,
    metrics: Arc<StoreMetrics>,
}

/// Durable telemetry storage
///
/// Cheap to clone; all clones share one writer thread and one reader pool.
#[derive(Clone)]
pub struct TelemetryStore {
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for TelemetryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryStore")
            .field("path", &self.inner.path)
            .finish()
    }
}

impl TelemetryStore {
    /// Open (or create) the database described by `config`
    pub fn open(config: &StoreConfig) -> Result<Self> {
        Self::open_with(
            Path::new(&config.path),
            config.max_readers,
            config.write_queue_capacity,
        )
    }

    /// Open (or create) a database file
    ///
    /// Schema creation and WAL setup happen on the write connection before any
    /// reader connection is opened.
    pub fn open_with(path: &Path, max_readers: usize, write_queue_capacity: usize) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| StoreError::open(path.display().to_string(), e))?;
        schema::init_writer(&conn).map_err(|e| StoreError::open(path.display().to_string(), e))?;

        let metrics = Arc::new(StoreMetrics::new());
        let writer = WriterHandle::spawn(conn, write_queue_capacity, Arc::clone(&metrics))?;

        info!(path = %path.display(), max_readers, "Telemetry store opened");

        Ok(Self {
            inner: Arc::new(StoreInner {
                path: path.to_path_buf(),
                readers: ReaderPool::new(path.to_path_buf(), max_readers),
                writer,
                metrics,
            }),
        })
    }

    /// Database file path
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Current store metrics
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Run a read-only operation on the blocking pool
    ///
    /// The closure gets a pooled read-only connection and must not hold on to it.
    pub async fn read<F, T, E>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce(&StoreReader<'_>) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<StoreError> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let result = tokio::task::spawn_blocking(move || {
            let result = inner.readers.with_reader(op);
            inner.metrics.inc_read_count();
            result
        })
        .await
        .map_err(|e| StoreError::ReadTask(e.to_string()))?;
        result
    }

    /// Whether a session row exists
    #[instrument(name = "store_session_exists", skip(self))]
    pub async fn session_exists(&self, session_key: &str) -> Result<bool> {
        let key = session_key.to_string();
        self.read(move |reader| reader.session_exists(&key)).await
    }

    /// Session row, if present
    pub async fn session(&self, session_key: &str) -> Result<Option<SessionRecord>> {
        let key = session_key.to_string();
        self.read(move |reader| reader.session(&key)).await
    }

    /// Insert or replace a session row
    #[instrument(name = "store_session", skip(self, metadata))]
    pub async fn store_session(&self, session_key: &str, metadata: SessionMetadata) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.inner
            .writer
            .send(WriteCommand::Session {
                session_key: session_key.to_string(),
                metadata,
                reply,
            })
            .await?;
        rx.await.map_err(|_| StoreError::WriterClosed)?
    }

    /// Append telemetry rows in one transaction, returning the row count
    #[instrument(
        name = "store_telemetry",
        skip(self, batch),
        fields(rows = batch.row_count())
    )]
    pub async fn store_telemetry(&self, session_key: &str, batch: TelemetryBatch) -> Result<usize> {
        let (reply, rx) = oneshot::channel();
        self.inner
            .writer
            .send(WriteCommand::Telemetry {
                session_key: session_key.to_string(),
                batch,
                reply,
            })
            .await?;
        rx.await.map_err(|_| StoreError::WriterClosed)?
    }

    /// Write the session row and its telemetry rows in one transaction
    ///
    /// Either everything is committed or nothing is, so a failed ingest never
    /// leaves a session row that `session_exists` would report.
    #[instrument(
        name = "store_ingest",
        skip(self, metadata, batch),
        fields(rows = batch.row_count())
    )]
    pub async fn store_ingest(
        &self,
        session_key: &str,
        metadata: SessionMetadata,
        batch: TelemetryBatch,
    ) -> Result<usize> {
        let (reply, rx) = oneshot::channel();
        self.inner
            .writer
            .send(WriteCommand::Ingest {
                session_key: session_key.to_string(),
                metadata,
                batch,
                reply,
            })
            .await?;
        rx.await.map_err(|_| StoreError::WriterClosed)?
    }

    /// Session row with ordered laps and total lap count
    #[instrument(name = "store_query_timeline", skip(self))]
    pub async fn query_timeline(&self, session_key: &str) -> Result<Option<TimelineRows>> {
        let key = session_key.to_string();
        self.read(move |reader| reader.timeline_rows(&key)).await
    }

    /// Row counts of one session
    pub async fn row_counts(&self, session_key: &str) -> Result<RowCounts> {
        let key = session_key.to_string();
        self.read(move |reader| reader.row_counts(&key)).await
    }

    /// Drain pending writes and stop the writer thread
    ///
    /// Reads keep working afterwards; writes fail with `WriterClosed`.
    pub async fn shutdown(&self) -> Result<()> {
        self.inner.writer.shutdown().await?;
        debug!(path = %self.inner.path.display(), "Telemetry store shut down");
        Ok(())
    }
}
