//! Single-writer worker
//!
//! One dedicated thread owns the write connection and applies commands from a
//! bounded queue, each in its own transaction. Callers wait on a oneshot reply.

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use contracts::{SessionMetadata, TelemetryBatch};
use rusqlite::{params, Connection, Transaction};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, instrument};

use crate::error::{Result, StoreError};
use crate::metrics::StoreMetrics;

/// Command executed by the writer thread
pub(crate) enum WriteCommand {
    Session {
        session_key: String,
        metadata: SessionMetadata,
        reply: oneshot::Sender<Result<()>>,
    },
    Telemetry {
        session_key: String,
        batch: TelemetryBatch,
        reply: oneshot::Sender<Result<usize>>,
    },
    Ingest {
        session_key: String,
        metadata: SessionMetadata,
        batch: TelemetryBatch,
        reply: oneshot::Sender<Result<usize>>,
    },
}

/// Handle to the running writer thread
pub(crate) struct WriterHandle {
    tx: Mutex<Option<mpsc::Sender<WriteCommand>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    metrics: Arc<StoreMetrics>,
}

impl WriterHandle {
    /// Spawn the writer thread around an initialized connection
    pub(crate) fn spawn(
        conn: Connection,
        queue_capacity: usize,
        metrics: Arc<StoreMetrics>,
    ) -> Result<Self> {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let worker_metrics = Arc::clone(&metrics);

        let worker = std::thread::Builder::new()
            .name("telemetry-store-writer".to_string())
            .spawn(move || writer_loop(conn, rx, worker_metrics))?;

        Ok(Self {
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
            metrics,
        })
    }

    /// Queue a command, waiting for space if the queue is full
    pub(crate) async fn send(&self, command: WriteCommand) -> Result<()> {
        let tx = self
            .tx
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
            .ok_or(StoreError::WriterClosed)?;

        tx.send(command)
            .await
            .map_err(|_| StoreError::WriterClosed)?;
        self.metrics
            .set_queue_len(tx.max_capacity() - tx.capacity());
        Ok(())
    }

    /// Stop accepting commands, drain the queue and join the thread
    #[instrument(name = "store_writer_shutdown", skip(self))]
    pub(crate) async fn shutdown(&self) -> Result<()> {
        // Dropping the last sender ends the writer loop after the queue drains
        if let Ok(mut guard) = self.tx.lock() {
            guard.take();
        }
        let worker = self.worker.lock().ok().and_then(|mut guard| guard.take());

        if let Some(worker) = worker {
            let joined = tokio::task::spawn_blocking(move || worker.join())
                .await
                .map_err(|e| StoreError::ReadTask(e.to_string()))?;
            if joined.is_err() {
                error!("Store writer thread panicked");
                return Err(StoreError::WriterClosed);
            }
        }
        debug!("Store writer shutdown complete");
        Ok(())
    }
}

fn writer_loop(
    mut conn: Connection,
    mut rx: mpsc::Receiver<WriteCommand>,
    metrics: Arc<StoreMetrics>,
) {
    debug!("Store writer started");

    while let Some(command) = rx.blocking_recv() {
        metrics.set_queue_len(rx.len());

        match command {
            WriteCommand::Session {
                session_key,
                metadata,
                reply,
            } => {
                let result = in_transaction(&mut conn, |tx| {
                    upsert_session(tx, &session_key, &metadata)?;
                    Ok(0)
                });
                let _ = reply.send(track(&metrics, &session_key, result).map(|_| ()));
            }
            WriteCommand::Telemetry {
                session_key,
                batch,
                reply,
            } => {
                let result = in_transaction(&mut conn, |tx| insert_batch(tx, &session_key, &batch));
                let _ = reply.send(track(&metrics, &session_key, result));
            }
            WriteCommand::Ingest {
                session_key,
                metadata,
                batch,
                reply,
            } => {
                let result = in_transaction(&mut conn, |tx| {
                    upsert_session(tx, &session_key, &metadata)?;
                    insert_batch(tx, &session_key, &batch)
                });
                let _ = reply.send(track(&metrics, &session_key, result));
            }
        }
    }

    debug!("Store writer stopped");
}

fn track(metrics: &StoreMetrics, session_key: &str, result: Result<usize>) -> Result<usize> {
    match &result {
        Ok(rows) => {
            metrics.record_commit(*rows);
            metrics::counter!("replayer_store_commits_total").increment(1);
            debug!(session_key, rows, "Write committed");
        }
        Err(e) => {
            metrics.inc_write_failures();
            metrics::counter!("replayer_store_write_failures_total").increment(1);
            error!(session_key, error = %e, "Write rolled back");
        }
    }
    result
}

/// Run `op` in one transaction; any error rolls back everything
fn in_transaction<F>(conn: &mut Connection, op: F) -> Result<usize>
where
    F: FnOnce(&Transaction<'_>) -> Result<usize>,
{
    let tx = conn.transaction()?;
    let rows = op(&tx)?;
    tx.commit()?;
    Ok(rows)
}

fn upsert_session(tx: &Transaction<'_>, session_key: &str, metadata: &SessionMetadata) -> Result<()> {
    tx.execute(
        "INSERT OR REPLACE INTO sessions
            (session_key, session_name, session_type, country_name, year, date_start, date_end, total_laps)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            session_key,
            metadata.session_name,
            metadata.session_type,
            metadata.country_name,
            metadata.year,
            metadata.date_start,
            metadata.date_end,
            metadata.total_laps,
        ],
    )?;
    Ok(())
}

fn insert_batch(tx: &Transaction<'_>, session_key: &str, batch: &TelemetryBatch) -> Result<usize> {
    {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO position_data (session_key, driver_number, timestamp, position)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for p in &batch.positions {
            stmt.execute(params![session_key, p.driver_number, p.timestamp, p.position])?;
        }
    }
    {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO car_data (session_key, driver_number, timestamp, speed, gear, throttle, brake, rpm, drs)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )?;
        for t in &batch.telemetry {
            stmt.execute(params![
                session_key,
                t.driver_number,
                t.timestamp,
                t.speed,
                t.gear,
                t.throttle,
                t.brake,
                t.rpm,
                t.drs,
            ])?;
        }
    }
    {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO lap_times (session_key, driver_number, lap_number, lap_duration,
                sector_1_duration, sector_2_duration, sector_3_duration, pit_in_time, pit_out_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )?;
        for lap in &batch.laps {
            stmt.execute(params![
                session_key,
                lap.driver_number,
                lap.lap_number,
                lap.lap_duration,
                lap.sector_1_duration,
                lap.sector_2_duration,
                lap.sector_3_duration,
                lap.pit_in_time,
                lap.pit_out_time,
            ])?;
        }
    }
    Ok(batch.row_count())
}
