//! Store metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Metrics for one store instance
#[derive(Debug, Default)]
pub struct StoreMetrics {
    /// Write commands waiting for the writer thread
    queue_len: AtomicUsize,
    /// Committed write transactions
    commit_count: AtomicU64,
    /// Telemetry rows written
    rows_written: AtomicU64,
    /// Failed write transactions (rolled back)
    write_failures: AtomicU64,
    /// Completed read operations
    read_count: AtomicU64,
}

impl StoreMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn commit_count(&self) -> u64 {
        self.commit_count.load(Ordering::Relaxed)
    }

    /// Record a committed transaction and its row count
    pub fn record_commit(&self, rows: usize) {
        self.commit_count.fetch_add(1, Ordering::Relaxed);
        self.rows_written.fetch_add(rows as u64, Ordering::Relaxed);
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written.load(Ordering::Relaxed)
    }

    pub fn write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::Relaxed)
    }

    pub fn inc_write_failures(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn read_count(&self) -> u64 {
        self.read_count.load(Ordering::Relaxed)
    }

    pub fn inc_read_count(&self) {
        self.read_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.queue_len(),
            commit_count: self.commit_count(),
            rows_written: self.rows_written(),
            write_failures: self.write_failures(),
            read_count: self.read_count(),
        }
    }
}

/// Snapshot of store metrics (for reporting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub commit_count: u64,
    pub rows_written: u64,
    pub write_failures: u64,
    pub read_count: u64,
}
