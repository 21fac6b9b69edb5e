//! Telemetry store error types

use contracts::ContractError;
use thiserror::Error;

/// Store-specific errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database could not be opened or prepared
    #[error("failed to open store at '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    /// SQLite error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Writer thread stopped (shutdown or panic)
    #[error("store writer is not running")]
    WriterClosed,

    /// Blocking read task failed to complete
    #[error("read task failed: {0}")]
    ReadTask(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Create an open error
    pub fn open(path: impl Into<String>, source: rusqlite::Error) -> Self {
        Self::Open {
            path: path.into(),
            source,
        }
    }
}

impl From<StoreError> for ContractError {
    fn from(err: StoreError) -> Self {
        ContractError::storage("telemetry_store", err.to_string())
    }
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;
