//! Replay engine error types

use contracts::ContractError;
use telemetry_store::StoreError;
use thiserror::Error;

/// Reconstruction and timeline errors
///
/// "No data" is never an error: queries return `None` instead.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// Query timestamp is not a finite number
    #[error("invalid query timestamp: {0}")]
    InvalidTimestamp(f64),

    /// Sample source failure
    #[error("sample source error: {0}")]
    Source(#[from] ContractError),

    /// Store failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, ReplayError>;
