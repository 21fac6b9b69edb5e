//! Service and HTTP error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use contracts::ContractError;
use ingestion::{IngestionError, ProviderError};
use replay_engine::ReplayError;
use serde::Serialize;
use telemetry_store::StoreError;
use thiserror::Error;
use tracing::error;

/// Composition root errors
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("replay query failed: {0}")]
    Replay(#[from] ReplayError),

    #[error("ingest failed: {0}")]
    Ingestion(#[from] IngestionError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("provider setup failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("upstream error: {0}")]
    Upstream(#[from] ContractError),
}

/// Service Result 类型别名
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Errors returned by HTTP handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    /// Logged in full, reported as a generic fault
    #[error("internal error: {0}")]
    Internal(ServiceError),
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Replay(ReplayError::InvalidTimestamp(t)) => {
                Self::BadRequest(format!("invalid timestamp: {t}"))
            }
            other => Self::Internal(other),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::NotFound(detail) => (StatusCode::NOT_FOUND, detail),
            Self::BadRequest(detail) => (StatusCode::BAD_REQUEST, detail),
            Self::Internal(err) => {
                error!(error = %err, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorBody { detail })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_timestamp_is_a_bad_request() {
        let err = ApiError::from(ServiceError::Replay(ReplayError::InvalidTimestamp(f64::NAN)));
        assert!(matches!(err, ApiError::BadRequest(_)));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn faults_are_generic() {
        let err = ApiError::from(ServiceError::Store(StoreError::WriterClosed));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
