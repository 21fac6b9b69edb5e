//! # Replay Server
//!
//! Composition root and HTTP front door.
//!
//! - `ReplayService` wires the store, the replay engine and the ingestion
//!   pipeline together and owns their lifecycle
//! - `build_router` exposes the service as a JSON API (axum)

mod error;
mod routes;
mod service;
mod telemetry;

use std::future::Future;
use std::sync::Arc;

use contracts::TelemetryProvider;
use tokio::net::TcpListener;
use tracing::info;

pub use error::{ApiError, Result, ServiceError};
pub use routes::{
    build_router, ApiInfo, DemoResponse, ExampleUsage, LoadRaceResponse, LoadSessionResponse,
    SessionLinks,
};
pub use service::ReplayService;
pub use telemetry::http_metrics_middleware;

/// Serve the API until `shutdown` resolves
pub async fn serve<P, F>(
    listener: TcpListener,
    service: Arc<ReplayService<P>>,
    shutdown: F,
) -> std::io::Result<()>
where
    P: TelemetryProvider + Send + Sync + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "HTTP API listening");
    }
    axum::serve(listener, build_router(service))
        .with_graceful_shutdown(shutdown)
        .await
}
