//! `serve` command implementation.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use contracts::ServiceConfig;
use server::ReplayService;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::cli::ServeArgs;

/// Execute the `serve` command
pub async fn run_serve(mut config: ServiceConfig, args: &ServeArgs) -> Result<()> {
    if let Some(ref host) = args.host {
        info!(host = %host, "Overriding bind host from CLI");
        config.server.host = host.clone();
    }
    if let Some(port) = args.port {
        info!(port, "Overriding bind port from CLI");
        config.server.port = port;
    }
    if args.metrics_port != 0 {
        observability::init_metrics(SocketAddr::from(([0, 0, 0, 0], args.metrics_port)))?;
    }

    let service = Arc::new(
        ReplayService::open(&config).context("Failed to open replay service")?,
    );

    let demo_race = if args.no_demo {
        None
    } else {
        args.demo_race.clone().or_else(|| config.server.demo_race.clone())
    };
    if let Some(race) = demo_race {
        let demo = Arc::clone(&service);
        tokio::spawn(async move {
            demo.load_demo(&race).await;
        });
    }

    let addr = config.server.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    server::serve(listener, Arc::clone(&service), shutdown_signal())
        .await
        .context("HTTP server error")?;

    warn!("Shutting down");
    service.shutdown().await.context("Shutdown failed")?;
    info!("F1 Replayer finished");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
