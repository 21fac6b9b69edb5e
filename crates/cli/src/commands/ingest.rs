//! `ingest` and `load-race` command implementations.

use anyhow::{Context, Result};
use contracts::ServiceConfig;
use ingestion::IngestOutcome;
use server::ReplayService;
use tracing::info;

use crate::cli::{IngestArgs, LoadRaceArgs};

/// Execute the `ingest` command
pub async fn run_ingest(config: &ServiceConfig, args: &IngestArgs) -> Result<()> {
    let service = ReplayService::open(config).context("Failed to open replay service")?;

    let result = service
        .ingest_session(&args.session_key, args.name.as_deref(), args.country.as_deref())
        .await;
    service.shutdown().await.context("Shutdown failed")?;

    match result.with_context(|| format!("Failed to ingest session {}", args.session_key))? {
        IngestOutcome::Ingested(report) => {
            info!(session_key = %args.session_key, rows = report.rows(), "Ingest complete");
            println!("Session {} ingested", args.session_key);
            println!("  Positions: {}", report.positions);
            println!("  Telemetry: {}", report.telemetry);
            println!("  Laps: {}", report.laps);
            if report.skipped_records > 0 {
                println!("  Skipped records: {}", report.skipped_records);
            }
            if report.sentinel_timestamps > 0 {
                println!("  Unparseable timestamps: {}", report.sentinel_timestamps);
            }
            if !report.telemetry_available {
                println!("  Telemetry fetch failed; stored without car data");
            }
        }
        IngestOutcome::AlreadyPresent => {
            println!("Session {} already stored, nothing to do", args.session_key);
        }
    }
    Ok(())
}

/// Execute the `load-race` command
pub async fn run_load_race(config: &ServiceConfig, args: &LoadRaceArgs) -> Result<()> {
    let service = ReplayService::open(config).context("Failed to open replay service")?;

    let result = service.ingest_by_race_name(&args.race_name).await;
    service.shutdown().await.context("Shutdown failed")?;

    match result.with_context(|| format!("Failed to load race '{}'", args.race_name))? {
        Some(session_key) => {
            println!("Loaded '{}' as session {}", args.race_name, session_key);
            Ok(())
        }
        None => anyhow::bail!(
            "Could not find race '{}'. Try races like 'Bahrain GP 2023', 'Monaco 2024'",
            args.race_name
        ),
    }
}
