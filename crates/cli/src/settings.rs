//! Configuration resolution: file (or defaults), then CLI/env overrides

use anyhow::{Context, Result};
use contracts::ServiceConfig;
use tracing::info;

use crate::cli::Cli;

/// Load the service configuration for a command
pub fn load(cli: &Cli) -> Result<ServiceConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Configuration file not found: {}", path.display());
            }
            config_loader::ConfigLoader::load_from_path(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        }
        None => ServiceConfig::default(),
    };

    if let Some(db) = &cli.db {
        info!(db = %db.display(), "Overriding database path from CLI");
        config.store.path = db.display().to_string();
    }

    config_loader::ConfigLoader::validate(&config).context("Invalid configuration")?;
    Ok(config)
}
