//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::ServiceConfig;
use serde::Serialize;
use tracing::info;

use crate::cli::{Cli, ValidateArgs};
use crate::settings;

/// Full grid size; a larger driver threshold can never be met
const GRID_SIZE: usize = 20;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    upstream: String,
    database: String,
    bind: String,
    tolerances_s: Vec<f64>,
    demo_race: Option<String>,
}

/// Execute the `validate` command
pub fn run_validate(cli: &Cli, args: &ValidateArgs) -> Result<()> {
    let config_path = cli
        .config
        .as_ref()
        .map_or_else(|| "<defaults>".to_string(), |p| p.display().to_string());
    info!(config = %config_path, "Validating configuration");

    let result = match settings::load(cli) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(summarize(&config)),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("{e:#}")),
            warnings: None,
            summary: None,
        },
    };

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn summarize(config: &ServiceConfig) -> ConfigSummary {
    ConfigSummary {
        version: format!("{:?}", config.version),
        upstream: config.upstream.base_url.clone(),
        database: config.store.path.clone(),
        bind: config.server.bind_addr(),
        tolerances_s: config.reconstruction.tolerances_s.clone(),
        demo_race: config.server.demo_race.clone(),
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &ServiceConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.reconstruction.min_drivers > GRID_SIZE {
        warnings.push(format!(
            "reconstruction.min_drivers = {} exceeds a full grid ({GRID_SIZE}); \
             every query will use the fallback tier",
            config.reconstruction.min_drivers
        ));
    }

    if config.upstream.timeout_secs > config.upstream.fetch_timeout_secs {
        warnings.push(
            "upstream.timeout_secs exceeds upstream.fetch_timeout_secs; \
             the overall fetch deadline will fire first"
                .to_string(),
        );
    }

    if config.server.demo_race.is_none() {
        warnings.push("server.demo_race is not set - /api/demo will report no session".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Upstream: {}", summary.upstream);
            println!("  Database: {}", summary.database);
            println!("  Bind: {}", summary.bind);
            println!("  Tolerances (s): {:?}", summary.tolerances_s);
            if let Some(ref race) = summary.demo_race {
                println!("  Demo race: {}", race);
            }
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
