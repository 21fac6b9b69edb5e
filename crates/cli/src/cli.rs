//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// F1 Replayer - historical Formula 1 telemetry replay service
#[derive(Parser, Debug)]
#[command(
    name = "f1-replayer",
    author,
    version,
    about = "Historical F1 telemetry replayer",
    long_about = "Ingests historical Formula 1 telemetry from OpenF1 into a local SQLite \n\
                  database and reconstructs the state of every car at any timestamp."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "F1_REPLAYER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "F1_REPLAYER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    /// Path to configuration file (TOML or JSON); defaults apply when omitted
    #[arg(short, long, global = true, env = "F1_REPLAYER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the database path from configuration
    #[arg(long, global = true, env = "F1_REPLAYER_DB")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API
    Serve(ServeArgs),

    /// Ingest one session by key
    Ingest(IngestArgs),

    /// Find a race by name (e.g. "Bahrain GP 2023") and ingest it
    LoadRace(LoadRaceArgs),

    /// Reconstruct car states at a timestamp, or sweep a time range
    State(StateArgs),

    /// Print the lap timeline of a stored session
    Timeline(TimelineArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),
}

/// Arguments for the `serve` command
#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Override bind host from configuration
    #[arg(long, env = "F1_REPLAYER_HOST")]
    pub host: Option<String>,

    /// Override bind port from configuration
    #[arg(long, env = "F1_REPLAYER_PORT")]
    pub port: Option<u16>,

    /// Race loaded at startup and advertised by /api/demo
    #[arg(long, env = "F1_REPLAYER_DEMO_RACE")]
    pub demo_race: Option<String>,

    /// Skip loading the demo race
    #[arg(long, conflicts_with = "demo_race")]
    pub no_demo: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "F1_REPLAYER_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `ingest` command
#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Upstream session key (e.g. 9158)
    pub session_key: String,

    /// Display name stored with the session
    #[arg(long)]
    pub name: Option<String>,

    /// Country stored with the session
    #[arg(long)]
    pub country: Option<String>,
}

/// Arguments for the `load-race` command
#[derive(Args, Debug)]
pub struct LoadRaceArgs {
    /// Free-form race name containing a year and a country
    pub race_name: String,
}

/// Arguments for the `state` command
#[derive(Args, Debug)]
pub struct StateArgs {
    /// Stored session key
    pub session_key: String,

    /// Query timestamp (epoch seconds)
    #[arg(short, long, required_unless_present = "from", conflicts_with = "from")]
    pub t: Option<f64>,

    /// Sweep start (epoch seconds)
    #[arg(long, requires = "to")]
    pub from: Option<f64>,

    /// Sweep end (epoch seconds, inclusive)
    #[arg(long, requires = "from")]
    pub to: Option<f64>,

    /// Sweep step (seconds)
    #[arg(long, default_value = "10")]
    pub step: f64,

    /// Search a single window of this many seconds, skipping the driver and leader checks
    #[arg(long, requires = "t")]
    pub window: Option<f64>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `timeline` command
#[derive(Args, Debug)]
pub struct TimelineArgs {
    /// Stored session key
    pub session_key: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `validate` command
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
