//! # F1 Replayer CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 配置加载与验证
//! - HTTP 服务与数据导入
//! - 本地回放查询

mod cli;
mod commands;
mod settings;

use anyhow::Result;
use clap::Parser;
use observability::ObservabilityConfig;
use tracing::info;

use cli::{Cli, Commands};
use commands::{
    run_ingest, run_load_race, run_serve, run_state, run_timeline, run_validate,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_logging(&cli)?;

    info!(version = env!("CARGO_PKG_VERSION"), "F1 Replayer starting");

    let result = run(&cli).await;

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Execute the selected command
async fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Validate(args) => run_validate(cli, args),
        Commands::Serve(args) => run_serve(settings::load(cli)?, args).await,
        Commands::Ingest(args) => run_ingest(&settings::load(cli)?, args).await,
        Commands::LoadRace(args) => run_load_race(&settings::load(cli)?, args).await,
        Commands::State(args) => run_state(&settings::load(cli)?, args).await,
        Commands::Timeline(args) => run_timeline(&settings::load(cli)?, args).await,
    }
}

/// Initialize logging based on CLI options
fn init_logging(cli: &Cli) -> Result<()> {
    let config = ObservabilityConfig::for_cli(cli.log_format.into(), cli.verbose, cli.quiet);
    observability::init_with_config(&config)
}
