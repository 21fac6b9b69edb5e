//! # Observability
//!
//! 可观测性模块：Tracing + Prometheus 指标。
//!
//! ## 功能
//!
//! - 根据 CLI 标志 (-v/-q/--log-format) 构建日志过滤器
//! - Prometheus 指标导出与 `replayer_*` 指标说明
//! - Reconstruction / ingest 指标收集与统计
//!
//! ## 使用示例
//!
//! ```ignore
//! let config = ObservabilityConfig::for_cli(LogFormat::Pretty, 1, false);
//! observability::init_with_config(&config)?;
//!
//! let state = engine.state_at(&key, t).await?;
//! observability::record_reconstruction(state.as_ref(), latency_ms);
//! ```

pub mod metrics;

use std::net::SocketAddr;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::Subscriber;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

// Re-exports
pub use crate::metrics::{
    describe_metrics, record_ingest, record_ingest_failed, record_ingest_skipped,
    record_reconstruction, record_sentinel_timestamps, record_skipped_records,
    record_upstream_request, ReplayMetricsAggregator, ReplaySummary, RunningStats, StatsSummary,
};

/// HTTP and TLS plumbing, held at `warn` below trace verbosity
const NOISY_TARGETS: &[&str] = &["hyper", "hyper_util", "h2", "reqwest", "rustls", "tower"];

/// 日志详细程度
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// `-q`
    Quiet,
    #[default]
    Normal,
    /// `-v`
    Debug,
    /// `-vv` and above
    Trace,
}

impl Verbosity {
    /// `quiet` wins over any number of `-v`
    pub fn from_flags(verbose: u8, quiet: bool) -> Self {
        match (quiet, verbose) {
            (true, _) => Self::Quiet,
            (false, 0) => Self::Normal,
            (false, 1) => Self::Debug,
            (false, _) => Self::Trace,
        }
    }

    pub fn level(self) -> &'static str {
        match self {
            Self::Quiet => "warn",
            Self::Normal => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

/// 日志格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON 结构化日志
    Json,
    /// 人类可读格式
    #[default]
    Pretty,
    /// 紧凑单行格式
    Compact,
}

/// 可观测性配置
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,
    pub verbosity: Verbosity,
    /// Prometheus listener (None = 禁用)
    pub metrics_addr: Option<SocketAddr>,
}

impl ObservabilityConfig {
    /// Logging config from the global CLI flags, metrics disabled
    pub fn for_cli(log_format: LogFormat, verbose: u8, quiet: bool) -> Self {
        Self {
            log_format,
            verbosity: Verbosity::from_flags(verbose, quiet),
            metrics_addr: None,
        }
    }

    /// Filter directives used when `RUST_LOG` is unset
    pub fn filter_directives(&self) -> String {
        let level = self.verbosity.level();
        let mut directives = vec![level.to_string()];
        if self.verbosity < Verbosity::Trace {
            directives.extend(NOISY_TARGETS.iter().map(|target| format!("{target}=warn")));
        }
        directives.join(",")
    }
}

/// 初始化 Tracing，并按需启动 Prometheus 导出
///
/// `RUST_LOG` overrides the verbosity-derived filter.
pub fn init_with_config(config: &ObservabilityConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(config.filter_directives())
            .context("Invalid log filter directives")?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer(config.log_format))
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    if let Some(addr) = config.metrics_addr {
        init_metrics(addr)?;
    }

    tracing::debug!(
        log_format = ?config.log_format,
        verbosity = ?config.verbosity,
        "Logging initialized"
    );
    Ok(())
}

fn fmt_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    match format {
        // Span fields carry session_key / t, so keep the current span in JSON
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(false).boxed(),
    }
}

/// 仅启动 Prometheus 导出（Tracing 已初始化）
pub fn init_metrics(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .with_context(|| format!("Failed to install Prometheus recorder on {addr}"))?;
    describe_metrics();

    tracing::info!(%addr, "Prometheus metrics endpoint initialized");
    Ok(())
}
