//! ServiceConfig - Config Loader output
//!
//! Describes the full service setup: upstream provider, store, reconstruction
//! policy and HTTP surface. Every field has a default so an empty file is valid.

use serde::{Deserialize, Serialize};

use crate::ReconstructionConfig;

/// Config version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Config version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Upstream provider settings
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Telemetry store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Reconstruction policy
    #[serde(default)]
    pub reconstruction: ReconstructionConfig,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
}

/// Upstream provider settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Provider base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,

    /// Timeout for the whole concurrent fetch of one session (seconds)
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_request_timeout(),
            fetch_timeout_secs: default_fetch_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.openf1.org/v1".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_fetch_timeout() -> u64 {
    120
}

/// Telemetry store settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file
    #[serde(default = "default_store_path")]
    pub path: String,

    /// Read-only connections kept for queries
    #[serde(default = "default_max_readers")]
    pub max_readers: usize,

    /// Pending write commands before callers wait
    #[serde(default = "default_write_queue_capacity")]
    pub write_queue_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            max_readers: default_max_readers(),
            write_queue_capacity: default_write_queue_capacity(),
        }
    }
}

fn default_store_path() -> String {
    "f1_data.db".to_string()
}

fn default_max_readers() -> usize {
    4
}

fn default_write_queue_capacity() -> usize {
    16
}

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Race name loaded by the demo endpoint (None disables it)
    #[serde(default = "default_demo_race")]
    pub demo_race: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            demo_race: default_demo_race(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_demo_race() -> Option<String> {
    Some("Bahrain GP 2023".to_string())
}

impl ServerConfig {
    /// `host:port` bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
