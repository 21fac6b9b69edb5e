//! Ingestion 错误类型

use contracts::ContractError;
use telemetry_store::StoreError;
use thiserror::Error;

/// Upstream provider errors
#[derive(Debug, Error)]
pub enum ProviderError {
    /// 网络请求失败
    #[error("request to '{endpoint}' failed: {source}")]
    Request {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// 非 2xx 响应
    #[error("'{endpoint}' returned HTTP {status}")]
    Status { endpoint: String, status: u16 },

    /// 响应体不是记录列表
    #[error("'{endpoint}' returned an unexpected body: {message}")]
    Decode { endpoint: String, message: String },

    /// 请求超时
    #[error("'{endpoint}' timed out after {timeout_ms}ms")]
    Timeout { endpoint: String, timeout_ms: u64 },

    /// 客户端已关闭
    #[error("provider client is closed")]
    Closed,

    /// 客户端构建失败
    #[error("failed to build provider client: {0}")]
    Build(String),
}

impl From<ProviderError> for ContractError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Timeout {
                endpoint,
                timeout_ms,
            } => ContractError::UpstreamTimeout {
                endpoint,
                timeout_ms,
            },
            ProviderError::Request { ref endpoint, .. }
            | ProviderError::Status { ref endpoint, .. }
            | ProviderError::Decode { ref endpoint, .. } => {
                ContractError::upstream(endpoint.clone(), err.to_string())
            }
            ProviderError::Closed | ProviderError::Build(_) => {
                ContractError::upstream("client", err.to_string())
            }
        }
    }
}

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 必需数据 (position / laps) 拉取失败
    #[error("required upstream fetch '{endpoint}' failed: {source}")]
    Fetch {
        endpoint: &'static str,
        #[source]
        source: ContractError,
    },

    /// 整体拉取超时
    #[error("upstream fetch timed out after {timeout_secs}s")]
    FetchTimeout { timeout_secs: u64 },

    /// 会话查找失败
    #[error("session lookup failed: {0}")]
    Lookup(#[source] ContractError),

    /// 存储失败
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl IngestionError {
    /// Short label for metrics
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Fetch { .. } => "fetch",
            Self::FetchTimeout { .. } => "timeout",
            Self::Lookup(_) => "lookup",
            Self::Store(_) => "store",
        }
    }
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
