//! OpenF1 HTTP client
//!
//! Thin JSON-over-HTTPS wrapper: every endpoint returns a list of records and
//! takes the session key as a query parameter.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use contracts::{
    ContractError, TelemetryProvider, UpstreamConfig, UpstreamRecord, UpstreamSession,
};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::error::ProviderError;
use crate::normalize::session_from_record;

/// Live upstream provider
pub struct OpenF1Client {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    closed: AtomicBool,
}

impl OpenF1Client {
    /// Build a client from the upstream settings
    pub fn new(config: &UpstreamConfig) -> Result<Self, ProviderError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("f1-replayer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Build(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout,
            closed: AtomicBool::new(false),
        })
    }

    /// Provider base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[instrument(name = "openf1_get", skip(self, query))]
    async fn get_records(
        &self,
        endpoint: &'static str,
        query: &[(&str, String)],
    ) -> Result<Vec<UpstreamRecord>, ProviderError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ProviderError::Closed);
        }

        let result = self.fetch(endpoint, query).await;
        observability::record_upstream_request(endpoint, result.is_ok());
        match &result {
            Ok(records) => debug!(endpoint, records = records.len(), "Upstream fetch done"),
            Err(e) => warn!(endpoint, error = %e, "Upstream fetch failed"),
        }
        result
    }

    async fn fetch(
        &self,
        endpoint: &'static str,
        query: &[(&str, String)],
    ) -> Result<Vec<UpstreamRecord>, ProviderError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let request_error = |source: reqwest::Error| {
            if source.is_timeout() {
                ProviderError::Timeout {
                    endpoint: endpoint.to_string(),
                    timeout_ms: self.timeout.as_millis() as u64,
                }
            } else {
                ProviderError::Request {
                    endpoint: endpoint.to_string(),
                    source,
                }
            }
        };

        let response = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        let body: Value = response.json().await.map_err(request_error)?;
        records_from_body(endpoint, body)
    }
}

/// Split a response body into object records, ignoring non-object entries
fn records_from_body(endpoint: &str, body: Value) -> Result<Vec<UpstreamRecord>, ProviderError> {
    match body {
        Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(record) => Some(record),
                _ => None,
            })
            .collect()),
        other => Err(ProviderError::Decode {
            endpoint: endpoint.to_string(),
            message: format!("expected a JSON array, got {}", value_kind(&other)),
        }),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn session_query(session_key: &str) -> [(&'static str, String); 1] {
    [("session_key", session_key.to_string())]
}

impl TelemetryProvider for OpenF1Client {
    fn name(&self) -> &str {
        "openf1"
    }

    async fn sessions(
        &self,
        year: i32,
        country: &str,
    ) -> Result<Vec<UpstreamSession>, ContractError> {
        let query = [
            ("year", year.to_string()),
            ("country_name", country.to_string()),
        ];
        let records = self.get_records("sessions", &query).await?;
        Ok(records.iter().filter_map(session_from_record).collect())
    }

    async fn positions(&self, session_key: &str) -> Result<Vec<UpstreamRecord>, ContractError> {
        Ok(self
            .get_records("position", &session_query(session_key))
            .await?)
    }

    async fn car_data(&self, session_key: &str) -> Result<Vec<UpstreamRecord>, ContractError> {
        Ok(self
            .get_records("car_data", &session_query(session_key))
            .await?)
    }

    async fn laps(&self, session_key: &str) -> Result<Vec<UpstreamRecord>, ContractError> {
        Ok(self.get_records("laps", &session_query(session_key)).await?)
    }

    async fn close(&self) -> Result<(), ContractError> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(base_url = %self.base_url, "OpenF1 client closed");
        }
        Ok(())
    }
}
