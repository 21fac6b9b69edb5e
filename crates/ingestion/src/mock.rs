//! Mock 上游数据源
//!
//! 用于无网络环境的测试，支持注入失败场景。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use contracts::{ContractError, TelemetryProvider, UpstreamRecord, UpstreamSession};
use serde_json::{json, Value};
use tracing::{debug, instrument};

/// Mock 配置
#[derive(Debug, Default, Clone)]
pub struct MockConfig {
    /// position 请求失败
    pub fail_positions: bool,
    /// car_data 请求失败
    pub fail_car_data: bool,
    /// laps 请求失败
    pub fail_laps: bool,
    /// sessions 请求失败
    pub fail_sessions: bool,
    /// 每次请求前的延迟
    pub delay: Option<Duration>,
}

/// Raw records of one session
#[derive(Debug, Default, Clone)]
pub struct MockSession {
    pub positions: Vec<UpstreamRecord>,
    pub car_data: Vec<UpstreamRecord>,
    pub laps: Vec<UpstreamRecord>,
}

/// Per-endpoint call counters
#[derive(Debug, Default)]
struct CallCounts {
    sessions: AtomicU32,
    positions: AtomicU32,
    car_data: AtomicU32,
    laps: AtomicU32,
}

/// Mock 上游客户端
#[derive(Debug, Default)]
pub struct MockProvider {
    config: MockConfig,
    listings: Mutex<Vec<UpstreamSession>>,
    data: Mutex<HashMap<String, MockSession>>,
    calls: CallCounts,
    closed: AtomicBool,
}

impl MockProvider {
    /// 创建默认 mock
    pub fn new() -> Self {
        Self::with_config(MockConfig::default())
    }

    /// 使用配置创建 mock
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Register raw records for a session key
    pub fn insert_session(&self, session_key: &str, session: MockSession) {
        self.data
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session_key.to_string(), session);
    }

    /// Register a session listing entry
    pub fn add_listing(&self, session: UpstreamSession) {
        self.listings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(session);
    }

    /// Number of position fetches so far
    pub fn position_calls(&self) -> u32 {
        self.calls.positions.load(Ordering::SeqCst)
    }

    /// Number of data fetches (position, car_data, laps) so far
    pub fn fetch_calls(&self) -> u32 {
        self.calls.positions.load(Ordering::SeqCst)
            + self.calls.car_data.load(Ordering::SeqCst)
            + self.calls.laps.load(Ordering::SeqCst)
    }

    /// Number of session listing requests so far
    pub fn session_calls(&self) -> u32 {
        self.calls.sessions.load(Ordering::SeqCst)
    }

    /// Whether `close` was called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn respond(
        &self,
        endpoint: &'static str,
        counter: &AtomicU32,
        fail: bool,
        session_key: &str,
        pick: fn(&MockSession) -> &Vec<UpstreamRecord>,
    ) -> Result<Vec<UpstreamRecord>, ContractError> {
        counter.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.config.delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(ContractError::upstream(endpoint, "mock: injected failure"));
        }
        let data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        let records = data.get(session_key).map(pick).cloned().unwrap_or_default();
        debug!(endpoint, session_key, records = records.len(), "Mock fetch");
        Ok(records)
    }
}

impl TelemetryProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    #[instrument(name = "mock_sessions", skip(self))]
    async fn sessions(
        &self,
        year: i32,
        country: &str,
    ) -> Result<Vec<UpstreamSession>, ContractError> {
        self.calls.sessions.fetch_add(1, Ordering::SeqCst);
        if self.config.fail_sessions {
            return Err(ContractError::upstream("sessions", "mock: injected failure"));
        }
        let listings = self.listings.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(listings
            .iter()
            .filter(|s| s.year == year && s.country_name == country)
            .cloned()
            .collect())
    }

    async fn positions(&self, session_key: &str) -> Result<Vec<UpstreamRecord>, ContractError> {
        self.respond(
            "position",
            &self.calls.positions,
            self.config.fail_positions,
            session_key,
            |s| &s.positions,
        )
        .await
    }

    async fn car_data(&self, session_key: &str) -> Result<Vec<UpstreamRecord>, ContractError> {
        self.respond(
            "car_data",
            &self.calls.car_data,
            self.config.fail_car_data,
            session_key,
            |s| &s.car_data,
        )
        .await
    }

    async fn laps(&self, session_key: &str) -> Result<Vec<UpstreamRecord>, ContractError> {
        self.respond(
            "laps",
            &self.calls.laps,
            self.config.fail_laps,
            session_key,
            |s| &s.laps,
        )
        .await
    }

    async fn close(&self) -> Result<(), ContractError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

fn object(value: Value) -> UpstreamRecord {
    match value {
        Value::Object(record) => record,
        _ => UpstreamRecord::new(),
    }
}

/// Raw position record as the provider sends it
pub fn position_record(driver_number: u32, date: &str, position: u32) -> UpstreamRecord {
    object(json!({
        "driver_number": driver_number,
        "date": date,
        "position": position,
    }))
}

/// Raw car telemetry record as the provider sends it
pub fn car_data_record(
    driver_number: u32,
    date: &str,
    speed: f64,
    gear: i64,
    throttle: f64,
    brake: f64,
) -> UpstreamRecord {
    object(json!({
        "driver_number": driver_number,
        "date": date,
        "speed": speed,
        "n_gear": gear,
        "throttle": throttle,
        "brake": brake,
        "rpm": 11000,
        "drs": 0,
    }))
}

/// Raw lap record as the provider sends it
pub fn lap_record(
    driver_number: u32,
    lap_number: u32,
    lap_duration: f64,
    pit_in_time: Option<&str>,
) -> UpstreamRecord {
    object(json!({
        "driver_number": driver_number,
        "lap_number": lap_number,
        "lap_duration": lap_duration,
        "duration_sector_1": lap_duration * 0.3,
        "duration_sector_2": lap_duration * 0.4,
        "duration_sector_3": lap_duration * 0.3,
        "pit_in_time": pit_in_time,
    }))
}
