//! # Telemetry Store
//!
//! 遥测数据持久化模块 (SQLite)。
//!
//! 负责：
//! - 会话元数据与 position / car_data / lap_times 三张追加表
//! - 单写线程 + 只读连接池，WAL 模式下读不阻塞写
//! - 为重建引擎提供按时间窗口的扫描原语 (`SampleSource`)

mod error;
mod metrics;
mod reader;
mod schema;
mod store;
mod writer;

pub use contracts::{SampleSource, SessionMetadata, TelemetryBatch};
pub use error::{Result, StoreError};
pub use metrics::{MetricsSnapshot, StoreMetrics};
pub use reader::{RowCounts, StoreReader, TimelineRows};
pub use store::TelemetryStore;
