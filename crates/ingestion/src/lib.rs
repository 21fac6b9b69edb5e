//! # Ingestion Pipeline
//!
//! 上游遥测数据导入模块。
//!
//! Responsibilities:
//! - Fetch position / car_data / laps of a session from the provider
//! - Normalize raw records (timestamps, malformed records)
//! - Persist each session once, in one store transaction
//! - Resolve free-form race names to race sessions
//!
//! ## Usage Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ingestion::{IngestionConfig, IngestionPipeline, OpenF1Client, SessionDetails};
//!
//! let provider = Arc::new(OpenF1Client::new(&config.upstream)?);
//! let pipeline = IngestionPipeline::new(provider, store, IngestionConfig::from(&config.upstream));
//! pipeline.ingest_session("9158", SessionDetails::named(Some("Bahrain GP"), None)).await?;
//! ```

mod config;
mod error;
mod in_flight;
pub mod mock;
pub mod normalize;
mod openf1;
mod pipeline;
mod race_name;

// Re-exports
pub use config::{IngestionConfig, IngestionMetrics, MetricsSnapshot};
pub use error::{IngestionError, ProviderError, Result};
pub use in_flight::{InFlight, InFlightPermit};
pub use mock::{MockConfig, MockProvider, MockSession};
pub use openf1::OpenF1Client;
pub use pipeline::{IngestOutcome, IngestReport, IngestionPipeline, SessionDetails};
pub use race_name::{parse_race_name, RaceQuery};
