//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the replayer workspace.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Time Model
//! - All persisted and derived timestamps are Unix epoch seconds (`f64`, UTC)
//! - `0.0` is the sentinel for an upstream timestamp that could not be parsed

mod config;
mod error;
mod provider;
mod reconstruction_config;
mod replay;
mod samples;
mod session;
mod source;

pub use config::*;
pub use error::*;
pub use provider::{LocalTelemetryProvider, TelemetryProvider, UpstreamRecord};
pub use reconstruction_config::*;
pub use replay::*;
pub use samples::*;
pub use session::*;
pub use source::SampleSource;
