//! # Replay Engine
//!
//! 时间重建引擎。
//!
//! 负责：
//! - 给定任意时间戳，重建所有车辆的最佳已知状态
//! - 容差逐级扩大的最近匹配 (1s / 10s / 60s / 300s / 1800s)
//! - 领跑者检查与赛末短路，最终回退到最后已知位置
//! - 圈速时间线组装
//!
//! ## 使用示例
//!
//! ```ignore
//! use replay_engine::ReplayEngine;
//!
//! let engine = ReplayEngine::new(store.clone(), config.reconstruction.clone());
//! if let Some(state) = engine.state_at("9158", 1_678_025_000.0).await? {
//!     for car in &state.cars {
//!         println!("#{} P{} {:.0} km/h", car.driver_number, car.position, car.speed);
//!     }
//! }
//! ```

mod engine;
mod error;
mod memory;
mod nearest;
mod replay;
mod timeline;

pub use contracts::{CarState, ReconstructionConfig, ReconstructionTier, ReplayState, Timeline};
pub use engine::ReconstructionEngine;
pub use error::{ReplayError, Result};
pub use memory::MemorySampleSource;
pub use replay::ReplayEngine;
pub use timeline::build_timeline;
