//! Command implementations.

mod ingest;
mod serve;
mod state;
mod validate;

pub use ingest::{run_ingest, run_load_race};
pub use serve::run_serve;
pub use state::{run_state, run_timeline};
pub use validate::run_validate;
