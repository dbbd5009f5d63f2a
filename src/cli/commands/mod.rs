//! CLI command implementations.

mod batch;
mod catalog;
mod config;
mod doctor;
mod process;
mod serve;

pub use batch::{run_batch, BatchSummary};
pub use catalog::run_catalog;
pub use config::run_config;
pub use doctor::run_doctor;
pub use process::run_process;
pub use serve::{create_router, run_serve, ApiError, AppState};
