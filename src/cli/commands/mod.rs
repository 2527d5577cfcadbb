//! CLI command implementations.

mod config;
mod run;
mod serve;
mod verify;

pub use config::run_config;
pub use run::run_query;
pub use serve::{router, run_serve, AppState};
pub use verify::run_verify;
