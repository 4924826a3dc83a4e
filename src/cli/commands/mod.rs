//! CLI command implementations.

mod config;
mod doctor;
mod models;
mod run;

pub use config::run_config;
pub use doctor::run_doctor;
pub use models::run_models;
pub use run::run_pipeline;
