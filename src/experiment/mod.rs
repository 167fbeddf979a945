//! Selection runs wired from configuration
//!
//! [`RunConfig`] gathers defaults, environment overrides and config files;
//! [`run`] loads the data, builds the candidates and hands them to the
//! selector.

mod config;
mod runner;

pub use config::{
    RunConfig, DEFAULT_DATA_SOURCE, ENV_DATA_SOURCE, ENV_EXPERIMENT_NAME, ENV_TRACKING_URI,
};
pub use runner::{run, run_with_sink};
