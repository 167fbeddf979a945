//! Model Select - Main Entry Point
//!
//! Trains the configured candidates, logs each run and the best model to the
//! experiment tracker.

use clap::Parser;
use model_select::cli::{cmd_run, Cli};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "model_select=info".into()),
        )
        .init();

    let cli = Cli::parse();
    cmd_run(&cli)
}
