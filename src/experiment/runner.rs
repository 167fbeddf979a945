//! End-to-end selection run: load, split, compare, log

use std::time::Instant;

use tracing::info;

use crate::data::{train_test_split, Dataset};
use crate::error::Result;
use crate::selection::{ModelSelector, SelectionOutcome};
use crate::tracking::{connect, TrackingSink};
use crate::utils::DataLoader;
use super::RunConfig;

/// Run a selection against the tracking URI in `config`
pub fn run(config: &RunConfig) -> Result<SelectionOutcome> {
    config.validate()?;
    let sink = connect(&config.tracking_uri, config.http_timeout())?;
    run_with_sink(config, sink.as_ref())
}

/// Run a selection, logging to an already-open sink
pub fn run_with_sink(config: &RunConfig, sink: &dyn TrackingSink) -> Result<SelectionOutcome> {
    config.validate()?;
    let start = Instant::now();

    let df = DataLoader::new()
        .with_timeout(config.http_timeout())
        .load_auto(&config.data_source)?;
    let dataset = Dataset::from_frame(&df, &config.target_column, &config.feature_columns)?;
    let split = train_test_split(&dataset, config.test_size, config.random_state)?;

    let experiment_id = sink.set_experiment(&config.experiment_name)?;
    info!(
        experiment = %config.experiment_name,
        experiment_id = %experiment_id,
        candidates = config.models.len(),
        "Starting model selection"
    );

    let candidates = config.build_candidates(&split);
    let outcome = ModelSelector::new()
        .with_candidate_models(config.log_candidate_models)
        .select(candidates, sink)?;

    info!(
        best = outcome.best_model_name().unwrap_or("none"),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Model selection finished"
    );
    Ok(outcome)
}
