//! Experiment Tracking Module
//!
//! Provides experiment tracking similar to MLflow: a [`TrackingSink`]
//! contract, a local file-backed [`ExperimentTracker`] and an
//! [`MlflowClient`] for a remote tracking server.

mod artifact;
mod mlflow;
mod storage;
mod tracker;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, SelectError};

pub use artifact::{
    ColSpec, ModelArtifact, ModelSignature, INPUT_EXAMPLE_FILE, MLMODEL_FILE, MODEL_DATA_FILE,
};
pub use mlflow::MlflowClient;
pub use storage::{LocalStorage, StorageBackend};
pub use tracker::{Experiment, ExperimentConfig, ExperimentTracker, Metric, Run};

/// Run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
    Killed,
}

impl RunStatus {
    /// Name used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Finished => "FINISHED",
            RunStatus::Failed => "FAILED",
            RunStatus::Killed => "KILLED",
        }
    }
}

/// Destination for experiment runs, params, metrics and model artifacts
pub trait TrackingSink: Send + Sync {
    /// Make `name` the current experiment, creating it if missing
    fn set_experiment(&self, name: &str) -> Result<String>;

    /// Start a named run in the current experiment
    fn start_run(&self, run_name: &str) -> Result<String>;

    fn log_param(&self, key: &str, value: &str) -> Result<()>;

    fn log_metric(&self, key: &str, value: f64) -> Result<()>;

    fn set_tag(&self, key: &str, value: &str) -> Result<()>;

    /// Store a model artifact under the active run
    fn log_model(&self, artifact: &ModelArtifact) -> Result<()>;

    /// Close the active run
    fn end_run(&self, status: RunStatus) -> Result<()>;
}

/// An open run that is closed when dropped.
///
/// [`ActiveRun::finish`] ends it as finished; any other way out of scope,
/// including `?` on an error, ends it as failed.
pub struct ActiveRun<'a> {
    sink: &'a dyn TrackingSink,
    run_id: String,
    run_name: String,
    closed: bool,
}

impl<'a> ActiveRun<'a> {
    pub fn start(sink: &'a dyn TrackingSink, run_name: &str) -> Result<Self> {
        let run_id = sink.start_run(run_name)?;
        debug!(run_id = %run_id, run_name, "Run started");
        Ok(Self {
            sink,
            run_id,
            run_name: run_name.to_string(),
            closed: false,
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn log_param(&self, key: &str, value: &str) -> Result<()> {
        self.sink.log_param(key, value)
    }

    pub fn log_metric(&self, key: &str, value: f64) -> Result<()> {
        self.sink.log_metric(key, value)
    }

    pub fn set_tag(&self, key: &str, value: &str) -> Result<()> {
        self.sink.set_tag(key, value)
    }

    pub fn log_model(&self, artifact: &ModelArtifact) -> Result<()> {
        self.sink.log_model(artifact)
    }

    /// End the run as finished
    pub fn finish(mut self) -> Result<()> {
        self.closed = true;
        self.sink.end_run(RunStatus::Finished)
    }
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.sink.end_run(RunStatus::Failed) {
            warn!(run_id = %self.run_id, run_name = %self.run_name, error = %e, "Could not close failed run");
        }
    }
}

/// Open the sink a tracking URI points at.
///
/// `http(s)://` selects an MLflow server; `file://<dir>` or a bare path
/// selects the local tracker rooted at that directory.
pub fn connect(tracking_uri: &str, timeout: Duration) -> Result<Box<dyn TrackingSink>> {
    let uri = tracking_uri.trim();
    if uri.is_empty() {
        return Err(SelectError::ConfigError("tracking uri is empty".to_string()));
    }

    let lower = uri.to_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Ok(Box::new(MlflowClient::new(uri, timeout)?));
    }

    let dir = uri.strip_prefix("file://").unwrap_or(uri);
    let tracker = ExperimentTracker::open(ExperimentConfig {
        output_dir: dir.into(),
        ..Default::default()
    })?;
    Ok(Box::new(tracker))
}
