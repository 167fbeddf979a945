//! Experiment Tracker Implementation
//!
//! Track experiments, runs, metrics and model artifacts in-process, persisting
//! to a local directory.

use std::collections::HashMap;
use std::path::PathBuf;

use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::error::{Result, SelectError};
use crate::utils::now_millis;
use super::artifact::ModelArtifact;
use super::storage::{LocalStorage, StorageBackend};
use super::{RunStatus, TrackingSink};

/// Configuration for experiment tracking
#[derive(Debug, Clone)]
pub struct ExperimentConfig {
    /// Output directory for experiments
    pub output_dir: PathBuf,
    /// Enable artifact logging
    pub enable_artifacts: bool,
    /// Enable metrics history
    pub enable_metrics_history: bool,
    /// Persist experiments every time a run ends
    pub save_on_run_end: bool,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./mlruns"),
            enable_artifacts: true,
            enable_metrics_history: true,
            save_on_run_end: true,
        }
    }
}

// serde_json writes non-finite floats as null; read them back as NaN
fn nan_from_null<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

fn nan_map_from_null<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<HashMap<String, f64>, D::Error> {
    let raw = HashMap::<String, Option<f64>>::deserialize(deserializer)?;
    Ok(raw.into_iter().map(|(k, v)| (k, v.unwrap_or(f64::NAN))).collect())
}

/// A single metric value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    /// Metric name
    pub name: String,
    /// Metric value
    #[serde(deserialize_with = "nan_from_null")]
    pub value: f64,
    /// Step/epoch number
    pub step: u64,
    /// Timestamp (ms)
    pub timestamp: i64,
}

impl Metric {
    /// Create a new metric
    pub fn new(name: impl Into<String>, value: f64, step: u64) -> Self {
        Self {
            name: name.into(),
            value,
            step,
            timestamp: now_millis(),
        }
    }
}

/// A run within an experiment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// Run ID
    pub run_id: String,
    /// Run name
    pub run_name: String,
    /// Start time (ms)
    pub start_time: i64,
    /// End time (None if still running)
    pub end_time: Option<i64>,
    /// Parameters
    pub params: HashMap<String, String>,
    /// Latest metrics
    #[serde(deserialize_with = "nan_map_from_null")]
    pub metrics: HashMap<String, f64>,
    /// Metrics history
    pub metrics_history: Vec<Metric>,
    /// Tags
    pub tags: HashMap<String, String>,
    /// Artifact paths
    pub artifacts: Vec<String>,
    /// Status
    pub status: RunStatus,
}

impl Run {
    /// Create a new run
    pub fn new(run_name: impl Into<String>) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().simple().to_string(),
            run_name: run_name.into(),
            start_time: now_millis(),
            end_time: None,
            params: HashMap::new(),
            metrics: HashMap::new(),
            metrics_history: Vec::new(),
            tags: HashMap::new(),
            artifacts: Vec::new(),
            status: RunStatus::Running,
        }
    }
}

/// An experiment containing multiple runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    /// Experiment ID
    pub experiment_id: String,
    /// Experiment name
    pub name: String,
    /// Creation time (ms)
    pub created_at: i64,
    /// Runs in this experiment
    pub runs: Vec<Run>,
    /// Tags
    pub tags: HashMap<String, String>,
}

impl Experiment {
    /// Create a new experiment
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            experiment_id: uuid::Uuid::new_v4().simple().to_string(),
            name: name.into(),
            created_at: now_millis(),
            runs: Vec::new(),
            tags: HashMap::new(),
        }
    }

    /// Best run by a metric; ties keep the earliest run and NaN never wins
    pub fn best_run(&self, metric_name: &str, maximize: bool) -> Option<&Run> {
        let mut best: Option<(&Run, f64)> = None;
        for run in &self.runs {
            let Some(&value) = run.metrics.get(metric_name) else {
                continue;
            };
            let better = match best {
                None => !value.is_nan(),
                Some((_, current)) if maximize => value > current,
                Some((_, current)) => value < current,
            };
            if better {
                best = Some((run, value));
            }
        }
        best.map(|(run, _)| run)
    }

    /// Find a run by name
    pub fn run_by_name(&self, run_name: &str) -> Option<&Run> {
        self.runs.iter().find(|r| r.run_name == run_name)
    }
}

/// Experiment tracker
pub struct ExperimentTracker {
    config: ExperimentConfig,
    storage: Box<dyn StorageBackend>,

    // Current state
    current_experiment: RwLock<Option<String>>,
    current_run: RwLock<Option<Run>>,

    // All experiments by ID
    experiments: RwLock<HashMap<String, Experiment>>,
}

impl ExperimentTracker {
    /// Create a new experiment tracker
    pub fn new(config: ExperimentConfig) -> Self {
        let storage = Box::new(LocalStorage::new(config.output_dir.clone()));
        Self::with_storage(config, storage)
    }

    /// Create a tracker over a custom storage backend
    pub fn with_storage(config: ExperimentConfig, storage: Box<dyn StorageBackend>) -> Self {
        Self {
            config,
            storage,
            current_experiment: RwLock::new(None),
            current_run: RwLock::new(None),
            experiments: RwLock::new(HashMap::new()),
        }
    }

    /// Create with default configuration
    pub fn with_dir(output_dir: impl Into<PathBuf>) -> Self {
        let config = ExperimentConfig {
            output_dir: output_dir.into(),
            ..Default::default()
        };
        Self::new(config)
    }

    /// Open a tracker and load whatever was persisted before
    pub fn open(config: ExperimentConfig) -> Result<Self> {
        let tracker = Self::new(config);
        tracker.load()?;
        Ok(tracker)
    }

    /// Create a new experiment and make it current
    pub fn create_experiment(&self, name: impl Into<String>) -> String {
        let experiment = Experiment::new(name);
        let experiment_id = experiment.experiment_id.clone();

        self.experiments.write().insert(experiment_id.clone(), experiment);
        *self.current_experiment.write() = Some(experiment_id.clone());

        experiment_id
    }

    /// Get the current run
    pub fn current_run(&self) -> Option<Run> {
        self.current_run.read().clone()
    }

    /// Get the current experiment
    pub fn current_experiment(&self) -> Option<Experiment> {
        let id = self.current_experiment.read().clone()?;
        self.get_experiment(&id)
    }

    /// Get an experiment by ID
    pub fn get_experiment(&self, experiment_id: &str) -> Option<Experiment> {
        self.experiments.read().get(experiment_id).cloned()
    }

    /// Get an experiment by name
    pub fn get_experiment_by_name(&self, name: &str) -> Option<Experiment> {
        self.experiments.read().values().find(|e| e.name == name).cloned()
    }

    /// List all experiments
    pub fn list_experiments(&self) -> Vec<Experiment> {
        self.experiments.read().values().cloned().collect()
    }

    /// Save current state to storage
    pub fn save(&self) -> Result<()> {
        let experiments: Vec<Experiment> = self.list_experiments();
        self.storage.save_experiments(&experiments)
    }

    /// Load state from storage
    pub fn load(&self) -> Result<()> {
        let experiments = self.storage.load_experiments()?;

        let mut stored = self.experiments.write();
        for exp in experiments {
            stored.insert(exp.experiment_id.clone(), exp);
        }

        Ok(())
    }

    fn with_run<T>(&self, f: impl FnOnce(&mut Run) -> T) -> Result<T> {
        let mut guard = self.current_run.write();
        let run = guard
            .as_mut()
            .ok_or_else(|| SelectError::TrackingError("no active run".to_string()))?;
        Ok(f(run))
    }
}

impl TrackingSink for ExperimentTracker {
    fn set_experiment(&self, name: &str) -> Result<String> {
        if let Some(existing) = self.get_experiment_by_name(name) {
            *self.current_experiment.write() = Some(existing.experiment_id.clone());
            return Ok(existing.experiment_id);
        }
        Ok(self.create_experiment(name))
    }

    fn start_run(&self, run_name: &str) -> Result<String> {
        if self.current_experiment.read().is_none() {
            return Err(SelectError::TrackingError(
                "set an experiment before starting a run".to_string(),
            ));
        }

        let mut current = self.current_run.write();
        if let Some(active) = current.as_ref() {
            return Err(SelectError::TrackingError(format!(
                "run '{}' is still active",
                active.run_name
            )));
        }

        let run = Run::new(run_name);
        let run_id = run.run_id.clone();
        debug!(run_id = %run_id, run_name, "Started local run");
        *current = Some(run);

        Ok(run_id)
    }

    fn log_param(&self, key: &str, value: &str) -> Result<()> {
        self.with_run(|r| {
            r.params.insert(key.to_string(), value.to_string());
        })
    }

    fn log_metric(&self, key: &str, value: f64) -> Result<()> {
        let keep_history = self.config.enable_metrics_history;
        self.with_run(|r| {
            r.metrics.insert(key.to_string(), value);
            if keep_history {
                let step = r.metrics_history.iter().filter(|m| m.name == key).count() as u64;
                r.metrics_history.push(Metric::new(key, value, step));
            }
        })
    }

    fn set_tag(&self, key: &str, value: &str) -> Result<()> {
        self.with_run(|r| {
            r.tags.insert(key.to_string(), value.to_string());
        })
    }

    fn log_model(&self, artifact: &ModelArtifact) -> Result<()> {
        if !self.config.enable_artifacts {
            debug!(artifact_path = %artifact.artifact_path, "Artifact logging disabled, skipping");
            return Ok(());
        }

        let experiment_id = self
            .current_experiment
            .read()
            .clone()
            .ok_or_else(|| SelectError::TrackingError("no active experiment".to_string()))?;
        let run_id = self.with_run(|r| r.run_id.clone())?;

        for (file_name, contents) in artifact.files(&run_id)? {
            self.storage.write_artifact(
                &experiment_id,
                &run_id,
                &artifact.artifact_path,
                &file_name,
                &contents,
            )?;
        }

        self.with_run(|r| r.artifacts.push(artifact.artifact_path.clone()))
    }

    fn end_run(&self, status: RunStatus) -> Result<()> {
        let mut run = self
            .current_run
            .write()
            .take()
            .ok_or_else(|| SelectError::TrackingError("no active run to end".to_string()))?;
        run.end_time = Some(now_millis());
        run.status = status;

        let experiment_id = self
            .current_experiment
            .read()
            .clone()
            .ok_or_else(|| SelectError::TrackingError("no active experiment".to_string()))?;

        {
            let mut experiments = self.experiments.write();
            let experiment = experiments.get_mut(&experiment_id).ok_or_else(|| {
                SelectError::TrackingError(format!("experiment {} disappeared", experiment_id))
            })?;
            debug!(run_id = %run.run_id, ?status, "Ended local run");
            experiment.runs.push(run);
        }

        if self.config.save_on_run_end {
            self.save()?;
        }
        Ok(())
    }
}
