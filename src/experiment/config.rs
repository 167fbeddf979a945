//! Run configuration

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::data::TrainTestSplit;
use crate::error::{Result, SelectError};
use crate::selection::Candidate;
use crate::training::{EstimatorConfig, ModelType};

/// Boston Housing, as published in the selva86 datasets repository
pub const DEFAULT_DATA_SOURCE: &str =
    "https://raw.githubusercontent.com/selva86/datasets/master/BostonHousing.csv";

pub const ENV_TRACKING_URI: &str = "MLFLOW_TRACKING_URI";
pub const ENV_EXPERIMENT_NAME: &str = "MLFLOW_EXPERIMENT_NAME";
pub const ENV_DATA_SOURCE: &str = "MODEL_SELECT_DATA";

/// Everything a selection run needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// CSV path or http(s) URL
    pub data_source: String,
    pub target_column: String,
    pub feature_columns: Vec<String>,
    /// Fraction of rows held out for scoring
    pub test_size: f64,
    /// Seed for the split and for seeded estimators
    pub random_state: u64,
    pub experiment_name: String,
    /// `http(s)://` for an MLflow server, otherwise a local directory
    pub tracking_uri: String,
    /// Candidates, in evaluation order
    pub models: Vec<ModelType>,
    pub n_estimators: usize,
    pub log_candidate_models: bool,
    pub http_timeout_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            data_source: DEFAULT_DATA_SOURCE.to_string(),
            target_column: "medv".to_string(),
            feature_columns: vec!["rm".to_string()],
            test_size: 0.33,
            random_state: 42,
            experiment_name: "LR_RF1".to_string(),
            tracking_uri: "http://127.0.0.1:5000".to_string(),
            models: vec![ModelType::LinearRegression, ModelType::RandomForest],
            n_estimators: 100,
            log_candidate_models: false,
            http_timeout_secs: 30,
        }
    }
}

impl RunConfig {
    /// Defaults with environment overrides applied
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Apply overrides from a variable lookup; empty values are ignored
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(uri) = get(ENV_TRACKING_URI) {
            self.tracking_uri = uri;
        }
        if let Some(name) = get(ENV_EXPERIMENT_NAME) {
            self.experiment_name = name;
        }
        if let Some(source) = get(ENV_DATA_SOURCE) {
            self.data_source = source;
        }
    }

    /// Read a JSON config; missing fields take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::default().overlay_file(path)
    }

    /// Replace only the fields the JSON file at `path` sets
    pub fn overlay_file(&self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_err = |e: &dyn std::fmt::Display| {
            SelectError::ConfigError(format!("{}: {}", path.display(), e))
        };

        let contents = fs::read_to_string(path).map_err(|e| config_err(&e))?;
        let overrides: Value = serde_json::from_str(&contents).map_err(|e| config_err(&e))?;
        let Value::Object(overrides) = overrides else {
            return Err(config_err(&"expected a JSON object"));
        };

        let mut merged = serde_json::to_value(self)?;
        if let Value::Object(fields) = &mut merged {
            fields.extend(overrides);
        }
        serde_json::from_value(merged).map_err(|e| config_err(&e))
    }

    /// Check that the configuration describes a runnable selection
    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(SelectError::InvalidParameter {
                name: "test_size".to_string(),
                value: self.test_size.to_string(),
                reason: "must lie strictly between 0 and 1".to_string(),
            });
        }
        if self.feature_columns.is_empty() {
            return Err(SelectError::ConfigError("no feature columns given".to_string()));
        }
        if self.feature_columns.contains(&self.target_column) {
            return Err(SelectError::ConfigError(format!(
                "target '{}' is also listed as a feature",
                self.target_column
            )));
        }
        if self.models.is_empty() {
            return Err(SelectError::ConfigError("no models to compare".to_string()));
        }

        let mut seen = HashSet::new();
        if let Some(dup) = self.models.iter().find(|m| !seen.insert(**m)) {
            return Err(SelectError::ConfigError(format!("model '{}' listed twice", dup)));
        }

        if self.n_estimators == 0 {
            return Err(SelectError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
                reason: "a forest needs at least one tree".to_string(),
            });
        }
        if self.experiment_name.trim().is_empty() {
            return Err(SelectError::ConfigError("experiment name is empty".to_string()));
        }
        if self.http_timeout_secs == 0 {
            return Err(SelectError::ConfigError("http timeout must be positive".to_string()));
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn estimator_config(&self) -> EstimatorConfig {
        EstimatorConfig {
            n_estimators: self.n_estimators,
            random_state: Some(self.random_state),
            ..Default::default()
        }
    }

    /// One unfitted candidate per configured model, all sharing `split`
    pub fn build_candidates(&self, split: &TrainTestSplit) -> Vec<Candidate> {
        let estimator_config = self.estimator_config();
        self.models
            .iter()
            .map(|model| {
                Candidate::new(
                    model.display_name(),
                    model.build(&estimator_config),
                    split.train.clone(),
                    split.test.clone(),
                )
            })
            .collect()
    }
}
