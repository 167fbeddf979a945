//! Model Select - train, compare and track regression models
//!
//! This crate runs a small model-selection experiment:
//! - Load a tabular dataset and split it into train/test partitions
//! - Fit each candidate estimator and score it on the held-out rows
//! - Record a tracking run per candidate and log the best fitted model
//!
//! # Modules
//!
//! - [`data`] - Feature tables, datasets and the seeded train/test split
//! - [`training`] - Estimator contract, metrics, linear / tree / forest models
//! - [`selection`] - Candidate comparison and best-model selection
//! - [`tracking`] - Experiment tracking (local store, MLflow REST client)
//! - [`experiment`] - Configuration and the end-to-end runner
//! - [`cli`] - Command-line interface
//! - [`utils`] - Data loading and small helpers

// Core error handling
pub mod error;

pub mod data;
pub mod training;
pub mod selection;
pub mod tracking;
pub mod experiment;

pub mod cli;
pub mod utils;

pub use error::{Result, SelectError};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::data::{train_test_split, Dataset, FeatureTable, TrainTestSplit};
    pub use crate::error::{Result, SelectError};
    pub use crate::experiment::{run, run_with_sink, RunConfig};
    pub use crate::selection::{
        Candidate, EvaluationReport, ModelSelector, SelectedModel, SelectionOutcome,
    };
    pub use crate::tracking::{
        connect, ActiveRun, ExperimentTracker, MlflowClient, ModelArtifact, RunStatus,
        TrackingSink,
    };
    pub use crate::training::{
        mean_squared_error, r2_score, EstimatorConfig, LinearRegression, MeanRegressor, Model,
        ModelType, RandomForest,
    };
    pub use crate::utils::DataLoader;
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use ndarray::array;

    #[test]
    fn test_prelude_pipeline() {
        let features = FeatureTable::new(
            vec!["rm".to_string()],
            array![[5.0], [6.0], [7.0], [8.0], [9.0], [10.0]],
        )
        .unwrap();
        let dataset = Dataset::new(features, array![10.0, 12.0, 14.0, 16.0, 18.0, 20.0], "medv").unwrap();
        let split = train_test_split(&dataset, 0.33, 42).unwrap();

        let mut model = LinearRegression::new();
        model.fit(split.train.features.values(), &split.train.target).unwrap();
        let pred = model.predict(split.test.features.values()).unwrap();
        assert!(mean_squared_error(&split.test.target, &pred).unwrap() < 1e-10);
    }
}
