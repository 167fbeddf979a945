//! Estimator selection and hyperparameters

use crate::error::{Result, SelectError};
use super::{DecisionTree, LinearRegression, MeanRegressor, Model, RandomForest};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Type of model to train
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelType {
    /// Ordinary least squares
    LinearRegression,
    /// Bagged regression trees
    RandomForest,
    /// Single regression tree
    DecisionTree,
    /// Predicts the training-target mean
    Mean,
}

impl ModelType {
    /// Display name used as the candidate and run name
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelType::LinearRegression => "Linear Regression",
            ModelType::RandomForest => "Random Forest",
            ModelType::DecisionTree => "Decision Tree",
            ModelType::Mean => "Mean Baseline",
        }
    }

    /// Build an unfitted estimator of this type
    pub fn build(&self, config: &EstimatorConfig) -> Box<dyn Model> {
        match self {
            ModelType::LinearRegression => Box::new(LinearRegression::new()),
            ModelType::RandomForest => {
                let mut rf = RandomForest::new_regressor(config.n_estimators)
                    .with_min_samples_split(config.min_samples_split)
                    .with_min_samples_leaf(config.min_samples_leaf);
                if let Some(depth) = config.max_depth {
                    rf = rf.with_max_depth(depth);
                }
                if let Some(seed) = config.random_state {
                    rf = rf.with_random_state(seed);
                }
                Box::new(rf)
            }
            ModelType::DecisionTree => {
                let mut tree = DecisionTree::new_regressor()
                    .with_min_samples_split(config.min_samples_split)
                    .with_min_samples_leaf(config.min_samples_leaf);
                if let Some(depth) = config.max_depth {
                    tree = tree.with_max_depth(depth);
                }
                Box::new(tree)
            }
            ModelType::Mean => Box::new(MeanRegressor::new()),
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ModelType {
    type Err = SelectError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "linear" | "linear_regression" | "ols" => Ok(ModelType::LinearRegression),
            "random_forest" | "rf" | "forest" => Ok(ModelType::RandomForest),
            "decision_tree" | "tree" => Ok(ModelType::DecisionTree),
            "mean" | "baseline" | "dummy" => Ok(ModelType::Mean),
            other => Err(SelectError::InvalidParameter {
                name: "model".to_string(),
                value: other.to_string(),
                reason: "expected one of linear, random_forest, decision_tree, mean".to_string(),
            }),
        }
    }
}

/// Hyperparameters shared by the estimators
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Number of trees (for the forest)
    pub n_estimators: usize,
    /// Maximum depth of trees
    pub max_depth: Option<usize>,
    /// Minimum samples to split a node
    pub min_samples_split: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Random seed for reproducibility
    pub random_state: Option<u64>,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            random_state: Some(42),
        }
    }
}
