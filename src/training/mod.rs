//! Model training module
//!
//! Provides the estimator contract, regression metrics and the estimators a
//! selection pass can compare:
//! - Linear models (OLS)
//! - Decision trees and Random Forests
//! - A mean baseline

mod config;
mod models;
pub mod baseline;
pub mod decision_tree;
pub mod linear_models;
pub mod random_forest;

pub use baseline::MeanRegressor;
pub use config::{EstimatorConfig, ModelType};
pub use decision_tree::{DecisionTree, TreeNode};
pub use linear_models::LinearRegression;
pub use models::{mean_squared_error, r2_score, Model};
pub use random_forest::RandomForest;
