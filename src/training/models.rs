//! Model trait and regression metrics

use crate::error::{Result, SelectError};
use super::ModelType;
use ndarray::{Array1, Array2};
use std::collections::BTreeMap;

/// Mean squared error between actual and predicted targets
pub fn mean_squared_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let n = y_true.len() as f64;
    let sse: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    Ok(sse / n)
}

/// Coefficient of determination.
///
/// A constant target gives 1.0 when predicted exactly and 0.0 otherwise.
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let n = y_true.len() as f64;
    let y_mean = y_true.sum() / n;

    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }
    Ok(1.0 - ss_res / ss_tot)
}

fn check_lengths(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<()> {
    if y_true.len() != y_pred.len() {
        return Err(SelectError::ShapeError {
            expected: format!("{} predictions", y_true.len()),
            actual: format!("{} predictions", y_pred.len()),
        });
    }
    if y_true.is_empty() {
        return Err(SelectError::ComputationError(
            "cannot score an empty prediction set".to_string(),
        ));
    }
    Ok(())
}

/// Capability contract shared by every estimator
pub trait Model: Send + Sync {
    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Make predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Which estimator family this is
    fn model_type(&self) -> ModelType;

    /// Hyperparameters, rendered as strings for logging
    fn params(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    /// Get feature importances (if available)
    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }

    /// Save model to bytes
    fn to_bytes(&self) -> Result<Vec<u8>>;

    /// Load model from bytes
    fn from_bytes(bytes: &[u8]) -> Result<Self>
    where
        Self: Sized;
}

/// Reject X/y pairs whose row counts disagree or are empty
pub(crate) fn check_training_shape(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(SelectError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(SelectError::TrainingError(format!(
            "cannot fit on an empty matrix ({} x {})",
            x.nrows(),
            x.ncols()
        )));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(SelectError::TrainingError(
            "training data contains NaN or infinite values".to_string(),
        ));
    }
    Ok(())
}

/// Reject feature matrices whose width differs from the fitted width
pub(crate) fn check_feature_width(x: &Array2<f64>, n_features: usize) -> Result<()> {
    if x.ncols() != n_features {
        return Err(SelectError::ShapeError {
            expected: format!("{} features", n_features),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}
