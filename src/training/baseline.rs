//! Constant-prediction baseline

use crate::error::{Result, SelectError};
use super::models::{check_feature_width, check_training_shape};
use super::{Model, ModelType};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Predicts the mean of the training target for every row
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeanRegressor {
    mean: Option<f64>,
    n_features: usize,
}

impl MeanRegressor {
    pub fn new() -> Self {
        Self::default()
    }

    /// The fitted constant, if any
    pub fn constant(&self) -> Option<f64> {
        self.mean
    }
}

impl Model for MeanRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_shape(x, y)?;
        self.mean = y.mean();
        self.n_features = x.ncols();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let mean = self.mean.ok_or(SelectError::ModelNotFitted)?;
        check_feature_width(x, self.n_features)?;
        Ok(Array1::from_elem(x.nrows(), mean))
    }

    fn model_type(&self) -> ModelType {
        ModelType::Mean
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_predicts_training_mean() {
        let mut model = MeanRegressor::new();
        model.fit(&array![[1.0], [2.0], [3.0]], &array![2.0, 4.0, 9.0]).unwrap();

        assert_eq!(model.constant(), Some(5.0));
        assert_eq!(model.predict(&array![[0.0], [100.0]]).unwrap(), array![5.0, 5.0]);
    }

    #[test]
    fn test_unfitted() {
        assert!(MeanRegressor::new().predict(&array![[1.0]]).is_err());
    }
}
