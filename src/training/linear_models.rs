//! Ordinary least squares regression

use crate::error::{Result, SelectError};
use super::models::{check_feature_width, check_training_shape};
use super::{Model, ModelType};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Solve a symmetric positive-definite system `a * x = b` by Cholesky decomposition.
/// A near-singular matrix gets one retry with a tiny ridge on the diagonal.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    match cholesky_factor(a) {
        Some(l) => Some(cholesky_substitute(&l, b)),
        None => {
            let ridge = 1e-8 * a.diag().iter().map(|v| v.abs()).sum::<f64>() / n as f64;
            let mut a_reg = a.clone();
            for k in 0..n {
                a_reg[[k, k]] += ridge;
            }
            cholesky_factor(&a_reg).map(|l| cholesky_substitute(&l, b))
        }
    }
}

/// Lower-triangular `L` with `A = L * L^T`, or None if `A` is not positive definite
fn cholesky_factor(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    let mut l = Array2::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }

            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    Some(l)
}

fn cholesky_substitute(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = l.nrows();

    // Forward substitution: L * y = b
    let mut y = Array1::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * y[j];
        }
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // Backward substitution: L^T * x = y
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    x
}

/// Gauss-Jordan inversion with partial pivoting (fallback)
fn matrix_inverse(m: &Array2<f64>) -> Option<Array2<f64>> {
    let n = m.nrows();
    if n != m.ncols() {
        return None;
    }

    // Augmented matrix [M | I]
    let mut aug = Array2::zeros((n, 2 * n));
    for i in 0..n {
        for j in 0..n {
            aug[[i, j]] = m[[i, j]];
        }
        aug[[i, n + i]] = 1.0;
    }

    for col in 0..n {
        let mut max_row = col;
        for row in col + 1..n {
            if aug[[row, col]].abs() > aug[[max_row, col]].abs() {
                max_row = row;
            }
        }

        if max_row != col {
            for j in 0..2 * n {
                aug.swap([col, j], [max_row, j]);
            }
        }

        if aug[[col, col]].abs() < 1e-10 {
            return None;
        }

        let pivot = aug[[col, col]];
        for j in 0..2 * n {
            aug[[col, j]] /= pivot;
        }

        for row in 0..n {
            if row != col {
                let factor = aug[[row, col]];
                for j in 0..2 * n {
                    aug[[row, j]] -= factor * aug[[col, j]];
                }
            }
        }
    }

    let mut inv = Array2::zeros((n, n));
    for i in 0..n {
        for j in 0..n {
            inv[[i, j]] = aug[[i, n + j]];
        }
    }

    Some(inv)
}

/// Solve least squares via normal equations: (X^T X) w = X^T y.
/// Columns with no variance get a zero weight and are left out of the system.
fn solve_least_squares(x: &Array2<f64>, y: &Array1<f64>) -> Option<Array1<f64>> {
    let xtx = x.t().dot(x);
    let xty = x.t().dot(y);

    let max_diag = xtx.diag().iter().fold(0.0_f64, |acc, v| acc.max(*v));
    let active: Vec<usize> = (0..xtx.nrows())
        .filter(|&j| xtx[[j, j]] > 1e-12 * max_diag && xtx[[j, j]] > 0.0)
        .collect();

    let mut weights = Array1::zeros(xtx.nrows());
    if active.is_empty() {
        return Some(weights);
    }

    let n = active.len();
    let reduced_xtx = Array2::from_shape_fn((n, n), |(i, j)| xtx[[active[i], active[j]]]);
    let reduced_xty = Array1::from_shape_fn(n, |i| xty[active[i]]);

    let solved = cholesky_solve(&reduced_xtx, &reduced_xty)
        .or_else(|| matrix_inverse(&reduced_xtx).map(|inv| inv.dot(&reduced_xty)))?;

    for (i, &j) in active.iter().enumerate() {
        weights[j] = solved[i];
    }
    Some(weights)
}

/// Linear regression model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegression {
    /// Fitted coefficients (weights)
    pub coefficients: Option<Array1<f64>>,
    /// Fitted intercept (bias)
    pub intercept: Option<f64>,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearRegression {
    /// Create a new linear regression model
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
        }
    }

    /// Whether `fit` has completed
    pub fn is_fitted(&self) -> bool {
        self.coefficients.is_some()
    }

    /// Fit the model to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_training_shape(x, y)?;

        // Center so the intercept falls out of the means
        let x_mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| SelectError::TrainingError("empty feature matrix".to_string()))?;
        let y_mean = y.mean().unwrap_or(0.0);

        let x_centered = x - &x_mean.clone().insert_axis(Axis(0));
        let y_centered = y - y_mean;

        let coefficients = solve_least_squares(&x_centered, &y_centered).ok_or_else(|| {
            SelectError::ComputationError(
                "Matrix is singular, cannot solve least squares".to_string(),
            )
        })?;

        let intercept = y_mean - coefficients.dot(&x_mean);

        self.coefficients = Some(coefficients);
        self.intercept = Some(intercept);

        Ok(self)
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(SelectError::ModelNotFitted)?;
        check_feature_width(x, coefficients.len())?;

        Ok(x.dot(coefficients) + self.intercept.unwrap_or(0.0))
    }
}

impl Model for LinearRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        LinearRegression::fit(self, x, y)?;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        LinearRegression::predict(self, x)
    }

    fn model_type(&self) -> ModelType {
        ModelType::LinearRegression
    }

    fn params(&self) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert("solver".to_string(), "normal_equations".to_string());
        params
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
    fn test_linear_regression_recovers_line() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![3.0, 5.0, 7.0, 9.0, 11.0]; // y = 2x + 1

        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();

        let coef = model.coefficients.as_ref().unwrap();
        assert!((coef[0] - 2.0).abs() < 1e-9);
        assert!((model.intercept.unwrap() - 1.0).abs() < 1e-9);

        let pred = model.predict(&array![[6.0]]).unwrap();
        assert!((pred[0] - 13.0).abs() < 1e-9);
    }

    #[test]
    fn test_multiple_features() {
        let x = array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0], [2.0, 1.0], [1.0, 3.0]];
        let y = x.column(0).mapv(|a| 3.0 * a) + x.column(1).mapv(|b| -2.0 * b) + 0.5;

        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();

        let pred = model.predict(&x).unwrap();
        for (p, t) in pred.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-8);
        }
    }

    #[test]
    fn test_constant_feature_predicts_mean() {
        let x = array![[1.0], [1.0], [1.0]];
        let y = array![1.0, 2.0, 6.0];

        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();

        assert_eq!(model.coefficients.as_ref().unwrap()[0], 0.0);
        assert!((model.intercept.unwrap() - 3.0).abs() < 1e-12);
        let pred = model.predict(&array![[1.0], [5.0]]).unwrap();
        assert!((pred[0] - 3.0).abs() < 1e-12);
        assert!((pred[1] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_constant_column_next_to_informative_one() {
        let x = array![[2.0, 1.0], [2.0, 2.0], [2.0, 3.0], [2.0, 4.0]];
        let y = array![3.0, 5.0, 7.0, 9.0]; // y = 2 * x1 + 1

        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();

        let coef = model.coefficients.as_ref().unwrap();
        assert_eq!(coef[0], 0.0);
        assert!((coef[1] - 2.0).abs() < 1e-9);
        assert!((model.intercept.unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_shape_mismatch() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![1.0, 2.0];
        let err = LinearRegression::new().fit(&x, &y).unwrap_err();
        assert!(matches!(err, SelectError::ShapeError { .. }));
    }

    #[test]
    fn test_nan_in_training_data() {
        let x = array![[1.0], [f64::NAN], [3.0]];
        let y = array![1.0, 2.0, 3.0];
        assert!(LinearRegression::new().fit(&x, &y).is_err());
    }

    #[test]
    fn test_predict_before_fit() {
        let model = LinearRegression::new();
        assert!(matches!(
            model.predict(&array![[1.0]]),
            Err(SelectError::ModelNotFitted)
        ));
    }

    #[test]
    fn test_predict_wrong_width() {
        let mut model = LinearRegression::new();
        model.fit(&array![[1.0], [2.0], [3.0]], &array![1.0, 2.0, 3.0]).unwrap();
        assert!(model.predict(&array![[1.0, 2.0]]).is_err());
    }

    #[test]
    fn test_bytes_restore_fitted_model() {
        let mut model = LinearRegression::new();
        model.fit(&array![[1.0], [2.0], [4.0]], &array![2.0, 3.0, 5.0]).unwrap();

        let bytes = Model::to_bytes(&model).unwrap();
        let restored = LinearRegression::from_bytes(&bytes).unwrap();
        assert!(restored.is_fitted());
        assert_eq!(
            restored.predict(&array![[10.0]]).unwrap(),
            model.predict(&array![[10.0]]).unwrap()
        );
    }

    #[test]
    fn test_matrix_inverse_identity() {
        let m = array![[4.0, 7.0], [2.0, 6.0]];
        let inv = matrix_inverse(&m).unwrap();
        let product = m.dot(&inv);
        assert!((product[[0, 0]] - 1.0).abs() < 1e-10);
        assert!(product[[0, 1]].abs() < 1e-10);
        assert!(matrix_inverse(&array![[1.0, 2.0], [2.0, 4.0]]).is_none());
    }
}
