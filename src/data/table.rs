//! Named feature tables and target vectors

use crate::error::{Result, SelectError};
use ndarray::{s, Array1, Array2, Axis};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Row-major feature matrix with ordered column names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    columns: Vec<String>,
    values: Array2<f64>,
}

impl FeatureTable {
    /// Create a table, checking that every column has a name
    pub fn new(columns: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if columns.len() != values.ncols() {
            return Err(SelectError::ShapeError {
                expected: format!("{} columns", columns.len()),
                actual: format!("{} columns", values.ncols()),
            });
        }
        Ok(Self { columns, values })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_cols(&self) -> usize {
        self.values.ncols()
    }

    /// First `n` rows (fewer if the table is shorter), keeping column names
    pub fn head(&self, n: usize) -> FeatureTable {
        let n = n.min(self.n_rows());
        FeatureTable {
            columns: self.columns.clone(),
            values: self.values.slice(s![..n, ..]).to_owned(),
        }
    }

    /// Single-row table holding the first row
    pub fn first_row(&self) -> Result<FeatureTable> {
        if self.n_rows() == 0 {
            return Err(SelectError::DataError(
                "cannot take an example row from an empty table".to_string(),
            ));
        }
        Ok(self.head(1))
    }

    /// Rows at the given positions, in that order
    pub fn select_rows(&self, indices: &[usize]) -> FeatureTable {
        FeatureTable {
            columns: self.columns.clone(),
            values: self.values.select(Axis(0), indices),
        }
    }

    /// Split-oriented JSON: `{"columns": [...], "data": [[...], ...]}`
    pub fn to_split_json(&self) -> Value {
        let data: Vec<Vec<f64>> = self.values.rows().into_iter().map(|r| r.to_vec()).collect();
        json!({
            "columns": self.columns,
            "data": data,
        })
    }
}

/// Features plus the aligned target vector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub features: FeatureTable,
    pub target: Array1<f64>,
    pub target_name: String,
}

impl Dataset {
    pub fn new(features: FeatureTable, target: Array1<f64>, target_name: impl Into<String>) -> Result<Self> {
        if features.n_rows() != target.len() {
            return Err(SelectError::ShapeError {
                expected: format!("target length = {}", features.n_rows()),
                actual: format!("target length = {}", target.len()),
            });
        }
        Ok(Self {
            features,
            target,
            target_name: target_name.into(),
        })
    }

    /// Extract the named feature and target columns from a frame.
    ///
    /// An empty `feature_columns` selects every column except the target.
    pub fn from_frame(df: &DataFrame, target: &str, feature_columns: &[String]) -> Result<Self> {
        let feature_cols: Vec<String> = if feature_columns.is_empty() {
            df.get_column_names()
                .into_iter()
                .filter(|name| name.as_str() != target)
                .map(|name| name.to_string())
                .collect()
        } else {
            feature_columns.to_vec()
        };

        if feature_cols.is_empty() {
            return Err(SelectError::DataError(
                "table has no feature columns besides the target".to_string(),
            ));
        }

        let y = Array1::from_vec(column_to_vec(df, target)?);
        let x = columns_to_array2(df, &feature_cols)?;

        Self::new(FeatureTable::new(feature_cols, x)?, y, target)
    }

    pub fn len(&self) -> usize {
        self.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.target.is_empty()
    }

    /// Rows at the given positions
    pub fn select_rows(&self, indices: &[usize]) -> Dataset {
        Dataset {
            features: self.features.select_rows(indices),
            target: self.target.select(Axis(0), indices),
            target_name: self.target_name.clone(),
        }
    }
}

/// Read one column as f64, rejecting missing columns and null cells
fn column_to_vec(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = df
        .column(name)
        .map_err(|_| SelectError::FeatureNotFound(name.to_string()))?;
    let casted = column
        .cast(&DataType::Float64)
        .map_err(|e| SelectError::DataError(format!("column '{}': {}", name, e)))?;
    let values = casted
        .f64()
        .map_err(|e| SelectError::DataError(e.to_string()))?;

    if values.null_count() > 0 {
        return Err(SelectError::DataError(format!(
            "column '{}' has {} missing or non-numeric values",
            name,
            values.null_count()
        )));
    }

    Ok(values.into_iter().flatten().collect())
}

/// Named columns of a frame as a row-major matrix
pub fn columns_to_array2(df: &DataFrame, col_names: &[String]) -> Result<Array2<f64>> {
    let col_data: Vec<Vec<f64>> = col_names
        .iter()
        .map(|name| column_to_vec(df, name))
        .collect::<Result<_>>()?;

    Ok(Array2::from_shape_fn((df.height(), col_names.len()), |(r, c)| col_data[c][r]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn frame() -> DataFrame {
        df!(
            "rm" => &[6.5, 6.4, 7.1, 7.0],
            "lstat" => &[4.9, 9.1, 4.0, 2.9],
            "medv" => &[24.0, 21.6, 34.7, 33.4]
        )
        .unwrap()
    }

    #[test]
    fn test_from_frame_selected_columns() {
        let ds = Dataset::from_frame(&frame(), "medv", &["rm".to_string()]).unwrap();
        assert_eq!(ds.features.columns(), &["rm".to_string()]);
        assert_eq!(ds.features.values(), &array![[6.5], [6.4], [7.1], [7.0]]);
        assert_eq!(ds.target, array![24.0, 21.6, 34.7, 33.4]);
        assert_eq!(ds.target_name, "medv");
    }

    #[test]
    fn test_from_frame_all_features() {
        let ds = Dataset::from_frame(&frame(), "medv", &[]).unwrap();
        assert_eq!(ds.features.columns(), &["rm".to_string(), "lstat".to_string()]);
        assert_eq!(ds.features.n_cols(), 2);
    }

    #[test]
    fn test_missing_target() {
        let err = Dataset::from_frame(&frame(), "price", &["rm".to_string()]).unwrap_err();
        assert!(matches!(err, SelectError::FeatureNotFound(ref c) if c == "price"));
    }

    #[test]
    fn test_missing_feature() {
        let err = Dataset::from_frame(&frame(), "medv", &["crim".to_string()]).unwrap_err();
        assert!(matches!(err, SelectError::FeatureNotFound(_)));
    }

    #[test]
    fn test_null_cells_rejected() {
        let df = df!(
            "rm" => &[Some(6.5), None, Some(7.1)],
            "medv" => &[24.0, 21.6, 34.7]
        )
        .unwrap();
        let err = Dataset::from_frame(&df, "medv", &["rm".to_string()]).unwrap_err();
        assert!(matches!(err, SelectError::DataError(_)));
    }

    #[test]
    fn test_first_row_keeps_names() {
        let table = FeatureTable::new(
            vec!["a".to_string(), "b".to_string()],
            array![[1.0, 2.0], [3.0, 4.0]],
        )
        .unwrap();

        let row = table.first_row().unwrap();
        assert_eq!(row.n_rows(), 1);
        assert_eq!(row.columns(), table.columns());
        assert_eq!(row.to_split_json(), json!({"columns": ["a", "b"], "data": [[1.0, 2.0]]}));
    }

    #[test]
    fn test_head_shorter_table() {
        let table = FeatureTable::new(vec!["a".to_string()], array![[1.0], [2.0]]).unwrap();
        assert_eq!(table.head(5).n_rows(), 2);
    }

    #[test]
    fn test_first_row_of_empty_table() {
        let table = FeatureTable::new(vec!["a".to_string()], Array2::zeros((0, 1))).unwrap();
        assert!(table.first_row().is_err());
    }

    #[test]
    fn test_column_count_mismatch() {
        assert!(FeatureTable::new(vec!["a".to_string()], array![[1.0, 2.0]]).is_err());
    }
}
