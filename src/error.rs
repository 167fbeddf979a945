//! Error types for model selection runs

use thiserror::Error;

/// Result type alias for selection operations
pub type Result<T> = std::result::Result<T, SelectError>;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum SelectError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Tracking error: {0}")]
    TrackingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Computation error: {0}")]
    ComputationError(String),
}

impl SelectError {
    /// True for failures raised while fitting or predicting with an estimator
    pub fn is_fit_error(&self) -> bool {
        matches!(
            self,
            SelectError::TrainingError(_)
                | SelectError::ShapeError { .. }
                | SelectError::ComputationError(_)
                | SelectError::ModelNotFitted
        )
    }
}

impl From<polars::error::PolarsError> for SelectError {
    fn from(err: polars::error::PolarsError) -> Self {
        SelectError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for SelectError {
    fn from(err: serde_json::Error) -> Self {
        SelectError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for SelectError {
    fn from(err: ndarray::ShapeError) -> Self {
        SelectError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for SelectError {
    fn from(err: reqwest::Error) -> Self {
        SelectError::HttpError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SelectError::DataError("test error".to_string());
        assert_eq!(err.to_string(), "Data error: test error");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: SelectError = io_err.into();
        assert!(matches!(err, SelectError::IoError(_)));
    }

    #[test]
    fn test_fit_error_classification() {
        assert!(SelectError::ModelNotFitted.is_fit_error());
        assert!(SelectError::TrainingError("boom".into()).is_fit_error());
        assert!(!SelectError::TrackingError("down".into()).is_fit_error());
        assert!(!SelectError::DataError("missing".into()).is_fit_error());
    }
}
