//! Error types for the keeper churn pipeline

use thiserror::Error;

/// Result type alias for keeper operations
pub type Result<T> = std::result::Result<T, KeeperError>;

/// Main error type for the keeper pipeline
#[derive(Error, Debug)]
pub enum KeeperError {
    /// An expected column is missing, malformed, or the feature set drifted
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// An expected file or directory is absent
    #[error("Path not found: {0}")]
    PathError(String),

    /// Requested top-N does not fit the rated roster
    #[error("Requested {requested} models but only {available} were rated")]
    OutOfRangeError { requested: usize, available: usize },

    /// Ranking metric is not one of the supported ones
    #[error("Invalid metric '{0}': expected one of mse, mae, r2_score")]
    InvalidMetricError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Chart error: {0}")]
    ChartError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<polars::error::PolarsError> for KeeperError {
    fn from(err: polars::error::PolarsError) -> Self {
        KeeperError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for KeeperError {
    fn from(err: serde_json::Error) -> Self {
        KeeperError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for KeeperError {
    fn from(err: ndarray::ShapeError) -> Self {
        KeeperError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

impl From<calamine::Error> for KeeperError {
    fn from(err: calamine::Error) -> Self {
        KeeperError::DataError(err.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for KeeperError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        KeeperError::DataError(err.to_string())
    }
}
