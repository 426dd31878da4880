//! Error types for the preparation pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PrepError>;

/// Main error type for the preparation pipeline
#[derive(Error, Debug)]
pub enum PrepError {
    #[error("Data load error: {0}")]
    DataLoad(String),

    #[error("Imputation error: column '{column}' has no non-missing training value")]
    Imputation { column: String },

    #[error("Scaling error: column '{column}': {reason}")]
    Scaling { column: String, reason: String },

    #[error("Feature selection config error: requested {requested} features, only {available} available")]
    FeatureSelectionConfig { requested: usize, available: usize },

    #[error("Partition error: {0}")]
    Partition(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Data error: {0}")]
    Data(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Transformer not fitted")]
    NotFitted,
}

impl From<polars::error::PolarsError> for PrepError {
    fn from(err: polars::error::PolarsError) -> Self {
        PrepError::Data(err.to_string())
    }
}

impl From<serde_json::Error> for PrepError {
    fn from(err: serde_json::Error) -> Self {
        PrepError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for PrepError {
    fn from(err: ndarray::ShapeError) -> Self {
        PrepError::Data(format!("invalid shape: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PrepError::Imputation { column: "Age".to_string() };
        assert_eq!(
            err.to_string(),
            "Imputation error: column 'Age' has no non-missing training value"
        );

        let err = PrepError::FeatureSelectionConfig { requested: 19, available: 3 };
        assert!(err.to_string().contains("requested 19"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PrepError = io_err.into();
        assert!(matches!(err, PrepError::Io(_)));
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: PrepError = json_err.into();
        assert!(matches!(err, PrepError::Serialization(_)));
    }
}
