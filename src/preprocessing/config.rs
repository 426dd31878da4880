//! Pipeline configuration

use crate::error::{PrepError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use super::{FitScope, OutlierStrategy};

/// Label column of the elections dataset
pub const DEFAULT_LABEL: &str = "Vote";

/// Number of features kept by the selector unless configured otherwise
pub const DEFAULT_N_FEATURES: usize = 19;

/// Seed used when none is given, so repeated runs produce the same split
pub const DEFAULT_RANDOM_STATE: u64 = 42;

/// Configuration for the preparation pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Name of the label column, shared by all persisted tables
    pub label_column: String,

    /// Number of non-label features retained by feature selection
    pub n_features: usize,

    /// Seed for the partitioner; `None` draws from entropy
    pub random_state: Option<u64>,

    /// Fraction of all rows held out as the test partition
    pub test_fraction: f64,

    /// Fraction of the remaining rows held out as the validate partition
    pub validate_fraction: f64,

    /// Which partitions the scaler learns its mean/std from
    pub scaler_fit_scope: FitScope,

    /// Outlier handling applied before imputation
    pub outlier_strategy: OutlierStrategy,

    /// Upper bound on histogram bins when scoring continuous features
    pub mi_bins: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            label_column: DEFAULT_LABEL.to_string(),
            n_features: DEFAULT_N_FEATURES,
            random_state: Some(DEFAULT_RANDOM_STATE),
            test_fraction: 0.2,
            validate_fraction: 0.25,
            scaler_fit_scope: FitScope::TrainOnly,
            outlier_strategy: OutlierStrategy::None,
            mi_bins: 20,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON file; missing fields take defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Builder method to set the label column
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label_column = label.into();
        self
    }

    /// Builder method to set k for feature selection
    pub fn with_n_features(mut self, k: usize) -> Self {
        self.n_features = k;
        self
    }

    /// Builder method to fix the partitioning seed
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Builder method to partition with fresh entropy on every run
    pub fn unseeded(mut self) -> Self {
        self.random_state = None;
        self
    }

    /// Builder method to set the split fractions
    pub fn with_split(mut self, test_fraction: f64, validate_fraction: f64) -> Self {
        self.test_fraction = test_fraction;
        self.validate_fraction = validate_fraction;
        self
    }

    /// Builder method to set the scaler fit scope
    pub fn with_scaler_scope(mut self, scope: FitScope) -> Self {
        self.scaler_fit_scope = scope;
        self
    }

    /// Builder method to set outlier handling
    pub fn with_outliers(mut self, strategy: OutlierStrategy) -> Self {
        self.outlier_strategy = strategy;
        self
    }

    /// Check the configuration before any data is touched
    pub fn validate(&self) -> Result<()> {
        if self.label_column.trim().is_empty() {
            return Err(PrepError::Config("label column name is empty".to_string()));
        }
        if self.n_features == 0 {
            return Err(PrepError::Config("n_features must be at least 1".to_string()));
        }
        for (name, value) in [
            ("test_fraction", self.test_fraction),
            ("validate_fraction", self.validate_fraction),
        ] {
            if !(value > 0.0 && value < 1.0) {
                return Err(PrepError::Config(format!(
                    "{} must be in (0, 1), got {}",
                    name, value
                )));
            }
        }
        if self.mi_bins < 2 {
            return Err(PrepError::Config("mi_bins must be at least 2".to_string()));
        }
        if let OutlierStrategy::Clip { threshold } = self.outlier_strategy {
            if !(threshold > 0.0 && threshold.is_finite()) {
                return Err(PrepError::Config(format!(
                    "outlier clip threshold must be positive, got {}",
                    threshold
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.label_column, "Vote");
        assert_eq!(config.n_features, 19);
        assert_eq!(config.random_state, Some(42));
        assert_eq!(config.scaler_fit_scope, FitScope::TrainOnly);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = PipelineConfig::new()
            .with_label("Party")
            .with_n_features(5)
            .unseeded()
            .with_scaler_scope(FitScope::AllPartitions)
            .with_outliers(OutlierStrategy::Clip { threshold: 3.0 });

        assert_eq!(config.label_column, "Party");
        assert_eq!(config.n_features, 5);
        assert!(config.random_state.is_none());
        assert_eq!(config.scaler_fit_scope, FitScope::AllPartitions);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(PipelineConfig::new().with_n_features(0).validate().is_err());
        assert!(PipelineConfig::new().with_label(" ").validate().is_err());
        assert!(PipelineConfig::new().with_split(1.0, 0.25).validate().is_err());
        assert!(PipelineConfig::new().with_split(0.2, 0.0).validate().is_err());
        assert!(PipelineConfig::new()
            .with_outliers(OutlierStrategy::Clip { threshold: -1.0 })
            .validate()
            .is_err());
    }

    #[test]
    fn test_from_file_partial_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"n_features": 7, "random_state": null}}"#).unwrap();

        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.n_features, 7);
        assert!(config.random_state.is_none());
        assert_eq!(config.label_column, "Vote");
    }
}
