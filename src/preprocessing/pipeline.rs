//! Data preparation pipeline
//!
//! Stage order is fixed: identify types, partition, snapshot the originals,
//! handle outliers, impute, encode, scale, select features. Every statistic
//! is fitted on the train partition as it stands at that stage and applied
//! unchanged to validate and test.

use crate::error::Result;
use super::{
    config::PipelineConfig,
    encoder::Encoder,
    feature_selection::FeatureSelector,
    imputer::{ImputeValue, Imputer},
    outlier::OutlierHandler,
    partition::{Partitioner, Partitions},
    scaler::{FitScope, Scaler},
    types::{identify_feature_types, FeatureTypes},
};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{info, warn};

/// Summary of one preparation run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreparationReport {
    pub n_rows: usize,
    pub train_rows: usize,
    pub validate_rows: usize,
    pub test_rows: usize,
    pub numeric_features: Vec<String>,
    pub categorical_features: Vec<String>,
    pub fill_values: BTreeMap<String, ImputeValue>,
    /// Category codes learned per categorical feature
    pub category_codes: BTreeMap<String, BTreeMap<String, i64>>,
    /// Mutual information score of every candidate feature
    pub feature_scores: BTreeMap<String, f64>,
    /// Retained features in table order
    pub selected_features: Vec<String>,
    pub missing_labels: usize,
    pub elapsed_secs: f64,
}

/// Output of a preparation run: raw and prepared partitions
#[derive(Debug, Clone)]
pub struct PreparedData {
    /// Snapshot taken right after partitioning
    pub original: Partitions,
    /// Partitions after the full transform chain
    pub prepared: Partitions,
    pub feature_types: FeatureTypes,
    pub report: PreparationReport,
}

/// Runs the preparation stages in order
#[derive(Debug, Clone)]
pub struct DataPreparer {
    config: PipelineConfig,
}

impl DataPreparer {
    /// Create a new preparer with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the whole pipeline on a raw table
    pub fn prepare(&self, raw: &DataFrame) -> Result<PreparedData> {
        let start = Instant::now();
        self.config.validate()?;
        let label = self.config.label_column.as_str();

        let (typed, feature_types) = identify_feature_types(raw, label)?;

        let original = Partitioner::new(self.config.test_fraction, self.config.validate_fraction)
            .with_random_state(self.config.random_state)
            .split(&typed, label)?;

        let missing_labels = original.train.column(label)?.null_count();
        if missing_labels > 0 {
            warn!(count = missing_labels, "Train rows with a missing label are ignored for feature scoring");
        }

        let numeric = feature_types.numeric();
        let categorical = feature_types.categorical();
        let features = feature_types.features();

        let parts = self.handle_outliers(&original, &numeric)?;
        let (parts, imputer) = self.handle_imputation(&parts, &feature_types)?;
        let (parts, encoder) = self.handle_type_modification(&parts, &categorical)?;
        let parts = self.handle_scaling(&parts, &features)?;
        let (prepared, selector) = self.handle_feature_selection(&parts, &features)?;

        let selected = selector.selected_names().unwrap_or_default();
        let feature_scores = features
            .iter()
            .cloned()
            .zip(selector.scores().unwrap_or_default().iter().copied())
            .collect();

        let category_codes = categorical
            .iter()
            .filter_map(|name| {
                encoder
                    .mapping(name)
                    .map(|m| (name.clone(), m.iter().map(|(k, v)| (k.clone(), *v)).collect()))
            })
            .collect();

        let report = PreparationReport {
            n_rows: typed.height(),
            train_rows: prepared.train.height(),
            validate_rows: prepared.validate.height(),
            test_rows: prepared.test.height(),
            numeric_features: numeric,
            categorical_features: categorical,
            fill_values: imputer
                .fill_values()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            category_codes,
            feature_scores,
            selected_features: selected,
            missing_labels,
            elapsed_secs: start.elapsed().as_secs_f64(),
        };

        info!(
            rows = report.n_rows,
            selected = report.selected_features.len(),
            elapsed_secs = report.elapsed_secs,
            "Preparation finished"
        );

        Ok(PreparedData {
            original,
            prepared,
            feature_types,
            report,
        })
    }

    fn handle_outliers(&self, parts: &Partitions, numeric: &[String]) -> Result<Partitions> {
        let mut handler = OutlierHandler::new(self.config.outlier_strategy);
        handler.fit(&parts.train, &as_strs(numeric))?;
        info!(clipped_columns = handler.bounds().len(), "Outlier stage done");
        parts.try_map(|df| handler.transform(df))
    }

    fn handle_imputation(&self, parts: &Partitions, types: &FeatureTypes) -> Result<(Partitions, Imputer)> {
        let mut imputer = Imputer::new();
        imputer.fit(&parts.train, types)?;
        let imputed = parts.try_map(|df| imputer.transform(df))?;
        info!(columns = imputer.fill_values().len(), "Imputation done");
        Ok((imputed, imputer))
    }

    fn handle_type_modification(&self, parts: &Partitions, categorical: &[String]) -> Result<(Partitions, Encoder)> {
        let mut encoder = Encoder::new();
        encoder.fit(&parts.train, &as_strs(categorical))?;
        let encoded = parts.try_map(|df| encoder.transform(df))?;
        info!(columns = categorical.len(), "Categorical encoding done");
        Ok((encoded, encoder))
    }

    fn handle_scaling(&self, parts: &Partitions, features: &[String]) -> Result<Partitions> {
        let columns = as_strs(features);
        let mut scaler = Scaler::new();

        match self.config.scaler_fit_scope {
            FitScope::TrainOnly => {
                scaler.fit(&parts.train, &columns)?;
            }
            FitScope::AllPartitions => {
                warn!("Scaler fitted on all partitions; validate/test statistics leak into training");
                let mut stacked = parts.train.select(columns.iter().copied())?;
                stacked.vstack_mut(&parts.validate.select(columns.iter().copied())?)?;
                stacked.vstack_mut(&parts.test.select(columns.iter().copied())?)?;
                scaler.fit(&stacked, &columns)?;
            }
        }

        let scaled = parts.try_map(|df| scaler.transform(df))?;
        info!(columns = columns.len(), scope = ?self.config.scaler_fit_scope, "Scaling done");
        Ok(scaled)
    }

    fn handle_feature_selection(&self, parts: &Partitions, features: &[String]) -> Result<(Partitions, FeatureSelector)> {
        let label = self.config.label_column.as_str();
        let mut selector = FeatureSelector::mutual_information(self.config.n_features)
            .with_max_bins(self.config.mi_bins);
        selector.fit_frame(&parts.train, features, label)?;
        let selected = parts.try_map(|df| selector.transform_frame(df, label))?;
        Ok((selected, selector))
    }
}

fn as_strs(names: &[String]) -> Vec<&str> {
    names.iter().map(|s| s.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PrepError;

    fn sample_df(n: usize) -> DataFrame {
        let age: Vec<Option<f64>> = (0..n)
            .map(|i| if i == 3 { None } else { Some(20.0 + (i % 50) as f64) })
            .collect();
        let color: Vec<&str> = (0..n).map(|i| if i % 2 == 0 { "Red" } else { "Blue" }).collect();
        let vote: Vec<&str> = (0..n).map(|i| if i % 2 == 0 { "A" } else { "B" }).collect();
        df!("Age" => &age, "Color" => &color, "Vote" => &vote).unwrap()
    }

    #[test]
    fn test_prepare_end_to_end() {
        let config = PipelineConfig::new().with_n_features(1);
        let data = DataPreparer::new(config).prepare(&sample_df(100)).unwrap();

        assert_eq!(data.report.train_rows, 60);
        assert_eq!(data.report.validate_rows, 20);
        assert_eq!(data.report.test_rows, 20);
        // Color is a perfect predictor of Vote
        assert_eq!(data.report.selected_features, vec!["Color"]);

        let train_cols = data.prepared.train.get_column_names();
        assert_eq!(train_cols, data.prepared.validate.get_column_names());
        assert_eq!(train_cols, data.prepared.test.get_column_names());
    }

    #[test]
    fn test_prepare_rejects_oversized_k() {
        let config = PipelineConfig::new().with_n_features(5);
        let err = DataPreparer::new(config).prepare(&sample_df(20)).unwrap_err();
        assert!(matches!(err, PrepError::FeatureSelectionConfig { requested: 5, available: 2 }));
    }

    #[test]
    fn test_all_partitions_scope_still_prepares() {
        let config = PipelineConfig::new()
            .with_n_features(2)
            .with_scaler_scope(FitScope::AllPartitions);
        let data = DataPreparer::new(config).prepare(&sample_df(50)).unwrap();
        assert_eq!(data.prepared.total_rows(), 50);
    }
}
