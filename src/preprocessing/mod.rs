//! Data preparation stages
//!
//! Each stage learns its statistics from the train partition and applies
//! them unchanged to validate and test:
//! - Feature type identification
//! - Train/validate/test partitioning
//! - Outlier handling
//! - Missing value imputation
//! - Categorical encoding
//! - Feature scaling
//! - Mutual information feature selection

mod config;
mod imputer;
mod scaler;
mod encoder;
mod pipeline;
pub mod types;
pub mod partition;
pub mod outlier;
pub mod feature_selection;

pub use config::{PipelineConfig, DEFAULT_LABEL, DEFAULT_N_FEATURES, DEFAULT_RANDOM_STATE};
pub use types::{identify_feature_types, ColumnType, FeatureTypes};
pub use partition::{Partition, Partitioner, Partitions};
pub use outlier::{OutlierBounds, OutlierHandler, OutlierStrategy};
pub use imputer::{ImputeValue, Imputer};
pub use encoder::{Encoder, UNKNOWN_CATEGORY};
pub use scaler::{FitScope, Scaler, ScalerParams};
pub use feature_selection::FeatureSelector;
pub use pipeline::{DataPreparer, PreparationReport, PreparedData};
