//! elections-prep - Leakage-safe preparation of the elections vote dataset
//!
//! Reads a raw table, splits it 60/20/20 into train/validate/test and runs
//! every cleaning stage with statistics learned from train alone.
//!
//! # Modules
//!
//! - [`preprocessing`] - Type identification, partitioning, imputation,
//!   encoding, scaling and feature selection
//! - [`utils`] - Loading the raw table and persisting prepared runs
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

pub mod preprocessing;
pub mod utils;
pub mod cli;

pub use error::{PrepError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{PrepError, Result};

    pub use crate::preprocessing::{
        DataPreparer, FeatureTypes, FitScope, OutlierStrategy, Partition, Partitions,
        PipelineConfig, PreparationReport, PreparedData,
    };

    pub use crate::utils::{DataLoader, DataSaver, DataSource, RunManifest};
}
