//! Outlier handling
//!
//! Runs between partitioning and imputation. The default strategy leaves the
//! data untouched; z-score clipping learns its bounds from train only.

use crate::error::{PrepError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Strategy for handling outliers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OutlierStrategy {
    /// Leave values as they are
    None,
    /// Clip to `mean ± threshold * std` of the train column
    Clip { threshold: f64 },
}

impl Default for OutlierStrategy {
    fn default() -> Self {
        OutlierStrategy::None
    }
}

/// Fitted bounds for a column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierBounds {
    pub lower: f64,
    pub upper: f64,
}

/// Outlier handler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlierHandler {
    strategy: OutlierStrategy,
    bounds: HashMap<String, OutlierBounds>,
    is_fitted: bool,
}

impl OutlierHandler {
    /// Create a new outlier handler
    pub fn new(strategy: OutlierStrategy) -> Self {
        Self {
            strategy,
            bounds: HashMap::new(),
            is_fitted: false,
        }
    }

    /// Fit bounds on numeric columns of the train partition
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        self.bounds.clear();

        if let OutlierStrategy::Clip { threshold } = self.strategy {
            for col_name in columns {
                let column = df
                    .column(col_name)
                    .map_err(|_| PrepError::FeatureNotFound(col_name.to_string()))?;
                let values: Vec<f64> = column.f64()?.into_iter().flatten().filter(|v| !v.is_nan()).collect();
                if values.is_empty() {
                    continue;
                }

                let n = values.len() as f64;
                let mean = values.iter().sum::<f64>() / n;
                let std = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
                if std == 0.0 || !std.is_finite() {
                    continue;
                }

                let bounds = OutlierBounds {
                    lower: mean - threshold * std,
                    upper: mean + threshold * std,
                };
                debug!(column = %col_name, lower = bounds.lower, upper = bounds.upper, "Outlier bounds");
                self.bounds.insert(col_name.to_string(), bounds);
            }
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Apply the fitted bounds
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(PrepError::NotFitted);
        }

        let mut result = df.clone();
        for (col_name, bounds) in &self.bounds {
            let column = df
                .column(col_name)
                .map_err(|_| PrepError::FeatureNotFound(col_name.clone()))?;
            let clipped: Float64Chunked = column
                .f64()?
                .into_iter()
                .map(|opt| opt.map(|v| v.clamp(bounds.lower, bounds.upper)))
                .collect();
            result.with_column(clipped.with_name(col_name.as_str().into()).into_series())?;
        }

        Ok(result)
    }

    /// Learned bounds per column (empty for the no-op strategy)
    pub fn bounds(&self) -> &HashMap<String, OutlierBounds> {
        &self.bounds
    }
}
