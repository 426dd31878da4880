//! Feature scaling (z-score standardization)

use crate::error::{PrepError, Result};
use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Which rows the scaler learns its statistics from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitScope {
    /// Train partition only
    TrainOnly,
    /// Train, validate and test stacked together (leaks evaluation data)
    AllPartitions,
}

impl Default for FitScope {
    fn default() -> Self {
        FitScope::TrainOnly
    }
}

/// Parameters for a fitted column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    pub mean: f64,
    /// Population standard deviation; 0 marks a constant column
    pub std: f64,
}

/// Standard scaler: `(x - mean) / std`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scaler {
    params: HashMap<String, ScalerParams>,
    columns: Vec<String>,
    is_fitted: bool,
}

impl Scaler {
    /// Create a new scaler
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit the scaler to the data
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        let fitted = columns
            .par_iter()
            .map(|&col_name| {
                let column = df
                    .column(col_name)
                    .map_err(|_| PrepError::FeatureNotFound(col_name.to_string()))?;
                Ok((col_name.to_string(), Self::compute_params(col_name, column)?))
            })
            .collect::<Result<Vec<_>>>()?;

        for (name, params) in &fitted {
            if params.std == 0.0 {
                warn!(column = %name, "Zero-variance column, scaled output will be constant 0");
            }
            debug!(column = %name, mean = params.mean, std = params.std, "Scaler statistic");
        }

        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self.params = fitted.into_iter().collect();
        self.is_fitted = true;
        Ok(self)
    }

    /// Transform the data.
    /// Builds all replacement columns first, then applies them in a single pass.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(PrepError::NotFitted);
        }

        let replacements: Vec<Series> = self
            .columns
            .iter()
            .map(|col_name| {
                let column = df
                    .column(col_name)
                    .map_err(|_| PrepError::FeatureNotFound(col_name.clone()))?;
                Self::scale_series(col_name, column, &self.params[col_name])
            })
            .collect::<Result<Vec<_>>>()?;

        let mut result = df.clone();
        for scaled in replacements {
            result.with_column(scaled)?;
        }
        Ok(result)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    /// Undo the scaling; constant columns come back as their train mean
    pub fn inverse_transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(PrepError::NotFitted);
        }

        let mut result = df.clone();
        for col_name in &self.columns {
            let params = &self.params[col_name];
            let column = df
                .column(col_name)
                .map_err(|_| PrepError::FeatureNotFound(col_name.clone()))?;
            let unscaled: Float64Chunked = column
                .f64()?
                .into_iter()
                .map(|opt| opt.map(|v| v * params.std + params.mean))
                .collect();
            result.with_column(unscaled.with_name(col_name.as_str().into()).into_series())?;
        }
        Ok(result)
    }

    /// Learned parameters for a column
    pub fn params(&self, column: &str) -> Option<&ScalerParams> {
        self.params.get(column)
    }

    fn compute_params(name: &str, column: &Column) -> Result<ScalerParams> {
        let values: Vec<f64> = column.f64()?.into_iter().flatten().collect();
        if values.is_empty() {
            return Err(PrepError::Scaling {
                column: name.to_string(),
                reason: "no values to fit".to_string(),
            });
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();

        if !mean.is_finite() || !std.is_finite() {
            return Err(PrepError::Scaling {
                column: name.to_string(),
                reason: format!("non-finite statistics (mean={}, std={})", mean, std),
            });
        }

        // Variance below float noise of the mean counts as constant
        let std = if std <= f64::EPSILON * mean.abs().max(1.0) { 0.0 } else { std };
        Ok(ScalerParams { mean, std })
    }

    fn scale_series(name: &str, column: &Column, params: &ScalerParams) -> Result<Series> {
        let scaled: Float64Chunked = column
            .f64()?
            .into_iter()
            .map(|opt| {
                opt.map(|v| {
                    if params.std == 0.0 {
                        0.0
                    } else {
                        (v - params.mean) / params.std
                    }
                })
            })
            .collect();

        if (&scaled).into_iter().flatten().any(|v| !v.is_finite()) {
            return Err(PrepError::Scaling {
                column: name.to_string(),
                reason: "scaled output is not finite".to_string(),
            });
        }

        Ok(scaled.with_name(name.into()).into_series())
    }
}
