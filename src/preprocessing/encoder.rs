//! Categorical encoding
//!
//! Codes are assigned from the sorted set of train categories so the same
//! value maps to the same code in every partition.

use crate::error::{PrepError, Result};
use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

/// Code given to a category that never appeared in train
pub const UNKNOWN_CATEGORY: i64 = -1;

/// Ordinal encoder for categorical columns
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Encoder {
    // column name -> (category -> code)
    mappings: HashMap<String, HashMap<String, i64>>,
    // column order as fitted
    columns: Vec<String>,
    is_fitted: bool,
}

impl Encoder {
    /// Create a new encoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit the encoder to the data
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        let fitted = columns
            .par_iter()
            .map(|&col_name| {
                let column = df
                    .column(col_name)
                    .map_err(|_| PrepError::FeatureNotFound(col_name.to_string()))?;
                Ok((col_name.to_string(), Self::build_mapping(column)?))
            })
            .collect::<Result<Vec<_>>>()?;

        for (name, mapping) in &fitted {
            debug!(column = %name, categories = mapping.len(), "Encoding mapping");
        }
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self.mappings = fitted.into_iter().collect();
        self.is_fitted = true;
        Ok(self)
    }

    /// Replace each fitted categorical column by its numeric codes
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(PrepError::NotFitted);
        }

        let mut result = df.clone();
        for col_name in &self.columns {
            let mapping = &self.mappings[col_name];
            let column = df
                .column(col_name)
                .map_err(|_| PrepError::FeatureNotFound(col_name.clone()))?;

            let mut unknown = 0usize;
            let codes: Float64Chunked = column
                .str()?
                .into_iter()
                .map(|opt| {
                    opt.map(|s| match mapping.get(s) {
                        Some(&code) => code as f64,
                        None => {
                            unknown += 1;
                            UNKNOWN_CATEGORY as f64
                        }
                    })
                })
                .collect();

            if unknown > 0 {
                warn!(column = %col_name, count = unknown, "Categories unseen in train mapped to sentinel");
            }
            result.with_column(codes.with_name(col_name.as_str().into()).into_series())?;
        }

        Ok(result)
    }

    /// Category-to-code mapping learned for a column
    pub fn mapping(&self, column: &str) -> Option<&HashMap<String, i64>> {
        self.mappings.get(column)
    }

    fn build_mapping(column: &Column) -> Result<HashMap<String, i64>> {
        let categories: BTreeSet<&str> = column.str()?.into_iter().flatten().collect();
        Ok(categories
            .into_iter()
            .enumerate()
            .map(|(code, cat)| (cat.to_string(), code as i64))
            .collect())
    }
}
