//! Missing value imputation
//!
//! Fill values are learned from the train partition only: the mean for
//! numeric columns, the most frequent value for categorical ones.

use crate::error::{PrepError, Result};
use super::types::{ColumnType, FeatureTypes};
use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Learned fill value for one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImputeValue {
    Numeric(f64),
    String(String),
}

impl std::fmt::Display for ImputeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImputeValue::Numeric(v) => write!(f, "{}", v),
            ImputeValue::String(s) => f.write_str(s),
        }
    }
}

/// Imputer for handling missing values
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Imputer {
    fill_values: HashMap<String, ImputeValue>,
    is_fitted: bool,
}

impl Imputer {
    /// Create a new imputer
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit one fill value per tagged feature from `df`
    pub fn fit(&mut self, df: &DataFrame, types: &FeatureTypes) -> Result<&mut Self> {
        let columns: Vec<(&str, ColumnType)> = types.iter().collect();

        let fitted = columns
            .par_iter()
            .map(|&(name, tag)| {
                let column = df
                    .column(name)
                    .map_err(|_| PrepError::FeatureNotFound(name.to_string()))?;
                let value = match tag {
                    ColumnType::Numeric => Self::compute_mean(name, column)?,
                    ColumnType::Categorical => Self::compute_mode(name, column)?,
                };
                Ok((name.to_string(), value))
            })
            .collect::<Result<Vec<_>>>()?;

        self.fill_values = fitted.into_iter().collect();
        for (name, value) in &self.fill_values {
            debug!(column = %name, fill = %value, "Imputation statistic");
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Transform the data by imputing missing values
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(PrepError::NotFitted);
        }

        let mut result = df.clone();
        for (col_name, fill_value) in &self.fill_values {
            let column = df
                .column(col_name)
                .map_err(|_| PrepError::FeatureNotFound(col_name.clone()))?;
            if !Self::has_missing(column)? {
                continue;
            }
            let filled = Self::fill_series(column.as_materialized_series(), fill_value)?;
            result.with_column(filled)?;
        }

        Ok(result)
    }

    /// Learned fill values by column
    pub fn fill_values(&self) -> &HashMap<String, ImputeValue> {
        &self.fill_values
    }

    // Nulls and NaN both count as missing in a numeric column
    fn has_missing(column: &Column) -> Result<bool> {
        if column.null_count() > 0 {
            return Ok(true);
        }
        match column.dtype() {
            DataType::Float64 => Ok(column.f64()?.into_iter().flatten().any(|v| v.is_nan())),
            _ => Ok(false),
        }
    }

    fn compute_mean(name: &str, column: &Column) -> Result<ImputeValue> {
        let values = column.f64()?;
        let (sum, count) = values
            .into_iter()
            .flatten()
            .filter(|v| !v.is_nan())
            .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));

        if count == 0 {
            return Err(PrepError::Imputation { column: name.to_string() });
        }
        Ok(ImputeValue::Numeric(sum / count as f64))
    }

    /// Most frequent value; ties go to the lexicographically smallest
    fn compute_mode(name: &str, column: &Column) -> Result<ImputeValue> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for val in column.str()?.into_iter().flatten() {
            *counts.entry(val).or_insert(0) += 1;
        }

        let mut best: Option<(&str, usize)> = None;
        for (val, count) in counts {
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((val, count));
            }
        }

        best.map(|(val, _)| ImputeValue::String(val.to_string()))
            .ok_or_else(|| PrepError::Imputation { column: name.to_string() })
    }

    fn fill_series(series: &Series, fill_value: &ImputeValue) -> Result<Series> {
        match fill_value {
            ImputeValue::Numeric(val) => {
                let filled: Float64Chunked = series
                    .f64()?
                    .into_iter()
                    .map(|opt| Some(opt.filter(|v| !v.is_nan()).unwrap_or(*val)))
                    .collect();
                Ok(filled.with_name(series.name().clone()).into_series())
            }
            ImputeValue::String(val) => {
                let filled: StringChunked = series
                    .str()?
                    .into_iter()
                    .map(|opt| Some(opt.unwrap_or(val.as_str()).to_string()))
                    .collect();
                Ok(filled.with_name(series.name().clone()).into_series())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::types::identify_feature_types;

    fn typed(df: DataFrame) -> (DataFrame, FeatureTypes) {
        identify_feature_types(&df, "Vote").unwrap()
    }

    #[test]
    fn test_mean_and_mode_imputation() {
        let (df, types) = typed(
            df!(
                "Age" => &[Some(1.0), None, Some(3.0), Some(4.0)],
                "Color" => &[Some("Red"), Some("Blue"), None, Some("Red")],
                "Vote" => &["A", "B", "A", "B"]
            )
            .unwrap(),
        );

        let mut imputer = Imputer::new();
        imputer.fit(&df, &types).unwrap();
        let result = imputer.transform(&df).unwrap();

        let age = result.column("Age").unwrap().f64().unwrap();
        assert!((age.get(1).unwrap() - 8.0 / 3.0).abs() < 1e-12);
        let color = result.column("Color").unwrap().str().unwrap();
        assert_eq!(color.get(2), Some("Red"));
        assert_eq!(result.column("Age").unwrap().null_count(), 0);
        assert_eq!(result.column("Color").unwrap().null_count(), 0);
    }

    #[test]
    fn test_mode_tie_breaks_lexicographically() {
        let (df, types) = typed(
            df!(
                "Color" => &[Some("Red"), Some("Blue"), None],
                "Vote" => &["A", "B", "A"]
            )
            .unwrap(),
        );

        let mut imputer = Imputer::new();
        imputer.fit(&df, &types).unwrap();
        assert_eq!(
            imputer.fill_values().get("Color"),
            Some(&ImputeValue::String("Blue".to_string()))
        );
    }

    #[test]
    fn test_all_missing_column_is_an_error() {
        let (df, types) = typed(
            df!(
                "Age" => &[None::<f64>, None],
                "Vote" => &["A", "B"]
            )
            .unwrap(),
        );

        let err = Imputer::new().fit(&df, &types).map(|_| ()).unwrap_err();
        assert!(matches!(err, PrepError::Imputation { ref column } if column == "Age"));
    }

    #[test]
    fn test_nan_counts_as_missing() {
        let (train, types) = typed(
            df!("Age" => &[2.0, f64::NAN, 4.0], "Vote" => &["A", "B", "A"]).unwrap(),
        );
        let (test, _) = typed(
            df!("Age" => &[f64::NAN, 7.0], "Vote" => &["A", "B"]).unwrap(),
        );

        let mut imputer = Imputer::new();
        imputer.fit(&train, &types).unwrap();
        assert_eq!(imputer.fill_values().get("Age"), Some(&ImputeValue::Numeric(3.0)));

        for df in [&train, &test] {
            let filled = imputer.transform(df).unwrap();
            let age = filled.column("Age").unwrap().f64().unwrap();
            assert!(age.into_iter().all(|v| v.is_some_and(|v| !v.is_nan())));
        }
        let filled = imputer.transform(&test).unwrap();
        assert_eq!(filled.column("Age").unwrap().f64().unwrap().get(0), Some(3.0));
    }

    #[test]
    fn test_all_nan_column_is_an_error() {
        let (df, types) = typed(
            df!("Age" => &[f64::NAN, f64::NAN], "Vote" => &["A", "B"]).unwrap(),
        );
        let err = Imputer::new().fit(&df, &types).map(|_| ()).unwrap_err();
        assert!(matches!(err, PrepError::Imputation { .. }));
    }

    #[test]
    fn test_statistic_ignores_other_partitions() {
        let (train, types) = typed(
            df!("Age" => &[Some(10.0), None], "Vote" => &["A", "B"]).unwrap(),
        );
        let (test, _) = typed(
            df!("Age" => &[None, Some(1000.0)], "Vote" => &["A", "B"]).unwrap(),
        );

        let mut imputer = Imputer::new();
        imputer.fit(&train, &types).unwrap();
        let filled = imputer.transform(&test).unwrap();

        let age = filled.column("Age").unwrap().f64().unwrap();
        assert_eq!(age.get(0), Some(10.0));
        assert_eq!(age.get(1), Some(1000.0));
    }
}
