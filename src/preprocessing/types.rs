//! Feature type identification
//!
//! Tags every non-label column as numeric or categorical once, on the raw
//! table, so the same tag holds in all three partitions.

use crate::error::{PrepError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Semantic type of a feature column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Numeric,
    Categorical,
}

/// Feature type tags in table column order (label excluded)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureTypes {
    tags: Vec<(String, ColumnType)>,
}

impl FeatureTypes {
    /// Tag for a column, if it is a tagged feature
    pub fn get(&self, column: &str) -> Option<ColumnType> {
        self.tags
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, tag)| *tag)
    }

    /// Names of numeric features, in table order
    pub fn numeric(&self) -> Vec<String> {
        self.of_type(ColumnType::Numeric)
    }

    /// Names of categorical features, in table order
    pub fn categorical(&self) -> Vec<String> {
        self.of_type(ColumnType::Categorical)
    }

    /// All feature names, in table order
    pub fn features(&self) -> Vec<String> {
        self.tags.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ColumnType)> {
        self.tags.iter().map(|(name, tag)| (name.as_str(), *tag))
    }

    fn of_type(&self, wanted: ColumnType) -> Vec<String> {
        self.tags
            .iter()
            .filter(|(_, tag)| *tag == wanted)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// Check if a dtype has a clear numeric representation
pub(crate) fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Tag every non-label column and coerce it to its canonical dtype.
///
/// Numeric columns become `Float64`; everything else (strings, booleans,
/// all-null columns) is categorical and becomes `String`. The label column
/// is left untouched.
pub fn identify_feature_types(df: &DataFrame, label: &str) -> Result<(DataFrame, FeatureTypes)> {
    if df.column(label).is_err() {
        return Err(PrepError::FeatureNotFound(label.to_string()));
    }

    let mut tags = Vec::with_capacity(df.width().saturating_sub(1));
    let mut columns = Vec::with_capacity(df.width());

    for col in df.get_columns() {
        let name = col.name().to_string();
        if name == label {
            columns.push(col.clone());
            continue;
        }

        let tag = if is_numeric_dtype(col.dtype()) {
            ColumnType::Numeric
        } else {
            ColumnType::Categorical
        };
        let target = match tag {
            ColumnType::Numeric => DataType::Float64,
            ColumnType::Categorical => DataType::String,
        };

        debug!(column = %name, dtype = ?col.dtype(), tag = ?tag, "Tagged feature");
        columns.push(col.cast(&target)?);
        tags.push((name, tag));
    }

    let types = FeatureTypes { tags };
    info!(
        numeric = types.numeric().len(),
        categorical = types.categorical().len(),
        "Identified feature types"
    );

    Ok((DataFrame::new(columns)?, types))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identify_mixed_columns() {
        let df = df!(
            "Age" => &[Some(30i64), None, Some(45)],
            "Color" => &["Red", "Blue", "Red"],
            "Married" => &[true, false, true],
            "Vote" => &["A", "B", "A"]
        )
        .unwrap();

        let (typed, types) = identify_feature_types(&df, "Vote").unwrap();

        assert_eq!(types.get("Age"), Some(ColumnType::Numeric));
        assert_eq!(types.get("Color"), Some(ColumnType::Categorical));
        assert_eq!(types.get("Married"), Some(ColumnType::Categorical));
        assert_eq!(types.get("Vote"), None);
        assert_eq!(types.features(), vec!["Age", "Color", "Married"]);

        assert_eq!(typed.column("Age").unwrap().dtype(), &DataType::Float64);
        assert_eq!(typed.column("Married").unwrap().dtype(), &DataType::String);
        assert_eq!(typed.column("Age").unwrap().null_count(), 1);
        assert_eq!(typed.get_column_names(), df.get_column_names());
    }

    #[test]
    fn test_identify_missing_label() {
        let df = df!("x" => &[1.0, 2.0]).unwrap();
        let err = identify_feature_types(&df, "Vote").unwrap_err();
        assert!(matches!(err, PrepError::FeatureNotFound(_)));
    }
}
