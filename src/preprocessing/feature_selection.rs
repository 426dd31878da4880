//! Feature selection by mutual information with the label
//!
//! The selector is fitted on the train partition only and remembers the
//! retained columns by name, so every partition ends up with the same
//! column set in the same order.

use crate::error::{PrepError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{debug, info};

/// Select-k-best feature selector scored by mutual information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSelector {
    k: usize,
    max_bins: usize,
    selected_features: Option<Vec<usize>>,
    feature_scores: Option<Vec<f64>>,
    feature_names: Option<Vec<String>>,
}

impl FeatureSelector {
    /// Create mutual information selector keeping `k` features
    pub fn mutual_information(k: usize) -> Self {
        Self {
            k,
            max_bins: 20,
            selected_features: None,
            feature_scores: None,
            feature_names: None,
        }
    }

    /// Set the upper bound on histogram bins for continuous features
    pub fn with_max_bins(mut self, max_bins: usize) -> Self {
        self.max_bins = max_bins.max(2);
        self
    }

    /// Fit the selector to a feature matrix and discrete class codes.
    ///
    /// Rows whose class code is NaN are ignored for scoring.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_features = x.ncols();
        if self.k == 0 || self.k > n_features {
            return Err(PrepError::FeatureSelectionConfig {
                requested: self.k,
                available: n_features,
            });
        }
        if x.nrows() != y.len() {
            return Err(PrepError::Data(format!(
                "feature matrix has {} rows but label has {}",
                x.nrows(),
                y.len()
            )));
        }

        let keep: Vec<usize> = (0..y.len()).filter(|&i| !y[i].is_nan()).collect();
        let y_kept: Vec<f64> = keep.iter().map(|&i| y[i]).collect();
        let max_bins = self.max_bins;

        let mi_scores: Vec<f64> = (0..n_features)
            .into_par_iter()
            .map(|col_idx| {
                let col = x.column(col_idx);
                let x_kept: Vec<f64> = keep.iter().map(|&i| col[i]).collect();
                Self::compute_mutual_information(
                    ArrayView1::from(&x_kept[..]),
                    ArrayView1::from(&y_kept[..]),
                    max_bins,
                )
            })
            .collect();

        // Stable sort keeps original column order among equal scores
        let mut indexed: Vec<(usize, f64)> = mi_scores.iter().copied().enumerate().collect();
        indexed.sort_by(|a, b| b.1.total_cmp(&a.1));

        let mut selected: Vec<usize> = indexed.into_iter().take(self.k).map(|(i, _)| i).collect();
        selected.sort_unstable();

        self.feature_scores = Some(mi_scores);
        self.selected_features = Some(selected);
        Ok(())
    }

    /// Fit on the feature columns and label of a table
    pub fn fit_frame(&mut self, df: &DataFrame, features: &[String], label: &str) -> Result<()> {
        let x = frame_to_array(df, features)?;
        let (y, _) = encode_label(df, label)?;
        self.feature_names = Some(features.to_vec());
        self.fit(&x, &y)?;

        if let Some(names) = self.selected_names() {
            info!(selected = names.len(), of = features.len(), "Selected features");
        }
        for (name, score) in features.iter().zip(self.scores().unwrap_or_default()) {
            debug!(column = %name, score = *score, "Mutual information");
        }
        Ok(())
    }

    /// Keep the retained features and the label, in the table's own column order
    pub fn transform_frame(&self, df: &DataFrame, label: &str) -> Result<DataFrame> {
        let names = self.selected_names().ok_or(PrepError::NotFitted)?;
        let keep: HashSet<&str> = names.iter().map(|s| s.as_str()).collect();

        for name in &names {
            if df.column(name).is_err() {
                return Err(PrepError::FeatureNotFound(name.clone()));
            }
        }
        if df.column(label).is_err() {
            return Err(PrepError::FeatureNotFound(label.to_string()));
        }

        let ordered: Vec<String> = df
            .get_column_names()
            .into_iter()
            .filter(|name| name.as_str() == label || keep.contains(name.as_str()))
            .map(|name| name.to_string())
            .collect();

        Ok(df.select(ordered)?)
    }

    /// Get selected feature indices
    pub fn selected_indices(&self) -> Option<&[usize]> {
        self.selected_features.as_deref()
    }

    /// Get feature scores
    pub fn scores(&self) -> Option<&[f64]> {
        self.feature_scores.as_deref()
    }

    /// Get selected feature names
    pub fn selected_names(&self) -> Option<Vec<String>> {
        let indices = self.selected_indices()?;
        let names = self.feature_names.as_ref()?;

        Some(indices.iter().filter_map(|&i| names.get(i).cloned()).collect())
    }

    // Mutual information between a feature and discrete class codes
    fn compute_mutual_information(x: ArrayView1<f64>, y: ArrayView1<f64>, max_bins: usize) -> f64 {
        let n = x.len() as f64;
        if n < 2.0 {
            return 0.0;
        }

        let n_bins = (n.sqrt() as usize).clamp(2, max_bins);
        let x_bins = Self::discretize(x, n_bins);

        // Ordered maps fix the summation order across runs
        let mut joint_counts: BTreeMap<(usize, u64), usize> = BTreeMap::new();
        let mut x_counts: BTreeMap<usize, usize> = BTreeMap::new();
        let mut y_counts: BTreeMap<u64, usize> = BTreeMap::new();

        for (&xb, &yv) in x_bins.iter().zip(y.iter()) {
            let yb = yv.to_bits();
            *joint_counts.entry((xb, yb)).or_insert(0) += 1;
            *x_counts.entry(xb).or_insert(0) += 1;
            *y_counts.entry(yb).or_insert(0) += 1;
        }

        let mut mi = 0.0;
        for (&(xb, yb), &count) in &joint_counts {
            let p_xy = count as f64 / n;
            let p_x = x_counts[&xb] as f64 / n;
            let p_y = y_counts[&yb] as f64 / n;
            mi += p_xy * (p_xy / (p_x * p_y)).ln();
        }

        mi.max(0.0)
    }

    // Few distinct values are kept as-is; otherwise equal-width bins. NaN gets its own bin.
    fn discretize(x: ArrayView1<f64>, n_bins: usize) -> Vec<usize> {
        let mut distinct: Vec<f64> = x.iter().copied().filter(|v| !v.is_nan()).collect();
        distinct.sort_by(|a, b| a.total_cmp(b));
        distinct.dedup();

        if distinct.len() <= n_bins {
            return x
                .iter()
                .map(|v| {
                    if v.is_nan() {
                        distinct.len()
                    } else {
                        distinct.partition_point(|d| d < v)
                    }
                })
                .collect();
        }

        let min_val = distinct[0];
        let max_val = distinct[distinct.len() - 1];
        let bin_width = (max_val - min_val) / n_bins as f64;

        x.iter()
            .map(|&v| {
                if v.is_nan() {
                    n_bins
                } else {
                    (((v - min_val) / bin_width) as usize).min(n_bins - 1)
                }
            })
            .collect()
    }
}

/// Dense feature matrix of the given columns; nulls become NaN
pub fn frame_to_array(df: &DataFrame, features: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let mut x = Array2::zeros((n_rows, features.len()));

    for (j, name) in features.iter().enumerate() {
        let column = df
            .column(name)
            .map_err(|_| PrepError::FeatureNotFound(name.clone()))?
            .cast(&DataType::Float64)?;
        for (i, value) in column.f64()?.into_iter().enumerate() {
            x[[i, j]] = value.unwrap_or(f64::NAN);
        }
    }
    Ok(x)
}

/// Class codes for the label from its sorted distinct values; nulls become NaN
pub fn encode_label(df: &DataFrame, label: &str) -> Result<(Array1<f64>, Vec<String>)> {
    let column = df
        .column(label)
        .map_err(|_| PrepError::FeatureNotFound(label.to_string()))?
        .cast(&DataType::String)?;
    let values = column.str()?;

    let classes: Vec<String> = values
        .into_iter()
        .flatten()
        .collect::<BTreeSet<&str>>()
        .into_iter()
        .map(|s| s.to_string())
        .collect();
    let codes: HashMap<&str, f64> = classes
        .iter()
        .enumerate()
        .map(|(i, c)| (c.as_str(), i as f64))
        .collect();

    let y: Array1<f64> = values
        .into_iter()
        .map(|v| v.map_or(f64::NAN, |s| codes[s]))
        .collect();
    Ok((y, classes))
}
