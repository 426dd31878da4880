//! Train / validate / test partitioning

use crate::error::{PrepError, Result};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

/// One of the three disjoint row subsets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Partition {
    Train,
    Validate,
    Test,
}

impl Partition {
    pub const ALL: [Partition; 3] = [Partition::Train, Partition::Validate, Partition::Test];

    /// File stem used when the partition is persisted
    pub fn name(&self) -> &'static str {
        match self {
            Partition::Train => "train",
            Partition::Validate => "validate",
            Partition::Test => "test",
        }
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Three independently owned tables plus the raw row indices they came from
#[derive(Debug, Clone)]
pub struct Partitions {
    pub train: DataFrame,
    pub validate: DataFrame,
    pub test: DataFrame,
    pub train_indices: Vec<usize>,
    pub validate_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

impl Partitions {
    pub fn get(&self, partition: Partition) -> &DataFrame {
        match partition {
            Partition::Train => &self.train,
            Partition::Validate => &self.validate,
            Partition::Test => &self.test,
        }
    }

    pub fn indices(&self, partition: Partition) -> &[usize] {
        match partition {
            Partition::Train => &self.train_indices,
            Partition::Validate => &self.validate_indices,
            Partition::Test => &self.test_indices,
        }
    }

    /// Apply the same fallible transform to every partition, keeping row identity
    pub fn try_map<F>(&self, mut f: F) -> Result<Partitions>
    where
        F: FnMut(&DataFrame) -> Result<DataFrame>,
    {
        let train = f(&self.train)?;
        let validate = f(&self.validate)?;
        let test = f(&self.test)?;

        for (partition, before, after) in [
            (Partition::Train, &self.train, &train),
            (Partition::Validate, &self.validate, &validate),
            (Partition::Test, &self.test, &test),
        ] {
            if before.height() != after.height() {
                return Err(PrepError::Data(format!(
                    "{} partition changed row count from {} to {}",
                    partition,
                    before.height(),
                    after.height()
                )));
            }
        }

        Ok(Partitions {
            train,
            validate,
            test,
            train_indices: self.train_indices.clone(),
            validate_indices: self.validate_indices.clone(),
            test_indices: self.test_indices.clone(),
        })
    }

    /// Total number of rows across the three partitions
    pub fn total_rows(&self) -> usize {
        self.train.height() + self.validate.height() + self.test.height()
    }
}

/// Two-step random splitter: holdout test first, then validate from the rest
#[derive(Debug, Clone)]
pub struct Partitioner {
    test_fraction: f64,
    validate_fraction: f64,
    random_state: Option<u64>,
}

impl Partitioner {
    /// Create a new partitioner
    pub fn new(test_fraction: f64, validate_fraction: f64) -> Self {
        Self {
            test_fraction,
            validate_fraction,
            random_state: None,
        }
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: Option<u64>) -> Self {
        self.random_state = seed;
        self
    }

    /// Split `df` into train/validate/test partitions
    pub fn split(&self, df: &DataFrame, label: &str) -> Result<Partitions> {
        let n_samples = df.height();
        if n_samples == 0 {
            return Err(PrepError::Partition("cannot split an empty table".to_string()));
        }
        if df.column(label).is_err() {
            return Err(PrepError::Partition(format!(
                "label column '{}' not present",
                label
            )));
        }
        for (name, fraction) in [
            ("test_fraction", self.test_fraction),
            ("validate_fraction", self.validate_fraction),
        ] {
            if !(fraction > 0.0 && fraction < 1.0) {
                return Err(PrepError::Partition(format!(
                    "{} must be in (0, 1), got {}",
                    name, fraction
                )));
            }
        }

        let mut rng = match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let all: Vec<usize> = (0..n_samples).collect();
        let (rest, test_indices) = Self::holdout(all, self.test_fraction, &mut rng);
        let (train_indices, validate_indices) =
            Self::holdout(rest, self.validate_fraction, &mut rng);

        info!(
            train = train_indices.len(),
            validate = validate_indices.len(),
            test = test_indices.len(),
            seeded = self.random_state.is_some(),
            "Partitioned dataset"
        );

        Ok(Partitions {
            train: Self::take_rows(df, &train_indices)?,
            validate: Self::take_rows(df, &validate_indices)?,
            test: Self::take_rows(df, &test_indices)?,
            train_indices,
            validate_indices,
            test_indices,
        })
    }

    /// Number of rows a holdout of `fraction` takes from `n` rows
    pub fn holdout_size(n: usize, fraction: f64) -> usize {
        ((n as f64 * fraction).ceil() as usize).min(n)
    }

    // Shuffle and cut; returns (kept, held out)
    fn holdout(mut indices: Vec<usize>, fraction: f64, rng: &mut ChaCha8Rng) -> (Vec<usize>, Vec<usize>) {
        indices.shuffle(rng);
        let n_holdout = Self::holdout_size(indices.len(), fraction);
        let kept = indices.split_off(n_holdout);
        (kept, indices)
    }

    fn take_rows(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
        let idx: Vec<IdxSize> = indices.iter().map(|&i| i as IdxSize).collect();
        let idx = IdxCa::from_vec("idx".into(), idx);
        Ok(df.take(&idx)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn sample_df(n: usize) -> DataFrame {
        let x: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let label: Vec<&str> = (0..n).map(|i| if i % 2 == 0 { "A" } else { "B" }).collect();
        df!("x" => &x, "Vote" => &label).unwrap()
    }

    #[test]
    fn test_split_sizes_and_disjointness() {
        let df = sample_df(100);
        let parts = Partitioner::new(0.2, 0.25)
            .with_random_state(Some(7))
            .split(&df, "Vote")
            .unwrap();

        assert_eq!(parts.train.height(), 60);
        assert_eq!(parts.validate.height(), 20);
        assert_eq!(parts.test.height(), 20);

        let mut seen = HashSet::new();
        for p in Partition::ALL {
            for &i in parts.indices(p) {
                assert!(seen.insert(i), "row {} appears twice", i);
            }
        }
        assert_eq!(seen.len(), 100);
    }

    #[test]
    fn test_rows_follow_indices() {
        let df = sample_df(10);
        let parts = Partitioner::new(0.2, 0.25)
            .with_random_state(Some(1))
            .split(&df, "Vote")
            .unwrap();

        let x = parts.test.column("x").unwrap().f64().unwrap();
        for (row, &orig) in parts.test_indices.iter().enumerate() {
            assert_eq!(x.get(row), Some(orig as f64));
        }
    }

    #[test]
    fn test_seeded_split_is_reproducible() {
        let df = sample_df(50);
        let splitter = Partitioner::new(0.2, 0.25).with_random_state(Some(42));
        let a = splitter.split(&df, "Vote").unwrap();
        let b = splitter.split(&df, "Vote").unwrap();
        assert_eq!(a.train_indices, b.train_indices);
        assert_eq!(a.test_indices, b.test_indices);
    }

    #[test]
    fn test_split_rejects_empty_and_missing_label() {
        let empty = sample_df(0);
        assert!(matches!(
            Partitioner::new(0.2, 0.25).split(&empty, "Vote"),
            Err(PrepError::Partition(_))
        ));

        let df = sample_df(10);
        assert!(matches!(
            Partitioner::new(0.2, 0.25).split(&df, "Party"),
            Err(PrepError::Partition(_))
        ));
    }

    #[test]
    fn test_holdout_size_rounds_up() {
        assert_eq!(Partitioner::holdout_size(100, 0.2), 20);
        assert_eq!(Partitioner::holdout_size(80, 0.25), 20);
        assert_eq!(Partitioner::holdout_size(11, 0.2), 3);
        assert_eq!(Partitioner::holdout_size(1, 0.2), 1);
    }
}
