//! Ordered train/validation/test partitioning.
//!
//! The split is a pure function of the row count and the ratios: rows
//! `[0, floor(train·N))` train, then `[.., floor((train+val)·N))` validate,
//! the rest test. Order is preserved and nothing is random here.

use serde::{Deserialize, Serialize};
use std::ops::Range;
use thiserror::Error;

use crate::features::DateMatrix;

#[derive(Debug, Error, PartialEq)]
pub enum PartitionError {
    #[error("{name} must be between 0 and 1, got {value}")]
    RatioOutOfRange { name: &'static str, value: f64 },

    #[error("train_ratio + val_ratio must not exceed 1, got {0}")]
    RatioSumTooLarge(f64),
}

/// Fractions of rows assigned to training and validation; the remainder tests.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    #[serde(default = "default_train_ratio")]
    pub train_ratio: f64,
    #[serde(default = "default_val_ratio")]
    pub val_ratio: f64,
}

fn default_train_ratio() -> f64 {
    0.6
}

fn default_val_ratio() -> f64 {
    0.2
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_ratio: default_train_ratio(),
            val_ratio: default_val_ratio(),
        }
    }
}

impl SplitConfig {
    pub fn validate(&self) -> Result<(), PartitionError> {
        for (name, value) in [("train_ratio", self.train_ratio), ("val_ratio", self.val_ratio)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PartitionError::RatioOutOfRange { name, value });
            }
        }
        let sum = self.train_ratio + self.val_ratio;
        if sum > 1.0 + 1e-9 {
            return Err(PartitionError::RatioSumTooLarge(sum));
        }
        Ok(())
    }

    pub fn test_ratio(&self) -> f64 {
        (1.0 - self.train_ratio - self.val_ratio).max(0.0)
    }

    /// Row ranges of the three parts for `n` rows.
    pub fn bounds(&self, n: usize) -> (Range<usize>, Range<usize>, Range<usize>) {
        let cut = |ratio: f64| (((n as f64) * ratio + 1e-9).floor() as usize).min(n);
        let train_end = cut(self.train_ratio);
        let val_end = cut(self.train_ratio + self.val_ratio).max(train_end);
        (0..train_end, train_end..val_end, val_end..n)
    }
}

/// The three parts of a partitioned collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Split<T> {
    pub train: T,
    pub validation: T,
    pub test: T,
}

impl<T> Split<T> {
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Split<U> {
        Split {
            train: f(self.train),
            validation: f(self.validation),
            test: f(self.test),
        }
    }

    /// `(name, part)` pairs in train, validation, test order.
    pub fn parts(&self) -> [(&'static str, &T); 3] {
        [
            ("train", &self.train),
            ("validation", &self.validation),
            ("test", &self.test),
        ]
    }
}

/// Deterministic ordered splitter.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatasetPartitioner {
    config: SplitConfig,
}

impl DatasetPartitioner {
    pub fn new(config: SplitConfig) -> Result<Self, PartitionError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SplitConfig {
        &self.config
    }

    /// Split a slice of rows.
    pub fn partition<T: Clone>(&self, rows: &[T]) -> Split<Vec<T>> {
        let (train, validation, test) = self.config.bounds(rows.len());
        Split {
            train: rows[train].to_vec(),
            validation: rows[validation].to_vec(),
            test: rows[test].to_vec(),
        }
    }

    /// Split a matrix by rows; every part keeps all columns.
    pub fn partition_matrix<T: Clone>(&self, matrix: &DateMatrix<T>) -> Split<DateMatrix<T>> {
        let (train, validation, test) = self.config.bounds(matrix.n_rows());
        Split {
            train: matrix.slice_rows(train),
            validation: matrix.slice_rows(validation),
            test: matrix.slice_rows(test),
        }
    }
}
