//! Date-indexed matrices and per-column normalization.
//!
//! Matrices are built sparse (`Option<f64>` cells), normalized column by
//! column over the observed cells, then filled to a dense `f64` matrix.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ops::Range;

/// Rows keyed by trading date, named columns, row-major cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateMatrix<T> {
    pub index: Vec<NaiveDate>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<T>>,
}

/// Dense feature matrix: one column per canonical statistic.
pub type FeatureMatrix = DateMatrix<f64>;

/// Dense label matrix: one column per forward-return price field.
pub type LabelMatrix = DateMatrix<f64>;

/// Matrix under construction; `None` marks a missing cell.
pub type SparseMatrix = DateMatrix<Option<f64>>;

impl<T: Clone> DateMatrix<T> {
    pub fn n_rows(&self) -> usize {
        self.index.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn row_position(&self, date: NaiveDate) -> Option<usize> {
        self.index.binary_search(&date).ok()
    }

    /// Cells of one column, top to bottom.
    pub fn column(&self, col: usize) -> Vec<T> {
        self.rows.iter().map(|row| row[col].clone()).collect()
    }

    /// Rows at `positions`, in the given order.
    pub fn select_rows(&self, positions: &[usize]) -> Self {
        Self {
            index: positions.iter().map(|&p| self.index[p]).collect(),
            columns: self.columns.clone(),
            rows: positions.iter().map(|&p| self.rows[p].clone()).collect(),
        }
    }

    /// Contiguous row slice.
    pub fn slice_rows(&self, range: Range<usize>) -> Self {
        Self {
            index: self.index[range.clone()].to_vec(),
            columns: self.columns.clone(),
            rows: self.rows[range].to_vec(),
        }
    }

    /// Keep only rows whose date is in `keep`, preserving order.
    pub fn retain_dates(&self, keep: &BTreeSet<NaiveDate>) -> Self {
        let positions: Vec<usize> = self
            .index
            .iter()
            .enumerate()
            .filter(|(_, d)| keep.contains(*d))
            .map(|(i, _)| i)
            .collect();
        self.select_rows(&positions)
    }

    /// Keep only the named columns, in their current order.
    pub fn retain_columns(&self, keep: impl Fn(&str) -> bool) -> Self {
        let positions: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| keep(c))
            .map(|(i, _)| i)
            .collect();
        Self {
            index: self.index.clone(),
            columns: positions.iter().map(|&c| self.columns[c].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| positions.iter().map(|&c| row[c].clone()).collect())
                .collect(),
        }
    }
}

impl SparseMatrix {
    /// Matrix of the given shape with every cell missing.
    pub fn empty(index: Vec<NaiveDate>, columns: Vec<String>) -> Self {
        let rows = vec![vec![None; columns.len()]; index.len()];
        Self {
            index,
            columns,
            rows,
        }
    }

    pub fn observed(&self, col: usize) -> usize {
        self.rows.iter().filter(|row| row[col].is_some()).count()
    }

    /// Columns with no observed cell.
    pub fn empty_columns(&self) -> Vec<String> {
        (0..self.n_cols())
            .filter(|&c| self.observed(c) == 0)
            .map(|c| self.columns[c].clone())
            .collect()
    }

    /// Drop columns with no observed cell and return their names.
    pub fn drop_empty_columns(&mut self) -> Vec<String> {
        let empty = self.empty_columns();
        if !empty.is_empty() {
            *self = self.retain_columns(|c| !empty.iter().any(|e| e == c));
        }
        empty
    }

    /// Normalize every column in place; returns the names of degenerate
    /// (zero-range) columns, which are left all-missing.
    pub fn normalize_columns(&mut self) -> Vec<String> {
        let mut degenerate = Vec::new();
        for c in 0..self.n_cols() {
            let mut column = self.column(c);
            if !normalize_column(&mut column) {
                degenerate.push(self.columns[c].clone());
            }
            for (row, value) in self.rows.iter_mut().zip(column) {
                row[c] = value;
            }
        }
        degenerate
    }

    /// Replace missing cells with `fill`.
    pub fn fill_missing(self, fill: f64) -> DateMatrix<f64> {
        DateMatrix {
            index: self.index,
            columns: self.columns,
            rows: self
                .rows
                .into_iter()
                .map(|row| row.into_iter().map(|v| v.unwrap_or(fill)).collect())
                .collect(),
        }
    }
}

/// `(v - mean) / (max - min)` over the observed cells of one column.
///
/// Non-finite cells count as missing. Returns `false` and clears the column
/// when it has zero range. A column with no observations is left as is.
pub fn normalize_column(values: &mut [Option<f64>]) -> bool {
    for v in values.iter_mut() {
        if v.is_some_and(|x| !x.is_finite()) {
            *v = None;
        }
    }

    let observed: Vec<f64> = values.iter().flatten().copied().collect();
    if observed.is_empty() {
        return true;
    }

    let n = observed.len() as f64;
    let mean = observed.iter().sum::<f64>() / n;
    let min = observed.iter().copied().fold(f64::INFINITY, f64::min);
    let max = observed.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    if range == 0.0 || !range.is_finite() {
        values.iter_mut().for_each(|v| *v = None);
        return false;
    }

    for v in values.iter_mut().flatten() {
        *v = (*v - mean) / range;
    }
    true
}
