//! Forward-return labels for feature-matrix rows.
//!
//! A row dated `d` is the close-before session of its events. Its label is
//! the next session's prices relative to `d`'s close, on both the raw and
//! the adjusted basis.

use chrono::NaiveDate;
use tracing::debug;

use super::matrix::{LabelMatrix, SparseMatrix};
use crate::calendar::{EventTiming, SessionAligner};
use crate::diagnostics::RunDiagnostics;
use crate::domain::PriceField;
use crate::market::{LabelBasis, MarketIndex, MarketJoiner};

/// Sparse labels for both bases plus the dates that could not be joined.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelSet {
    pub raw: SparseMatrix,
    pub adjusted: SparseMatrix,
    pub dropped: Vec<NaiveDate>,
}

impl LabelSet {
    pub fn basis(&self, basis: LabelBasis) -> &SparseMatrix {
        match basis {
            LabelBasis::Raw => &self.raw,
            LabelBasis::Adjusted => &self.adjusted,
        }
    }
}

/// Label column name for a price field, e.g. `close_after`.
pub fn label_column(field: PriceField) -> String {
    format!("{}_after", field.name())
}

pub fn label_columns() -> Vec<String> {
    PriceField::ALL.iter().map(|&f| label_column(f)).collect()
}

/// Joins row dates against the market index.
pub struct LabelBuilder<'a> {
    aligner: SessionAligner<'a, MarketIndex>,
    joiner: MarketJoiner<'a>,
}

impl<'a> LabelBuilder<'a> {
    pub fn new(index: &'a MarketIndex, max_walk_days: u32) -> Self {
        Self {
            aligner: SessionAligner::new(index).with_max_walk_days(max_walk_days),
            joiner: MarketJoiner::new(index),
        }
    }

    /// Labels for `dates` (ascending). Dates whose bars cannot be joined are
    /// left out of both matrices and listed in `dropped`.
    pub fn build(&self, dates: &[NaiveDate]) -> LabelSet {
        let mut index = Vec::with_capacity(dates.len());
        let mut raw_rows = Vec::with_capacity(dates.len());
        let mut adjusted_rows = Vec::with_capacity(dates.len());
        let mut dropped = Vec::new();

        for &date in dates {
            let timing = match self.aligner.open_after(date) {
                Ok(open_after) => EventTiming {
                    close_before: date,
                    open_after,
                },
                Err(e) => {
                    debug!(%date, error = %e, "no session after row date");
                    dropped.push(date);
                    continue;
                }
            };
            let joined = match self.joiner.join(&timing) {
                Ok(joined) => joined,
                Err(e) => {
                    debug!(%date, error = %e, "label join failed");
                    dropped.push(date);
                    continue;
                }
            };

            let row = |basis: LabelBasis| -> Vec<Option<f64>> {
                PriceField::ALL
                    .iter()
                    .map(|&field| {
                        Some(joined.forward_return(field, basis)).filter(|v| v.is_finite())
                    })
                    .collect()
            };
            index.push(date);
            raw_rows.push(row(LabelBasis::Raw));
            adjusted_rows.push(row(LabelBasis::Adjusted));
        }

        LabelSet {
            raw: SparseMatrix {
                index: index.clone(),
                columns: label_columns(),
                rows: raw_rows,
            },
            adjusted: SparseMatrix {
                index,
                columns: label_columns(),
                rows: adjusted_rows,
            },
            dropped,
        }
    }
}

/// Normalize a sparse label matrix and zero-fill it.
pub fn finish_labels(
    mut labels: SparseMatrix,
    tag: &str,
    diagnostics: &mut RunDiagnostics,
) -> LabelMatrix {
    for column in labels.normalize_columns() {
        diagnostics.record_degenerate(format!("{tag}/{column}"));
    }
    labels.fill_missing(0.0)
}
