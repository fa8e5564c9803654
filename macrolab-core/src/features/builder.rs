//! Wide feature matrix: one row per session date, one column per statistic.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use super::events::AlignedEvent;
use super::matrix::{FeatureMatrix, SparseMatrix};
use super::surprise::ForecastVariant;
use crate::diagnostics::RunDiagnostics;

/// Pivots aligned events into a surprise matrix for one forecast variant.
#[derive(Debug, Clone, Copy)]
pub struct FeatureMatrixBuilder {
    variant: ForecastVariant,
}

impl FeatureMatrixBuilder {
    pub fn new(variant: ForecastVariant) -> Self {
        Self { variant }
    }

    pub fn variant(&self) -> ForecastVariant {
        self.variant
    }

    /// Raw surprise pivot. Rows are ascending session dates, columns sorted
    /// statistic names. The first event for a cell wins.
    pub fn pivot(&self, events: &[AlignedEvent]) -> SparseMatrix {
        let mut cells: BTreeMap<(NaiveDate, &str), f64> = BTreeMap::new();
        let mut dates = BTreeSet::new();
        let mut statistics = BTreeSet::new();

        for event in events {
            dates.insert(event.row_date());
            statistics.insert(event.statistic.as_str());
            let Some(surprise) = event.surprise(self.variant) else {
                continue;
            };
            cells
                .entry((event.row_date(), event.statistic.as_str()))
                .or_insert(surprise);
        }

        let columns: Vec<String> = statistics.iter().map(|s| s.to_string()).collect();
        let mut matrix = SparseMatrix::empty(dates.into_iter().collect(), columns);
        let col_of: BTreeMap<&str, usize> = statistics
            .into_iter()
            .enumerate()
            .map(|(i, s)| (s, i))
            .collect();

        for ((date, statistic), value) in cells {
            if let (Some(r), Some(&c)) = (matrix.row_position(date), col_of.get(statistic)) {
                matrix.rows[r][c] = Some(value);
            }
        }
        matrix
    }

    /// Drop empty columns, normalize, zero-fill.
    pub fn finish(
        &self,
        mut matrix: SparseMatrix,
        diagnostics: &mut RunDiagnostics,
    ) -> FeatureMatrix {
        for column in matrix.drop_empty_columns() {
            debug!(variant = %self.variant, %column, "feature column has no observations");
            diagnostics
                .empty_columns
                .push(format!("{}/{column}", self.variant));
        }
        for column in matrix.normalize_columns() {
            diagnostics.record_degenerate(format!("{}/{column}", self.variant));
        }
        matrix.fill_missing(0.0)
    }

    /// Pivot, then finish.
    pub fn build(
        &self,
        events: &[AlignedEvent],
        diagnostics: &mut RunDiagnostics,
    ) -> FeatureMatrix {
        self.finish(self.pivot(events), diagnostics)
    }
}
