//! Per-run degradation counts.
//!
//! Every stage that drops or passes through data reports it here instead of
//! failing. One `RunDiagnostics` is created per pipeline run and threaded
//! through the stages by `&mut`; the finished value is returned with the
//! run's output and written into its manifest.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What happened to the data during one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunDiagnostics {
    /// Records read from the store or feed.
    pub records_in: usize,
    /// Weeks whose fetch failed and were skipped.
    pub skipped_weeks: Vec<String>,
    /// Correction rule name → number of rows it rewrote.
    pub corrections: BTreeMap<String, usize>,
    /// Numeric-field tokens no rule recognized → occurrences.
    pub unrecognized_tokens: BTreeMap<String, usize>,
    /// Records whose date or release time could not be parsed.
    pub unparsable_timing: usize,
    /// Records with no session inside the alignment walk bound.
    pub no_session_found: usize,
    /// Records dropped because a required market bar was absent.
    pub missing_market_join: usize,
    /// Records without a numeric Actual.
    pub missing_actual: usize,
    /// Surprise computations skipped because no usable forecast existed.
    pub missing_forecast: usize,
    /// Later duplicates of an already populated (date, statistic) cell.
    pub duplicate_cells: usize,
    /// Statistic columns dropped for having no observations.
    pub empty_columns: Vec<String>,
    /// Feature or label columns with zero range, zero-filled.
    pub degenerate_columns: Vec<String>,
    /// Matrix rows dropped because a label join failed.
    pub dropped_rows: usize,
}

impl RunDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_correction(&mut self, rule: &str) {
        *self.corrections.entry(rule.to_string()).or_default() += 1;
    }

    pub fn record_unrecognized(&mut self, token: &str) {
        *self
            .unrecognized_tokens
            .entry(token.to_string())
            .or_default() += 1;
    }

    pub fn record_degenerate(&mut self, column: impl Into<String>) {
        self.degenerate_columns.push(column.into());
    }

    /// Tokens sorted by descending frequency, most common first.
    pub fn top_unrecognized(&self, limit: usize) -> Vec<(&str, usize)> {
        let mut tokens: Vec<(&str, usize)> = self
            .unrecognized_tokens
            .iter()
            .map(|(t, n)| (t.as_str(), *n))
            .collect();
        tokens.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        tokens.truncate(limit);
        tokens
    }

    /// Total number of records that never reached a matrix.
    pub fn dropped_records(&self) -> usize {
        self.unparsable_timing + self.no_session_found + self.missing_market_join
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let mut diag = RunDiagnostics::new();
        diag.record_unrecognized("n/q");
        diag.record_unrecognized("n/q");
        diag.record_unrecognized("TBA");
        diag.record_correction("claims_thousands_suffix");

        assert_eq!(diag.unrecognized_tokens["n/q"], 2);
        assert_eq!(diag.corrections["claims_thousands_suffix"], 1);
        assert_eq!(diag.top_unrecognized(1), vec![("n/q", 2)]);
    }

    #[test]
    fn dropped_records_sums_alignment_failures() {
        let diag = RunDiagnostics {
            unparsable_timing: 1,
            no_session_found: 2,
            missing_market_join: 3,
            ..Default::default()
        };
        assert_eq!(diag.dropped_records(), 6);
    }
}
