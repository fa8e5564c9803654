//! Row canonicalization: statistic-specific repairs applied before normalization.
//!
//! Scraped pages drop unit suffixes for some statistics, lose decimal points
//! for others, and carry a few outright bad values. Each repair is a
//! [`CorrectionRule`]: a predicate on the (canonical) statistic and row, plus a
//! correction that returns a new row. Rules run in order; a rule that fails
//! leaves the row as it was before that rule.
//!
//! Only the Actual, Briefing Forecast, Market Expects and Revised cells are ever
//! rewritten.

use thiserror::Error;
use tracing::debug;

use crate::diagnostics::RunDiagnostics;
use crate::domain::{NumericField, RawEventRecord};
use crate::normalize::{is_missing_token, parse_number, strip_currency, SynonymTable};

/// Statistics reported in billions whose cells sometimes lose the `B`.
pub const BILLIONS_STATISTICS: &[&str] = &[
    "Trade Balance",
    "Treasury Budget",
    "Current Account",
    "Consumer Credit",
];

/// Statistics reported in thousands whose cells sometimes lose the `K`.
pub const THOUSANDS_STATISTICS: &[&str] = &[
    "Initial Claims",
    "Continuing Claims",
    "Housing Starts",
    "Building Permits",
    "New Home Sales",
];

/// A single cell known to be wrong on the source page.
#[derive(Debug, Clone, Copy)]
pub struct KnownBadValue {
    pub year: i32,
    pub week: u32,
    pub statistic: &'static str,
    pub field: NumericField,
    pub bad: &'static str,
    pub fixed: &'static str,
}

pub const KNOWN_BAD_VALUES: &[KnownBadValue] = &[
    KnownBadValue {
        year: 2008,
        week: 45,
        statistic: "Initial Claims",
        field: NumericField::Actual,
        bad: "4810",
        fixed: "481K",
    },
    KnownBadValue {
        year: 2011,
        week: 6,
        statistic: "Retail Sales",
        field: NumericField::MarketExpects,
        bad: "0..5%",
        fixed: "0.5%",
    },
];

#[derive(Debug, Error, PartialEq)]
pub enum CorrectionError {
    #[error("{field} value '{value}' is not numeric")]
    NotNumeric { field: &'static str, value: String },
}

type Predicate = fn(&str, &RawEventRecord) -> bool;
type Correction = fn(&str, &RawEventRecord) -> Result<RawEventRecord, CorrectionError>;

/// One (predicate, correction) pair.
#[derive(Clone, Copy)]
pub struct CorrectionRule {
    pub name: &'static str,
    applies: Predicate,
    correct: Correction,
}

impl std::fmt::Debug for CorrectionRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorrectionRule")
            .field("name", &self.name)
            .finish()
    }
}

impl CorrectionRule {
    pub fn new(name: &'static str, applies: Predicate, correct: Correction) -> Self {
        Self {
            name,
            applies,
            correct,
        }
    }
}

/// Applies the ordered correction rules to raw rows.
#[derive(Debug, Clone)]
pub struct RowCanonicalizer<'a> {
    synonyms: &'a SynonymTable,
    rules: Vec<CorrectionRule>,
}

impl<'a> RowCanonicalizer<'a> {
    /// Canonicalizer with the standard rule set.
    pub fn new(synonyms: &'a SynonymTable) -> Self {
        Self::with_rules(synonyms, default_rules())
    }

    pub fn with_rules(synonyms: &'a SynonymTable, rules: Vec<CorrectionRule>) -> Self {
        Self { synonyms, rules }
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name).collect()
    }

    /// Return the corrected row. The input row is never modified.
    pub fn canonicalize(
        &self,
        row: &RawEventRecord,
        diagnostics: &mut RunDiagnostics,
    ) -> RawEventRecord {
        let statistic = self.synonyms.canonical(row.statistic.trim());
        let mut current = row.clone();

        for rule in &self.rules {
            if !(rule.applies)(statistic, &current) {
                continue;
            }
            match (rule.correct)(statistic, &current) {
                Ok(next) => {
                    if next != current {
                        diagnostics.record_correction(rule.name);
                        current = next;
                    }
                }
                Err(e) => {
                    debug!(rule = rule.name, statistic, error = %e, "correction skipped");
                }
            }
        }

        current
    }
}

/// The standard rules, in application order.
pub fn default_rules() -> Vec<CorrectionRule> {
    vec![
        CorrectionRule::new("known_bad_values", is_known_bad_row, fix_known_bad_values),
        CorrectionRule::new(
            "billions_suffix",
            |stat, _| BILLIONS_STATISTICS.contains(&stat),
            |_, row| Ok(append_suffix(row, 'B')),
        ),
        CorrectionRule::new(
            "thousands_suffix",
            |stat, _| THOUSANDS_STATISTICS.contains(&stat),
            |_, row| Ok(append_suffix(row, 'K')),
        ),
        CorrectionRule::new(
            "retail_sales_decimal",
            |stat, _| stat == "Retail Sales",
            rescale_dropped_decimal,
        ),
    ]
}

fn matching_bad_values<'r>(
    statistic: &'r str,
    row: &'r RawEventRecord,
) -> impl Iterator<Item = &'static KnownBadValue> + 'r {
    let year = row.year.trim().parse::<i32>().ok();
    let week = row.week.trim().parse::<u32>().ok();
    KNOWN_BAD_VALUES.iter().filter(move |kb| {
        Some(kb.year) == year && Some(kb.week) == week && kb.statistic == statistic
    })
}

fn is_known_bad_row(statistic: &str, row: &RawEventRecord) -> bool {
    matching_bad_values(statistic, row).next().is_some()
}

fn fix_known_bad_values(
    statistic: &str,
    row: &RawEventRecord,
) -> Result<RawEventRecord, CorrectionError> {
    let mut next = row.clone();
    for kb in matching_bad_values(statistic, row) {
        if next.field(kb.field).trim() == kb.bad {
            next = next.with_field(kb.field, kb.fixed);
        }
    }
    Ok(next)
}

/// True when a cell is a bare number that should carry a magnitude suffix.
fn lacks_magnitude(value: &str) -> bool {
    let v = value.trim();
    let ends_in_digit = v.chars().last().is_some_and(|c| c.is_ascii_digit());
    ends_in_digit && !is_missing_token(v) && parse_number(&strip_currency(v)).is_some()
}

fn append_suffix(row: &RawEventRecord, suffix: char) -> RawEventRecord {
    NumericField::ALL.iter().fold(row.clone(), |acc, &field| {
        let value = acc.field(field);
        if lacks_magnitude(value) {
            let fixed = format!("{}{suffix}", value.trim());
            acc.with_field(field, fixed)
        } else {
            acc
        }
    })
}

/// Retail sales percentages above 100 lost their decimal point: `105%` was `1.05%`.
fn rescale_dropped_decimal(
    _statistic: &str,
    row: &RawEventRecord,
) -> Result<RawEventRecord, CorrectionError> {
    let mut next = row.clone();
    for field in NumericField::ALL {
        let value = row.field(field).trim();
        if is_missing_token(value) {
            continue;
        }
        let is_percent = value.ends_with('%');
        let body = value.trim_end_matches('%');
        let number = parse_number(body).ok_or_else(|| CorrectionError::NotNumeric {
            field: field.header(),
            value: value.to_string(),
        })?;
        if number.abs() > 100.0 {
            let rescaled = number / 100.0;
            let fixed = if is_percent {
                format!("{rescaled}%")
            } else {
                rescaled.to_string()
            };
            next = next.with_field(field, fixed);
        }
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::fixtures::record;
    use crate::domain::Normalized;
    use crate::normalize::ValueNormalizer;

    fn canonicalize(row: &RawEventRecord) -> (RawEventRecord, RunDiagnostics) {
        let mut diag = RunDiagnostics::new();
        let out = RowCanonicalizer::new(SynonymTable::builtin()).canonicalize(row, &mut diag);
        (out, diag)
    }

    #[test]
    fn claims_get_thousands_suffix() {
        let row = record("Initial Claims", "Jan 14", "8:30 am", "350", "345", "340K");
        let (out, diag) = canonicalize(&row);

        assert_eq!(out.actual, "350K");
        assert_eq!(out.briefing_forecast, "345K");
        assert_eq!(out.market_expects, "340K");
        assert_eq!(diag.corrections["thousands_suffix"], 1);
    }

    #[test]
    fn claims_synonym_is_resolved_before_matching() {
        let row = record("Initial Jobless Claims", "Jan 14", "8:30 am", "350", "", "");
        let (out, _) = canonicalize(&row);
        assert_eq!(out.actual, "350K");
        assert_eq!(out.briefing_forecast, "");
    }

    #[test]
    fn trade_balance_gets_billions_suffix() {
        let row = record("Trade Balance", "Jan 12", "8:30 am", "-36.4", "-$38.0", "-37.5B");
        let (out, _) = canonicalize(&row);

        assert_eq!(out.actual, "-36.4B");
        assert_eq!(out.briefing_forecast, "-$38.0B");
        assert_eq!(out.market_expects, "-37.5B");
    }

    #[test]
    fn billions_suffix_accepts_every_currency_marker() {
        let row = record("Trade Balance", "Jan 12", "8:30 am", "€36.4", "-£38.0", "¥37.5");
        let (out, _) = canonicalize(&row);

        assert_eq!(out.actual, "€36.4B");
        assert_eq!(out.briefing_forecast, "-£38.0B");
        assert_eq!(out.market_expects, "¥37.5B");

        let normalizer = ValueNormalizer::builtin();
        assert_eq!(normalizer.normalize(&out.actual), Normalized::Number(36.4e9));
        assert_eq!(
            normalizer.normalize(&out.actual),
            normalizer.normalize("$36.4B")
        );
    }

    #[test]
    fn prior_and_identity_fields_untouched() {
        let mut row = record("Trade Balance", "Jan 12", "8:30 am", "-36.4", "", "");
        row.prior = "-33.2".into();
        let (out, _) = canonicalize(&row);

        assert_eq!(out.prior, "-33.2");
        assert_eq!(out.statistic, row.statistic);
        assert_eq!(out.date, row.date);
        assert_eq!(out.time, row.time);
    }

    #[test]
    fn unrelated_statistics_pass_through() {
        let row = record("ISM Index", "Jan 4", "10:00 am", "55.9", "54.5", "54.2");
        let (out, diag) = canonicalize(&row);
        assert_eq!(out, row);
        assert!(diag.corrections.is_empty());
    }

    #[test]
    fn retail_sales_dropped_decimal_is_rescaled() {
        let row = record("Retail Sales", "Jan 14", "8:30 am", "105%", "0.5%", "-120%");
        let (out, _) = canonicalize(&row);

        assert_eq!(out.actual, "1.05%");
        assert_eq!(out.briefing_forecast, "0.5%");
        assert_eq!(out.market_expects, "-1.2%");
    }

    #[test]
    fn retail_sales_with_unparsable_cell_is_left_alone() {
        let row = record("Retail Sales", "Jan 14", "8:30 am", "105%", "TBA", "0.4%");
        let (out, diag) = canonicalize(&row);

        assert_eq!(out, row);
        assert!(!diag.corrections.contains_key("retail_sales_decimal"));
    }

    #[test]
    fn known_bad_value_is_replaced() {
        let mut row = record("Initial Claims", "Nov 6", "8:30 am", "4810", "480", "");
        row.year = "2008".into();
        row.week = "45".into();
        let (out, diag) = canonicalize(&row);

        assert_eq!(out.actual, "481K");
        assert_eq!(out.briefing_forecast, "480K");
        assert_eq!(diag.corrections["known_bad_values"], 1);
    }

    #[test]
    fn missing_tokens_do_not_get_suffixes() {
        let row = record("Initial Claims", "Jan 14", "8:30 am", "---", "NA", "");
        let (out, _) = canonicalize(&row);
        assert_eq!(out.actual, "---");
        assert_eq!(out.briefing_forecast, "NA");
    }
}
