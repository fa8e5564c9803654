//! Raw records to aligned, typed events.
//!
//! Each record is canonicalized, its timing parsed and aligned to sessions,
//! and its numeric cells normalized. Records that cannot be timed or aligned
//! are dropped and counted. Records without a numeric actual or without any
//! usable forecast are kept out of the surprise set and counted.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use super::surprise::{percent_surprise, ForecastVariant};
use crate::calendar::{parse_release, EventTiming, ReleaseTime, SessionAligner, TradingCalendar};
use crate::canonicalize::RowCanonicalizer;
use crate::diagnostics::RunDiagnostics;
use crate::domain::{Normalized, RawEventRecord, StatisticName};
use crate::normalize::ValueNormalizer;

/// One release with a numeric actual and at least one usable forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedEvent {
    pub statistic: StatisticName,
    pub release: ReleaseTime,
    pub timing: EventTiming,
    pub actual: f64,
    pub briefing_forecast: Option<f64>,
    pub market_expects: Option<f64>,
}

impl AlignedEvent {
    /// Matrix row this event lands in.
    pub fn row_date(&self) -> NaiveDate {
        self.timing.close_before
    }

    pub fn surprise(&self, variant: ForecastVariant) -> Option<f64> {
        let forecast = variant.pick(self.briefing_forecast, self.market_expects)?;
        percent_surprise(self.actual, forecast)
    }
}

/// Runs the per-record stages ahead of matrix construction.
pub struct EventPreparer<'a, C: TradingCalendar + ?Sized> {
    canonicalizer: RowCanonicalizer<'a>,
    normalizer: ValueNormalizer<'a>,
    aligner: SessionAligner<'a, C>,
}

impl<'a, C: TradingCalendar + ?Sized> EventPreparer<'a, C> {
    pub fn new(
        canonicalizer: RowCanonicalizer<'a>,
        normalizer: ValueNormalizer<'a>,
        aligner: SessionAligner<'a, C>,
    ) -> Self {
        Self {
            canonicalizer,
            normalizer,
            aligner,
        }
    }

    /// Prepare every record, in input order.
    ///
    /// At most one event survives per (row date, statistic): the first in
    /// input order. Later ones are counted as duplicate cells.
    pub fn prepare(
        &self,
        records: &[RawEventRecord],
        diagnostics: &mut RunDiagnostics,
    ) -> Vec<AlignedEvent> {
        let mut seen: HashSet<(NaiveDate, StatisticName)> = HashSet::new();
        let mut events = Vec::new();

        for record in records {
            let Some(event) = self.prepare_one(record, diagnostics) else {
                continue;
            };
            if !seen.insert((event.row_date(), event.statistic.clone())) {
                diagnostics.duplicate_cells += 1;
                debug!(
                    statistic = %event.statistic,
                    date = %event.row_date(),
                    "duplicate release for session, keeping first"
                );
                continue;
            }
            events.push(event);
        }

        events
    }

    fn prepare_one(
        &self,
        record: &RawEventRecord,
        diagnostics: &mut RunDiagnostics,
    ) -> Option<AlignedEvent> {
        let row = self.canonicalizer.canonicalize(record, diagnostics);
        let statistic = self.normalizer.statistic(&row.statistic);

        let release = match parse_release(&row) {
            Ok(release) => release,
            Err(e) => {
                diagnostics.unparsable_timing += 1;
                debug!(%statistic, error = %e, "record timing unparsable");
                return None;
            }
        };
        let timing = match self.aligner.align(&release) {
            Ok(timing) => timing,
            Err(e) => {
                diagnostics.no_session_found += 1;
                debug!(%statistic, error = %e, "record not aligned");
                return None;
            }
        };

        let actual = self.number(&row.actual, diagnostics);
        let briefing_forecast = self.number(&row.briefing_forecast, diagnostics);
        let market_expects = self.number(&row.market_expects, diagnostics);

        let Some(actual) = actual else {
            diagnostics.missing_actual += 1;
            return None;
        };
        if ForecastVariant::Briefing
            .pick(briefing_forecast, market_expects)
            .is_none()
        {
            diagnostics.missing_forecast += 1;
            return None;
        }

        Some(AlignedEvent {
            statistic,
            release,
            timing,
            actual,
            briefing_forecast,
            market_expects,
        })
    }

    fn number(&self, cell: &str, diagnostics: &mut RunDiagnostics) -> Option<f64> {
        match self.normalizer.normalize(cell) {
            Normalized::Number(v) => Some(v),
            Normalized::Missing => None,
            Normalized::Text(token) => {
                diagnostics.record_unrecognized(&token);
                None
            }
        }
    }
}
