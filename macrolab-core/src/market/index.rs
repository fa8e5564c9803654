//! Date-indexed daily bars and the price lookups made against them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

use crate::calendar::{EventTiming, TradingCalendar};
use crate::domain::{MarketBar, PriceField};

#[derive(Debug, Error, PartialEq)]
pub enum JoinError {
    #[error("no market bar for {date}")]
    MissingMarketData { date: NaiveDate },
}

/// Price basis of a forward return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelBasis {
    /// Raw traded prices; the reference is the close-before `close`.
    Raw,
    /// Dividend/split adjusted prices; the reference is the close-before `adj_close`.
    Adjusted,
}

impl LabelBasis {
    pub const ALL: [LabelBasis; 2] = [LabelBasis::Raw, LabelBasis::Adjusted];

    pub fn name(self) -> &'static str {
        match self {
            LabelBasis::Raw => "raw",
            LabelBasis::Adjusted => "adjusted",
        }
    }
}

/// Read-only daily bars keyed by trading date.
///
/// Void bars (NaN or non-positive prices) are left out, so their dates are
/// not sessions.
#[derive(Debug, Clone, Default)]
pub struct MarketIndex {
    bars: BTreeMap<NaiveDate, MarketBar>,
}

impl MarketIndex {
    pub fn from_bars(bars: impl IntoIterator<Item = MarketBar>) -> Self {
        let mut index = BTreeMap::new();
        let mut void = 0usize;
        for bar in bars {
            if bar.is_void() {
                void += 1;
                continue;
            }
            index.insert(bar.date, bar);
        }
        if void > 0 {
            debug!(void, "void bars left out of market index");
        }
        Self { bars: index }
    }

    pub fn get(&self, date: NaiveDate) -> Option<&MarketBar> {
        self.bars.get(&date)
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.keys().next().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.keys().next_back().copied()
    }

    pub fn bars(&self) -> impl Iterator<Item = &MarketBar> {
        self.bars.values()
    }
}

impl TradingCalendar for MarketIndex {
    fn is_session(&self, date: NaiveDate) -> bool {
        self.bars.contains_key(&date)
    }
}

/// The two bars framing an event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JoinedBars<'a> {
    pub before: &'a MarketBar,
    pub after: &'a MarketBar,
}

impl JoinedBars<'_> {
    /// Reference price: close of the session before the event.
    pub fn reference(&self, basis: LabelBasis) -> f64 {
        match basis {
            LabelBasis::Raw => self.before.close,
            LabelBasis::Adjusted => self.before.adj_close,
        }
    }

    /// After-event price divided by the reference price.
    pub fn forward_return(&self, field: PriceField, basis: LabelBasis) -> f64 {
        let after = match basis {
            LabelBasis::Raw => self.after.price(field),
            LabelBasis::Adjusted => self.after.adjusted_price(field),
        };
        after / self.reference(basis)
    }
}

/// Price lookups against a [`MarketIndex`].
#[derive(Debug, Clone, Copy)]
pub struct MarketJoiner<'a> {
    index: &'a MarketIndex,
}

impl<'a> MarketJoiner<'a> {
    pub fn new(index: &'a MarketIndex) -> Self {
        Self { index }
    }

    /// Bar of the session whose close precedes the event.
    pub fn price_before(&self, date: NaiveDate) -> Result<&'a MarketBar, JoinError> {
        self.index
            .get(date)
            .ok_or(JoinError::MissingMarketData { date })
    }

    /// Bar of the session whose open follows the event.
    pub fn price_after(&self, date: NaiveDate) -> Result<&'a MarketBar, JoinError> {
        self.index
            .get(date)
            .ok_or(JoinError::MissingMarketData { date })
    }

    pub fn join(&self, timing: &EventTiming) -> Result<JoinedBars<'a>, JoinError> {
        Ok(JoinedBars {
            before: self.price_before(timing.close_before)?,
            after: self.price_after(timing.open_after)?,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::weekday_bars;
    use super::*;
    use crate::calendar::SessionAligner;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn index_is_a_trading_calendar() {
        let index = MarketIndex::from_bars(weekday_bars(ymd(2010, 1, 4), 14));
        assert!(index.is_session(ymd(2010, 1, 8)));
        assert!(!index.is_session(ymd(2010, 1, 9)));
        assert_eq!(index.first_date(), Some(ymd(2010, 1, 4)));
        assert_eq!(index.last_date(), Some(ymd(2010, 1, 15)));
        assert_eq!(index.len(), 10);
    }

    #[test]
    fn void_bars_are_not_sessions() {
        let mut bars = weekday_bars(ymd(2010, 1, 4), 3);
        bars[1].close = f64::NAN;
        let index = MarketIndex::from_bars(bars);
        assert!(!index.is_session(ymd(2010, 1, 5)));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn missing_date_is_a_join_error() {
        let index = MarketIndex::from_bars(weekday_bars(ymd(2010, 1, 4), 3));
        let joiner = MarketJoiner::new(&index);
        assert_eq!(
            joiner.price_before(ymd(2010, 2, 1)).unwrap_err(),
            JoinError::MissingMarketData {
                date: ymd(2010, 2, 1)
            }
        );
    }

    #[test]
    fn forward_returns_for_both_bases() {
        let index = MarketIndex::from_bars(weekday_bars(ymd(2010, 1, 4), 14));
        let aligner = SessionAligner::new(&index);
        let close_before = aligner.close_before(ymd(2010, 1, 8), false).unwrap();
        let timing = EventTiming {
            close_before,
            open_after: aligner.open_after(close_before).unwrap(),
        };
        let joined = MarketJoiner::new(&index).join(&timing).unwrap();

        // Friday close 105, Monday bar open 105 high 107 close 106.
        assert_eq!(joined.forward_return(PriceField::Open, LabelBasis::Raw), 105.0 / 105.0);
        assert_eq!(joined.forward_return(PriceField::High, LabelBasis::Raw), 107.0 / 105.0);
        // Adjusted basis: factor 0.5 on both sides cancels for OHLC.
        assert_eq!(
            joined.forward_return(PriceField::High, LabelBasis::Adjusted),
            (107.0 * 0.5) / 52.5
        );
        assert_eq!(
            joined.forward_return(PriceField::AdjClose, LabelBasis::Adjusted),
            53.0 / 52.5
        );
    }
}
