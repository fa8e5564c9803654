//! MarketBar: one daily OHLCV bar of the reference market.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily OHLCV bar with the provider's dividend/split adjusted close.
///
/// OHLC are raw traded prices. Adjusted prices are derived on demand from the
/// `adj_close / close` factor, so both bases come from the same bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub adj_close: f64,
}

/// Which price of a bar a label column reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
    AdjClose,
}

impl PriceField {
    pub const ALL: [PriceField; 5] = [
        PriceField::Open,
        PriceField::High,
        PriceField::Low,
        PriceField::Close,
        PriceField::AdjClose,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PriceField::Open => "open",
            PriceField::High => "high",
            PriceField::Low => "low",
            PriceField::Close => "close",
            PriceField::AdjClose => "adj_close",
        }
    }
}

impl MarketBar {
    /// Returns true if any price is NaN or non-positive.
    pub fn is_void(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.adj_close]
            .iter()
            .any(|p| p.is_nan() || *p <= 0.0)
    }

    /// Basic OHLC sanity: high bounds everything, low is bounded by everything.
    pub fn is_sane(&self) -> bool {
        !self.is_void()
            && self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
    }

    /// Ratio that converts raw prices of this bar to the adjusted basis.
    pub fn adjustment_factor(&self) -> f64 {
        if self.close > 0.0 && self.adj_close.is_finite() {
            self.adj_close / self.close
        } else {
            f64::NAN
        }
    }

    /// Raw price for a field.
    pub fn price(&self, field: PriceField) -> f64 {
        match field {
            PriceField::Open => self.open,
            PriceField::High => self.high,
            PriceField::Low => self.low,
            PriceField::Close => self.close,
            PriceField::AdjClose => self.adj_close,
        }
    }

    /// Dividend/split adjusted price for a field.
    pub fn adjusted_price(&self, field: PriceField) -> f64 {
        match field {
            PriceField::AdjClose => self.adj_close,
            other => self.price(other) * self.adjustment_factor(),
        }
    }
}
