//! Market-data provider trait and its error type.
//!
//! The pipeline only ever reads a [`MarketIndex`](super::MarketIndex); where
//! the bars come from is behind [`MarketDataProvider`], so tests can supply
//! synthetic bars and the runner can put a cache in front of the network.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::MarketBar;

/// Errors from fetching or caching market bars.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("HTTP {status} from provider")]
    HttpStatus { status: u16 },

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("no cached bars for '{symbol}'; run `macrolab download {symbol}` first")]
    NoCachedData { symbol: String },
}

/// Where a set of bars came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    YahooFinance,
    Cache,
    Synthetic,
}

/// Bars returned by one provider call.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub symbol: String,
    pub bars: Vec<MarketBar>,
    pub source: DataSource,
}

/// Source of daily bars for one symbol.
pub trait MarketDataProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Daily bars for `symbol` with dates in `[start, end]`, ascending.
    fn fetch_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError>;

    /// False while the provider is known to be unusable (e.g. backing off).
    fn is_available(&self) -> bool {
        true
    }
}

/// In-memory provider over a fixed bar set. Used for offline runs and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    bars: Vec<MarketBar>,
}

impl StaticProvider {
    pub fn new(mut bars: Vec<MarketBar>) -> Self {
        bars.sort_by_key(|b| b.date);
        Self { bars }
    }
}

impl MarketDataProvider for StaticProvider {
    fn name(&self) -> &str {
        "static"
    }

    fn fetch_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        let bars: Vec<MarketBar> = self
            .bars
            .iter()
            .filter(|b| b.date >= start && b.date <= end)
            .cloned()
            .collect();
        if bars.is_empty() {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars,
            source: DataSource::Synthetic,
        })
    }
}
