//! Daily bars from Yahoo's v8 chart endpoint.
//!
//! One GET per symbol and range, retried with exponential backoff on
//! timeouts, 5xx and 429 responses. A 429 that survives every retry puts the
//! provider into a cooldown during which [`MarketDataProvider::is_available`]
//! reports false.

use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::provider::{DataError, DataSource, FetchResult, MarketDataProvider};
use crate::domain::MarketBar;

const CHART_ENDPOINT: &str = "https://query2.finance.yahoo.com/v8/finance/chart";

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<Series>>,
    error: Option<ChartFault>,
}

#[derive(Debug, Deserialize)]
struct ChartFault {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct Series {
    timestamp: Option<Vec<i64>>,
    indicators: SeriesIndicators,
}

#[derive(Debug, Deserialize)]
struct SeriesIndicators {
    quote: Vec<Quotes>,
    adjclose: Option<Vec<AdjustedCloses>>,
}

#[derive(Debug, Deserialize)]
struct Quotes {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjustedCloses {
    adjclose: Vec<Option<f64>>,
}

/// Chart-API provider on a blocking `reqwest` client.
pub struct YahooChartProvider {
    client: reqwest::blocking::Client,
    max_retries: u32,
    base_delay: Duration,
    cooldown_until: Mutex<Option<Instant>>,
}

impl YahooChartProvider {
    pub fn new() -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) macrolab")
            .build()
            .map_err(|e| DataError::NetworkUnreachable(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            cooldown_until: Mutex::new(None),
        })
    }

    pub fn with_retries(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.base_delay = base_delay;
        self
    }

    fn start_cooldown(&self, secs: u64) {
        if let Ok(mut until) = self.cooldown_until.lock() {
            *until = Some(Instant::now() + Duration::from_secs(secs));
        }
    }

    fn request(&self, url: &str, symbol: &str) -> Result<Vec<MarketBar>, DataError> {
        let mut last_error = DataError::NetworkUnreachable("no attempt made".into());

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                debug!(symbol, attempt, ?delay, "retrying chart request");
                std::thread::sleep(delay);
            }

            let resp = match self.client.get(url).send() {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    last_error = DataError::NetworkUnreachable(e.to_string());
                    continue;
                }
                Err(e) => return Err(DataError::NetworkUnreachable(e.to_string())),
            };

            let status = resp.status();
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                let retry_after_secs = resp
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(60);
                last_error = DataError::RateLimited { retry_after_secs };
                continue;
            }
            if status.is_server_error() {
                last_error = DataError::HttpStatus {
                    status: status.as_u16(),
                };
                continue;
            }
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                });
            }
            if !status.is_success() {
                return Err(DataError::HttpStatus {
                    status: status.as_u16(),
                });
            }

            let body = resp
                .text()
                .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;
            return parse_chart(symbol, &body);
        }

        if let DataError::RateLimited { retry_after_secs } = last_error {
            warn!(symbol, retry_after_secs, "chart API rate limit, cooling down");
            self.start_cooldown(retry_after_secs);
        }
        Err(last_error)
    }
}

impl MarketDataProvider for YahooChartProvider {
    fn name(&self) -> &str {
        "yahoo_chart"
    }

    fn fetch_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        if !self.is_available() {
            return Err(DataError::RateLimited {
                retry_after_secs: 0,
            });
        }
        let url = chart_url(symbol, start, end);
        let bars = self
            .request(&url, symbol)?
            .into_iter()
            .filter(|b| b.date >= start && b.date <= end)
            .collect();
        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars,
            source: DataSource::YahooFinance,
        })
    }

    fn is_available(&self) -> bool {
        match self.cooldown_until.lock() {
            Ok(until) => until.map_or(true, |t| Instant::now() >= t),
            Err(_) => true,
        }
    }
}

/// Chart URL covering whole days `start..=end` (UTC).
pub fn chart_url(symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
    let period1 = start.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
    let period2 = end
        .succ_opt()
        .unwrap_or(end)
        .and_time(chrono::NaiveTime::MIN)
        .and_utc()
        .timestamp();
    format!(
        "{CHART_ENDPOINT}/{symbol}?period1={period1}&period2={period2}\
         &interval=1d&includeAdjustedClose=true&events=div%7Csplit"
    )
}

/// Decode a chart response body into ascending bars.
///
/// Rows with no prices at all (exchange holidays in the series) are skipped.
/// A missing adjusted close series falls back to the raw close.
pub fn parse_chart(symbol: &str, body: &str) -> Result<Vec<MarketBar>, DataError> {
    let envelope: ChartEnvelope = serde_json::from_str(body)
        .map_err(|e| DataError::ResponseFormatChanged(format!("{symbol}: {e}")))?;

    let series = match (envelope.chart.result, envelope.chart.error) {
        (Some(results), _) => results
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("empty result array".into()))?,
        (None, Some(fault)) if fault.code == "Not Found" => {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            })
        }
        (None, Some(fault)) => {
            return Err(DataError::ResponseFormatChanged(format!(
                "{}: {}",
                fault.code, fault.description
            )))
        }
        (None, None) => {
            return Err(DataError::ResponseFormatChanged(
                "neither result nor error".into(),
            ))
        }
    };

    let timestamps = series.timestamp.unwrap_or_default();
    let quotes = series
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| DataError::ResponseFormatChanged("no quote series".into()))?;
    let adjusted: Vec<Option<f64>> = series
        .indicators
        .adjclose
        .and_then(|a| a.into_iter().next())
        .map(|a| a.adjclose)
        .unwrap_or_default();

    let at = |v: &[Option<f64>], i: usize| v.get(i).copied().flatten();

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let date = chrono::DateTime::from_timestamp(ts, 0)
            .map(|dt| dt.date_naive())
            .ok_or_else(|| DataError::ResponseFormatChanged(format!("timestamp {ts}")))?;

        let (open, high, low, close) = (
            at(&quotes.open, i),
            at(&quotes.high, i),
            at(&quotes.low, i),
            at(&quotes.close, i),
        );
        let Some(close) = close else {
            if open.or(high).or(low).is_some() {
                debug!(symbol, %date, "bar without close skipped");
            }
            continue;
        };

        bars.push(MarketBar {
            date,
            open: open.unwrap_or(f64::NAN),
            high: high.unwrap_or(f64::NAN),
            low: low.unwrap_or(f64::NAN),
            close,
            volume: quotes.volume.get(i).copied().flatten().unwrap_or(0),
            adj_close: at(&adjusted, i).unwrap_or(close),
        });
    }

    if bars.is_empty() {
        return Err(DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        });
    }
    bars.sort_by_key(|b| b.date);
    bars.dedup_by_key(|b| b.date);
    Ok(bars)
}
