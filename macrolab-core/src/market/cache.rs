//! Local Parquet cache of daily bars.
//!
//! Layout: `{cache_dir}/symbol={SYMBOL}/bars.parquet` plus a `meta.json`
//! sidecar recording the covered range, bar count and a blake3 hash of the
//! bars. Writes go to a `.tmp` file and are renamed into place. A file that
//! fails validation on load is renamed to `.quarantined` and reported as a
//! cache miss.

use chrono::{Days, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use super::provider::{DataError, DataSource};
use crate::domain::MarketBar;

/// Cached bounds may sit this many days inside a requested range and still
/// cover it; requested bounds often fall on weekends or holidays.
const COVERAGE_SLACK_DAYS: u64 = 4;

const BAR_COLUMNS: [&str; 7] = ["date", "open", "high", "low", "close", "volume", "adj_close"];

/// Sidecar describing one cached symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMeta {
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub bar_count: usize,
    pub data_hash: String,
    pub source: DataSource,
    pub cached_at: chrono::NaiveDateTime,
}

/// How much of a requested range the cache holds.
#[derive(Debug, Clone, PartialEq)]
pub enum Coverage {
    Missing,
    Full,
    Partial {
        cached_start: NaiveDate,
        cached_end: NaiveDate,
    },
}

/// Parquet bar cache rooted at one directory.
#[derive(Debug, Clone)]
pub struct BarCache {
    root: PathBuf,
}

impl BarCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn symbol_dir(&self, symbol: &str) -> PathBuf {
        self.root.join(format!("symbol={symbol}"))
    }

    fn bars_path(&self, symbol: &str) -> PathBuf {
        self.symbol_dir(symbol).join("bars.parquet")
    }

    fn meta_path(&self, symbol: &str) -> PathBuf {
        self.symbol_dir(symbol).join("meta.json")
    }

    /// Replace the cached bars of `symbol`.
    pub fn store(
        &self,
        symbol: &str,
        bars: &[MarketBar],
        source: DataSource,
    ) -> Result<CacheMeta, DataError> {
        let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
            return Err(DataError::CacheError(format!("no bars to cache for {symbol}")));
        };

        fs::create_dir_all(self.symbol_dir(symbol))
            .map_err(|e| DataError::CacheError(format!("create dir: {e}")))?;

        let mut df = bars_to_frame(bars)?;
        let path = self.bars_path(symbol);
        let tmp = path.with_extension("parquet.tmp");
        let file = fs::File::create(&tmp)
            .map_err(|e| DataError::ParquetError(format!("create {}: {e}", tmp.display())))?;
        ParquetWriter::new(file)
            .finish(&mut df)
            .map_err(|e| DataError::ParquetError(format!("write: {e}")))?;
        fs::rename(&tmp, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            DataError::CacheError(format!("rename into place: {e}"))
        })?;

        let meta = CacheMeta {
            symbol: symbol.to_string(),
            start_date: first.date,
            end_date: last.date,
            bar_count: bars.len(),
            data_hash: hash_bars(bars)?,
            source,
            cached_at: chrono::Local::now().naive_local(),
        };
        let json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::CacheError(format!("meta encode: {e}")))?;
        fs::write(self.meta_path(symbol), json)
            .map_err(|e| DataError::CacheError(format!("meta write: {e}")))?;

        Ok(meta)
    }

    /// All cached bars of `symbol`, ascending.
    pub fn load(&self, symbol: &str) -> Result<Vec<MarketBar>, DataError> {
        let path = self.bars_path(symbol);
        if !path.exists() {
            return Err(DataError::NoCachedData {
                symbol: symbol.to_string(),
            });
        }

        match read_bars(&path) {
            Ok(mut bars) => {
                bars.sort_by_key(|b| b.date);
                Ok(bars)
            }
            Err(e) => {
                let quarantined = path.with_extension("parquet.quarantined");
                warn!(path = %path.display(), error = %e, "quarantining corrupt bar cache");
                let _ = fs::rename(&path, &quarantined);
                let _ = fs::remove_file(self.meta_path(symbol));
                Err(DataError::NoCachedData {
                    symbol: symbol.to_string(),
                })
            }
        }
    }

    /// Cached bars of `symbol` restricted to `[start, end]`.
    pub fn load_range(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<MarketBar>, DataError> {
        Ok(self
            .load(symbol)?
            .into_iter()
            .filter(|b| b.date >= start && b.date <= end)
            .collect())
    }

    pub fn meta(&self, symbol: &str) -> Option<CacheMeta> {
        let content = fs::read_to_string(self.meta_path(symbol)).ok()?;
        serde_json::from_str(&content).ok()
    }

    pub fn coverage(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Coverage {
        match self.meta(symbol) {
            None => Coverage::Missing,
            Some(m) if covers(&m, start, end) => Coverage::Full,
            Some(m) => Coverage::Partial {
                cached_start: m.start_date,
                cached_end: m.end_date,
            },
        }
    }

    /// Metadata of every symbol in the cache, sorted by symbol.
    pub fn entries(&self) -> Vec<CacheMeta> {
        let Ok(dir) = fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut metas: Vec<CacheMeta> = dir
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                name.strip_prefix("symbol=").and_then(|s| self.meta(s))
            })
            .collect();
        metas.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        metas
    }
}

fn covers(meta: &CacheMeta, start: NaiveDate, end: NaiveDate) -> bool {
    let slack = Days::new(COVERAGE_SLACK_DAYS);
    let start = start.checked_add_days(slack).unwrap_or(start);
    let end = end.checked_sub_days(slack).unwrap_or(end);
    meta.start_date <= start && meta.end_date >= end
}

/// blake3 hex digest of the JSON encoding of `bars`.
pub fn hash_bars(bars: &[MarketBar]) -> Result<String, DataError> {
    let encoded =
        serde_json::to_vec(bars).map_err(|e| DataError::CacheError(format!("hash encode: {e}")))?;
    Ok(blake3::hash(&encoded).to_hex().to_string())
}

// ── Parquet conversion ──────────────────────────────────────────────

fn epoch() -> NaiveDate {
    NaiveDate::default()
}

fn bars_to_frame(bars: &[MarketBar]) -> Result<DataFrame, DataError> {
    let days: Vec<i32> = bars
        .iter()
        .map(|b| (b.date - epoch()).num_days() as i32)
        .collect();
    let float = |f: fn(&MarketBar) -> f64| price_column(bars, f);

    DataFrame::new(vec![
        Column::new("date".into(), days)
            .cast(&DataType::Date)
            .map_err(|e| DataError::ParquetError(format!("date cast: {e}")))?,
        Column::new("open".into(), float(|b: &MarketBar| b.open)),
        Column::new("high".into(), float(|b: &MarketBar| b.high)),
        Column::new("low".into(), float(|b: &MarketBar| b.low)),
        Column::new("close".into(), float(|b: &MarketBar| b.close)),
        Column::new(
            "volume".into(),
            bars.iter().map(|b| b.volume).collect::<Vec<u64>>(),
        ),
        Column::new("adj_close".into(), float(|b: &MarketBar| b.adj_close)),
    ])
    .map_err(|e| DataError::ParquetError(format!("frame: {e}")))
}

fn price_column(bars: &[MarketBar], f: fn(&MarketBar) -> f64) -> Vec<f64> {
    bars.iter().map(f).collect()
}

fn read_bars(path: &Path) -> Result<Vec<MarketBar>, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::ParquetError(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read: {e}")))?;

    if df.height() == 0 {
        return Err(DataError::ValidationError("empty bar file".into()));
    }
    for name in BAR_COLUMNS {
        if df.column(name).is_err() {
            return Err(DataError::ValidationError(format!("missing column '{name}'")));
        }
    }

    let col = |name: &str| {
        df.column(name)
            .map_err(|e| DataError::ParquetError(format!("{name}: {e}")))
    };
    let typed = |name: &str, e: PolarsError| DataError::ParquetError(format!("{name} type: {e}"));

    let date = col("date")?;
    let date = date.date().map_err(|e| typed("date", e))?;
    let open = col("open")?;
    let open = open.f64().map_err(|e| typed("open", e))?;
    let high = col("high")?;
    let high = high.f64().map_err(|e| typed("high", e))?;
    let low = col("low")?;
    let low = low.f64().map_err(|e| typed("low", e))?;
    let close = col("close")?;
    let close = close.f64().map_err(|e| typed("close", e))?;
    let volume = col("volume")?;
    let volume = volume.u64().map_err(|e| typed("volume", e))?;
    let adj_close = col("adj_close")?;
    let adj_close = adj_close.f64().map_err(|e| typed("adj_close", e))?;

    (0..df.height())
        .map(|i| {
            let days = date
                .get(i)
                .ok_or_else(|| DataError::ValidationError(format!("null date at row {i}")))?;
            Ok(MarketBar {
                date: epoch() + chrono::Duration::days(i64::from(days)),
                open: open.get(i).unwrap_or(f64::NAN),
                high: high.get(i).unwrap_or(f64::NAN),
                low: low.get(i).unwrap_or(f64::NAN),
                close: close.get(i).unwrap_or(f64::NAN),
                volume: volume.get(i).unwrap_or(0),
                adj_close: adj_close.get(i).unwrap_or(f64::NAN),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_cache_dir() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = env::temp_dir().join(format!("macrolab_cache_{}_{id}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn bars() -> Vec<MarketBar> {
        (4..=6)
            .map(|d| MarketBar {
                date: NaiveDate::from_ymd_opt(2010, 1, d).unwrap(),
                open: 100.0 + d as f64,
                high: 102.0 + d as f64,
                low: 99.0 + d as f64,
                close: 101.0 + d as f64,
                volume: 1000 * d as u64,
                adj_close: 90.0 + d as f64,
            })
            .collect()
    }

    #[test]
    fn store_then_load() {
        let dir = temp_cache_dir();
        let cache = BarCache::new(&dir);

        let meta = cache.store("SPY", &bars(), DataSource::YahooFinance).unwrap();
        assert_eq!(meta.bar_count, 3);

        let loaded = cache.load("SPY").unwrap();
        assert_eq!(loaded, bars());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_range_filters() {
        let dir = temp_cache_dir();
        let cache = BarCache::new(&dir);
        cache.store("SPY", &bars(), DataSource::YahooFinance).unwrap();

        let d = |day| NaiveDate::from_ymd_opt(2010, 1, day).unwrap();
        let loaded = cache.load_range("SPY", d(5), d(30)).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].date, d(5));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_symbol_is_no_cached_data() {
        let dir = temp_cache_dir();
        let cache = BarCache::new(&dir);
        assert!(matches!(
            cache.load("QQQ"),
            Err(DataError::NoCachedData { .. })
        ));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupt_file_is_quarantined() {
        let dir = temp_cache_dir();
        let cache = BarCache::new(&dir);
        cache.store("SPY", &bars(), DataSource::YahooFinance).unwrap();
        fs::write(cache.bars_path("SPY"), b"not parquet").unwrap();

        assert!(matches!(
            cache.load("SPY"),
            Err(DataError::NoCachedData { .. })
        ));
        assert!(cache
            .bars_path("SPY")
            .with_extension("parquet.quarantined")
            .exists());
        assert!(cache.meta("SPY").is_none());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn coverage_and_entries() {
        let dir = temp_cache_dir();
        let cache = BarCache::new(&dir);
        cache.store("SPY", &bars(), DataSource::YahooFinance).unwrap();

        let d = |day| NaiveDate::from_ymd_opt(2010, 1, day).unwrap();
        assert_eq!(cache.coverage("SPY", d(4), d(6)), Coverage::Full);
        // Weekend bounds are still covered.
        assert_eq!(cache.coverage("SPY", d(2), d(9)), Coverage::Full);
        let early = NaiveDate::from_ymd_opt(2009, 12, 20).unwrap();
        assert_eq!(
            cache.coverage("SPY", early, d(6)),
            Coverage::Partial {
                cached_start: d(4),
                cached_end: d(6)
            }
        );
        assert_eq!(cache.coverage("QQQ", d(4), d(6)), Coverage::Missing);

        let entries = cache.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].symbol, "SPY");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn hash_changes_with_data() {
        let mut changed = bars();
        changed[0].close += 1.0;
        assert_ne!(hash_bars(&bars()).unwrap(), hash_bars(&changed).unwrap());
    }
}
