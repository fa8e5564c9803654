//! Market bar loading for the pipeline.
//!
//! Fallback policy for one symbol over `[start, end]`:
//! 1. If the cache covers the range → use it
//! 2. Otherwise, if a provider is available and we are online → download,
//!    cache, use
//! 3. If a partial cache exists → use what it holds (missing joins are
//!    counted downstream)
//! 4. If `synthetic` is set → generate a seeded random walk (tagged)
//! 5. Otherwise → fail with a clear error

use chrono::{Datelike, Days, NaiveDate, Weekday};
use thiserror::Error;
use tracing::{info, warn};

use macrolab_core::domain::MarketBar;
use macrolab_core::market::{hash_bars, BarCache, Coverage, DataError, DataSource, MarketDataProvider};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no cached data for '{symbol}' and no network access (use --synthetic for synthetic data)")]
    NoCachedDataOffline { symbol: String },

    #[error("no cached data for '{symbol}' and download failed: {reason}")]
    DownloadFailed { symbol: String, reason: String },

    #[error("data error: {0}")]
    Data(#[from] DataError),
}

/// Options controlling how bars are loaded.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Never make network requests.
    pub offline: bool,
    /// Generate synthetic bars when real data is unavailable.
    pub synthetic: bool,
    /// Re-download even if cached.
    pub force: bool,
}

impl LoadOptions {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end,
            offline: false,
            synthetic: false,
            force: false,
        }
    }
}

/// Bars for one symbol with provenance.
#[derive(Debug, Clone)]
pub struct LoadedBars {
    pub symbol: String,
    pub bars: Vec<MarketBar>,
    pub source: DataSource,
    /// blake3 over the bars, for manifests.
    pub dataset_hash: String,
}

impl LoadedBars {
    pub fn is_synthetic(&self) -> bool {
        self.source == DataSource::Synthetic
    }
}

/// Load bars for `symbol` from the cache, with fallback to download or synthetic.
pub fn load_bars(
    symbol: &str,
    cache: &BarCache,
    provider: Option<&dyn MarketDataProvider>,
    opts: &LoadOptions,
) -> Result<LoadedBars, LoadError> {
    let coverage = cache.coverage(symbol, opts.start, opts.end);

    // Step 1: full cache hit
    if !opts.force && coverage == Coverage::Full {
        match cache.load_range(symbol, opts.start, opts.end) {
            Ok(bars) if !bars.is_empty() => {
                info!(symbol, bars = bars.len(), "bars loaded from cache");
                return finish(symbol, bars, DataSource::Cache);
            }
            Ok(_) => warn!(symbol, "cache holds no bars in range"),
            Err(e) => warn!(symbol, error = %e, "cache read failed"),
        }
    }

    // Step 2: download
    let mut download_error = None;
    if !opts.offline {
        if let Some(prov) = provider.filter(|p| p.is_available()) {
            match prov.fetch_bars(symbol, opts.start, opts.end) {
                Ok(fetched) => {
                    let bars: Vec<MarketBar> =
                        fetched.bars.into_iter().filter(MarketBar::is_sane).collect();
                    if !bars.is_empty() {
                        let meta = cache.store(symbol, &bars, fetched.source)?;
                        info!(
                            symbol,
                            provider = prov.name(),
                            bars = meta.bar_count,
                            "bars downloaded and cached"
                        );
                        return finish(symbol, bars, fetched.source);
                    }
                    download_error = Some("provider returned no usable bars".to_string());
                }
                Err(e) => {
                    warn!(symbol, provider = prov.name(), error = %e, "download failed");
                    download_error = Some(e.to_string());
                }
            }
        }
    }

    // Step 3: partial cache
    if !opts.force {
        if let Coverage::Partial {
            cached_start,
            cached_end,
        } = coverage
        {
            if let Ok(bars) = cache.load_range(symbol, opts.start, opts.end) {
                if !bars.is_empty() {
                    warn!(
                        symbol,
                        %cached_start,
                        %cached_end,
                        "using partial cache; rows outside it will not join"
                    );
                    return finish(symbol, bars, DataSource::Cache);
                }
            }
        }
    }

    // Step 4: synthetic
    if opts.synthetic {
        warn!(symbol, "generating synthetic bars; labels are not real returns");
        let bars = generate_synthetic_bars(symbol, opts.start, opts.end);
        return finish(symbol, bars, DataSource::Synthetic);
    }

    // Step 5: fail
    if opts.offline || provider.is_none() {
        return Err(LoadError::NoCachedDataOffline {
            symbol: symbol.to_string(),
        });
    }
    Err(LoadError::DownloadFailed {
        symbol: symbol.to_string(),
        reason: download_error.unwrap_or_else(|| "provider unavailable".into()),
    })
}

fn finish(symbol: &str, bars: Vec<MarketBar>, source: DataSource) -> Result<LoadedBars, LoadError> {
    let dataset_hash = hash_bars(&bars)?;
    Ok(LoadedBars {
        symbol: symbol.to_string(),
        bars,
        source,
        dataset_hash,
    })
}

/// Seeded random walk over weekdays, starting at 100.
fn generate_synthetic_bars(symbol: &str, start: NaiveDate, end: NaiveDate) -> Vec<MarketBar> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let mut bars = Vec::new();
    let mut price = 100.0_f64;
    let mut current = start;

    while current <= end {
        if !matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            let daily_return: f64 = rng.gen_range(-0.02..0.02);
            let open = price;
            let close = price * (1.0 + daily_return);
            bars.push(MarketBar {
                date: current,
                open,
                high: open.max(close) * (1.0 + rng.gen_range(0.0..0.01)),
                low: open.min(close) * (1.0 - rng.gen_range(0.0..0.01)),
                close,
                volume: rng.gen_range(500_000..5_000_000u64),
                adj_close: close,
            });
            price = close;
        }
        let Some(next) = current.checked_add_days(Days::new(1)) else {
            break;
        };
        current = next;
    }

    bars
}

#[cfg(test)]
mod tests {
    use super::*;
    use macrolab_core::market::StaticProvider;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_cache_dir() -> std::path::PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir()
            .join(format!("macrolab_loader_test_{}_{id}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_bars() -> Vec<MarketBar> {
        (0..5)
            .map(|i| MarketBar {
                date: ymd(2010, 1, 4 + i),
                open: 100.0 + i as f64,
                high: 102.0 + i as f64,
                low: 99.0 + i as f64,
                close: 101.0 + i as f64,
                volume: 1000,
                adj_close: 101.0 + i as f64,
            })
            .collect()
    }

    fn opts(offline: bool) -> LoadOptions {
        LoadOptions {
            offline,
            ..LoadOptions::new(ymd(2010, 1, 4), ymd(2010, 1, 8))
        }
    }

    #[test]
    fn load_from_cache_succeeds() {
        let dir = temp_cache_dir();
        let cache = BarCache::new(&dir);
        cache.store("SPY", &sample_bars(), DataSource::YahooFinance).unwrap();

        let loaded = load_bars("SPY", &cache, None, &opts(true)).unwrap();
        assert_eq!(loaded.source, DataSource::Cache);
        assert_eq!(loaded.bars.len(), 5);
        assert!(!loaded.dataset_hash.is_empty());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn download_populates_cache() {
        let dir = temp_cache_dir();
        let cache = BarCache::new(&dir);
        let provider = StaticProvider::new(sample_bars());

        let loaded = load_bars("SPY", &cache, Some(&provider), &opts(false)).unwrap();
        assert_eq!(loaded.bars.len(), 5);
        assert_eq!(cache.coverage("SPY", ymd(2010, 1, 4), ymd(2010, 1, 8)), Coverage::Full);

        let again = load_bars("SPY", &cache, None, &opts(true)).unwrap();
        assert_eq!(again.source, DataSource::Cache);
        assert_eq!(again.dataset_hash, loaded.dataset_hash);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn offline_without_cache_fails() {
        let dir = temp_cache_dir();
        let cache = BarCache::new(&dir);
        let provider = StaticProvider::new(sample_bars());

        let result = load_bars("SPY", &cache, Some(&provider), &opts(true));
        assert!(matches!(result, Err(LoadError::NoCachedDataOffline { .. })));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn failed_download_reports_reason() {
        let dir = temp_cache_dir();
        let cache = BarCache::new(&dir);
        let empty = StaticProvider::default();

        match load_bars("SPY", &cache, Some(&empty), &opts(false)) {
            Err(LoadError::DownloadFailed { symbol, reason }) => {
                assert_eq!(symbol, "SPY");
                assert!(reason.contains("SPY"), "{reason}");
            }
            other => panic!("expected DownloadFailed, got {other:?}"),
        }

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn synthetic_fallback_is_deterministic_and_tagged() {
        let dir = temp_cache_dir();
        let cache = BarCache::new(&dir);
        let mut options = opts(true);
        options.synthetic = true;
        options.end = ymd(2010, 3, 31);

        let a = load_bars("SPY", &cache, None, &options).unwrap();
        let b = load_bars("SPY", &cache, None, &options).unwrap();
        assert!(a.is_synthetic());
        assert_eq!(a.bars, b.bars);
        assert!(a.bars.iter().all(|bar| bar.date.weekday().number_from_monday() <= 5));
        assert!(a.bars.iter().all(MarketBar::is_sane));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
