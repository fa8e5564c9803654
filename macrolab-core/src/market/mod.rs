//! Market data: provider trait, Yahoo chart provider, Parquet bar cache and
//! the in-memory index the pipeline joins against.

pub mod cache;
pub mod index;
pub mod provider;
pub mod yahoo;

pub use cache::{hash_bars, BarCache, CacheMeta, Coverage};
pub use index::{JoinError, JoinedBars, LabelBasis, MarketIndex, MarketJoiner};
pub use provider::{DataError, DataSource, FetchResult, MarketDataProvider, StaticProvider};
pub use yahoo::YahooChartProvider;
