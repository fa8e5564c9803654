//! Domain types for MacroLab

pub mod bar;
pub mod record;
pub mod value;

pub use bar::{MarketBar, PriceField};
pub use record::{NumericField, RawEventRecord};
pub use value::Normalized;

/// Canonical statistic name, e.g. `"ISM Index"`.
pub type StatisticName = String;
