//! MacroLab Core: economic-calendar records to aligned feature and label matrices.
//!
//! This crate holds every stage that does not touch configuration files or
//! artifact output:
//! - Raw record types and the CSV record store
//! - Weekly calendar feed trait and ingestion loop
//! - Row canonicalization and value normalization
//! - Release timing and trading-session alignment
//! - Market-data provider, Parquet bar cache and the joinable market index
//! - Surprise feature matrices, forward-return labels, ordered partitioning
//!
//! Nothing here fails a run on bad data. Degradations are counted in
//! [`RunDiagnostics`].

pub mod calendar;
pub mod canonicalize;
pub mod diagnostics;
pub mod domain;
pub mod feed;
pub mod features;
pub mod market;
pub mod normalize;
pub mod partition;
pub mod store;

pub use diagnostics::RunDiagnostics;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: result and configuration types cross threads.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::RawEventRecord>();
        require_sync::<domain::RawEventRecord>();
        require_send::<domain::MarketBar>();
        require_sync::<domain::MarketBar>();
        require_send::<domain::Normalized>();
        require_sync::<domain::Normalized>();

        require_send::<normalize::SynonymTable>();
        require_sync::<normalize::SynonymTable>();
        require_send::<market::MarketIndex>();
        require_sync::<market::MarketIndex>();
        require_send::<market::BarCache>();
        require_sync::<market::BarCache>();

        require_send::<features::FeatureMatrix>();
        require_sync::<features::FeatureMatrix>();
        require_send::<features::AlignedEvent>();
        require_sync::<features::AlignedEvent>();
        require_send::<partition::SplitConfig>();
        require_sync::<partition::SplitConfig>();
        require_send::<RunDiagnostics>();
        require_sync::<RunDiagnostics>();
    }

    /// The normalizer and canonicalizer share one synonym table by reference.
    #[test]
    fn stages_share_the_builtin_table() {
        let table = normalize::SynonymTable::builtin();
        let normalizer = normalize::ValueNormalizer::new(table);
        let canonicalizer = canonicalize::RowCanonicalizer::new(table);
        assert!(std::ptr::eq(normalizer.synonyms(), table));
        assert_eq!(
            canonicalizer.rule_names(),
            vec![
                "known_bad_values",
                "billions_suffix",
                "thousands_suffix",
                "retail_sales_decimal"
            ]
        );
    }
}
