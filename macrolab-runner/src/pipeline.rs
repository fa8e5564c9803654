//! Dataset build: records and bars in, partitioned matrices out.
//!
//! Two entry points:
//! - `run_pipeline()`: reads the record store, loads bars through the cache
//!   and provider, then builds. Used by the CLI.
//! - `build_datasets()`: takes records and a market index already in memory.
//!
//! Stage order: canonicalize → normalize → align → pivot → label join →
//! normalize columns → (optional shuffle) → partition. Data problems are
//! counted in [`RunDiagnostics`]; only configuration and I/O fail a run.

use chrono::{Days, NaiveDate};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{info, warn};

use macrolab_core::calendar::{parse_event_date, SessionAligner};
use macrolab_core::canonicalize::RowCanonicalizer;
use macrolab_core::domain::RawEventRecord;
use macrolab_core::features::{
    finish_labels, EventPreparer, FeatureMatrix, FeatureMatrixBuilder, ForecastVariant,
    LabelBuilder, LabelMatrix,
};
use macrolab_core::market::{BarCache, DataSource, LabelBasis, MarketDataProvider, MarketIndex};
use macrolab_core::normalize::{SynonymTable, ValueNormalizer};
use macrolab_core::partition::{DatasetPartitioner, PartitionError, Split};
use macrolab_core::store::{RecordStore, StoreError};
use macrolab_core::RunDiagnostics;

use crate::config::{ConfigError, PipelineConfig};
use crate::data_loader::{load_bars, LoadError, LoadOptions};

/// Current schema version of exported artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Days of market data fetched beyond the first and last event.
const RANGE_MARGIN_DAYS: u64 = 30;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("record store: {0}")]
    Store(#[from] StoreError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("split: {0}")]
    Split(#[from] PartitionError),
    #[error("no record in {0} has a parsable date")]
    NoDatedRecords(String),
}

/// Switches for how market data may be obtained.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub offline: bool,
    pub synthetic: bool,
    pub force_download: bool,
}

/// Features and both label bases of one forecast variant, partitioned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantDataset {
    pub variant: ForecastVariant,
    pub features: Split<FeatureMatrix>,
    pub labels_raw: Split<LabelMatrix>,
    pub labels_adjusted: Split<LabelMatrix>,
}

impl VariantDataset {
    pub fn labels(&self, basis: LabelBasis) -> &Split<LabelMatrix> {
        match basis {
            LabelBasis::Raw => &self.labels_raw,
            LabelBasis::Adjusted => &self.labels_adjusted,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.features
            .parts()
            .iter()
            .map(|(_, part)| part.n_rows())
            .sum()
    }
}

/// Everything a build produced, before export.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub datasets: Vec<VariantDataset>,
    pub diagnostics: RunDiagnostics,
    /// Events that survived preparation.
    pub events: usize,
}

/// A full run: build output plus provenance for the manifest.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub build: BuildOutput,
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub bar_count: usize,
    pub bar_source: DataSource,
    /// blake3 of the record store file.
    pub input_hash: String,
    pub dataset_hash: String,
    pub config_hash: String,
}

/// Read records, load bars, build.
pub fn run_pipeline(
    config: &PipelineConfig,
    provider: Option<&dyn MarketDataProvider>,
    options: RunOptions,
) -> Result<RunOutput, RunError> {
    config.validate()?;
    let custom_synonyms = config.load_synonyms()?;
    let synonyms = custom_synonyms
        .as_ref()
        .unwrap_or_else(|| SynonymTable::builtin());

    let store = RecordStore::new(&config.data.records);
    let records = store.load()?;
    let input_hash = store.content_hash()?;
    info!(path = %store.path().display(), records = records.len(), "records loaded");

    let (first, last) = record_date_span(&records)
        .ok_or_else(|| RunError::NoDatedRecords(store.path().display().to_string()))?;
    let margin = Days::new(RANGE_MARGIN_DAYS);
    let start_date = config
        .data
        .start_date
        .unwrap_or_else(|| first.checked_sub_days(margin).unwrap_or(first));
    let end_date = config
        .data
        .end_date
        .unwrap_or_else(|| last.checked_add_days(margin).unwrap_or(last));

    let cache = BarCache::new(&config.data.cache_dir);
    let load_opts = LoadOptions {
        offline: options.offline,
        synthetic: options.synthetic,
        force: options.force_download,
        ..LoadOptions::new(start_date, end_date)
    };
    let loaded = load_bars(&config.data.symbol, &cache, provider, &load_opts)?;
    let bar_count = loaded.bars.len();
    let index = MarketIndex::from_bars(loaded.bars);
    if index.len() < bar_count {
        warn!(
            void = bar_count - index.len(),
            "void bars excluded from the session calendar"
        );
    }

    let build = build_datasets(&records, &index, synonyms, config)?;

    Ok(RunOutput {
        build,
        symbol: config.data.symbol.clone(),
        start_date,
        end_date,
        bar_count,
        bar_source: loaded.source,
        input_hash,
        dataset_hash: loaded.dataset_hash,
        config_hash: config.config_hash(),
    })
}

/// Earliest and latest parsable release date.
pub fn record_date_span(records: &[RawEventRecord]) -> Option<(NaiveDate, NaiveDate)> {
    let mut dates = records
        .iter()
        .filter_map(|r| parse_event_date(&r.year, &r.week, &r.date).ok());
    let first = dates.next()?;
    Some(dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d))))
}

/// Build both forecast variants from in-memory inputs.
pub fn build_datasets(
    records: &[RawEventRecord],
    index: &MarketIndex,
    synonyms: &SynonymTable,
    config: &PipelineConfig,
) -> Result<BuildOutput, RunError> {
    let partitioner = DatasetPartitioner::new(config.split.ratios())?;
    let max_walk_days = config.alignment.max_walk_days;
    let mut diagnostics = RunDiagnostics::new();
    diagnostics.records_in += records.len();

    let preparer = EventPreparer::new(
        RowCanonicalizer::new(synonyms),
        ValueNormalizer::new(synonyms),
        SessionAligner::new(index).with_max_walk_days(max_walk_days),
    );
    let events = preparer.prepare(records, &mut diagnostics);

    // Labels depend only on row dates, which every variant shares.
    let row_dates: Vec<NaiveDate> = events
        .iter()
        .map(|e| e.row_date())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let labels = LabelBuilder::new(index, max_walk_days).build(&row_dates);
    let dropped: BTreeSet<NaiveDate> = labels.dropped.iter().copied().collect();
    diagnostics.dropped_rows += dropped.len();
    diagnostics.missing_market_join += events
        .iter()
        .filter(|e| dropped.contains(&e.row_date()))
        .count();
    let keep: BTreeSet<NaiveDate> = labels.raw.index.iter().copied().collect();

    let mut labels_raw = finish_labels(labels.raw, LabelBasis::Raw.name(), &mut diagnostics);
    let mut labels_adjusted =
        finish_labels(labels.adjusted, LabelBasis::Adjusted.name(), &mut diagnostics);

    let order = row_order(keep.len(), config.split.shuffle_seed);
    if let Some(order) = &order {
        labels_raw = labels_raw.select_rows(order);
        labels_adjusted = labels_adjusted.select_rows(order);
    }
    let labels_raw = partitioner.partition_matrix(&labels_raw);
    let labels_adjusted = partitioner.partition_matrix(&labels_adjusted);

    let mut datasets = Vec::with_capacity(ForecastVariant::ALL.len());
    for variant in ForecastVariant::ALL {
        let builder = FeatureMatrixBuilder::new(variant);
        let sparse = builder.pivot(&events).retain_dates(&keep);
        let mut features = builder.finish(sparse, &mut diagnostics);
        if let Some(order) = &order {
            features = features.select_rows(order);
        }
        info!(
            %variant,
            rows = features.n_rows(),
            columns = features.n_cols(),
            "feature matrix built"
        );
        datasets.push(VariantDataset {
            variant,
            features: partitioner.partition_matrix(&features),
            labels_raw: labels_raw.clone(),
            labels_adjusted: labels_adjusted.clone(),
        });
    }

    info!(
        records = diagnostics.records_in,
        events = events.len(),
        rows = keep.len(),
        dropped_rows = diagnostics.dropped_rows,
        "datasets built"
    );

    Ok(BuildOutput {
        datasets,
        diagnostics,
        events: events.len(),
    })
}

/// Seeded permutation of `0..n`, or `None` to keep chronological order.
fn row_order(n: usize, seed: Option<u64>) -> Option<Vec<usize>> {
    let seed = seed?;
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));
    Some(order)
}
