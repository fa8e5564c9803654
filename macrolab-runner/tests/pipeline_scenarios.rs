//! End-to-end dataset builds over the sample calendar.
//!
//! The fixture holds ten scraped rows covering the degradation paths: a
//! renamed statistic, a missing actual, missing forecasts, a duplicate
//! release, an unparsable time, and thousands cells without their `K`.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use std::path::PathBuf;

use macrolab_core::domain::{MarketBar, RawEventRecord};
use macrolab_core::features::ForecastVariant;
use macrolab_core::market::{DataSource, MarketIndex, StaticProvider};
use macrolab_core::normalize::SynonymTable;
use macrolab_core::store::{read_records, RecordStore};
use macrolab_runner::{
    build_datasets, export_run, import_manifest, run_pipeline, PipelineConfig, RunOptions,
};

// ── Helpers ──────────────────────────────────────────────────────────

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .join("macrolab-core/tests/fixtures/calendar_sample.csv")
}

fn sample_records() -> Vec<RawEventRecord> {
    let content = std::fs::read_to_string(fixture_path()).unwrap();
    read_records(content.as_bytes()).unwrap()
}

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Weekday bars over `[start, end]` with varying, sane prices.
fn bars_between(start: NaiveDate, end: NaiveDate) -> Vec<MarketBar> {
    let mut bars = Vec::new();
    let mut date = start;
    let mut i = 0u32;
    while date <= end {
        if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            let open = 100.0 + f64::from(i) * 0.1 + f64::from(i % 5);
            let close = open + f64::from(i % 3) - 1.0;
            bars.push(MarketBar {
                date,
                open,
                high: open + 2.0,
                low: open - 2.0,
                close,
                volume: 1_000_000,
                adj_close: close * 0.9,
            });
            i += 1;
        }
        date = date.checked_add_days(Days::new(1)).unwrap();
    }
    bars
}

fn full_index() -> MarketIndex {
    MarketIndex::from_bars(bars_between(ymd(2009, 11, 2), ymd(2010, 3, 31)))
}

// ── Scenarios ────────────────────────────────────────────────────────

#[test]
fn sample_calendar_builds_both_variants() {
    let config = PipelineConfig::new(fixture_path());
    let output = build_datasets(
        &sample_records(),
        &full_index(),
        SynonymTable::builtin(),
        &config,
    )
    .unwrap();

    let diag = &output.diagnostics;
    assert_eq!(diag.records_in, 10);
    assert_eq!(diag.unparsable_timing, 1);
    assert_eq!(diag.missing_actual, 1);
    assert_eq!(diag.missing_forecast, 1);
    assert_eq!(diag.duplicate_cells, 1);
    assert_eq!(diag.no_session_found, 0);
    assert_eq!(diag.missing_market_join, 0);
    assert_eq!(diag.corrections.get("thousands_suffix"), Some(&6));
    assert_eq!(output.events, 6);

    assert_eq!(output.datasets.len(), 2);
    for dataset in &output.datasets {
        assert_eq!(dataset.n_rows(), 6);
        // floor(0.6 * 6) = 3, floor(0.8 * 6) = 4
        assert_eq!(dataset.features.train.n_rows(), 3);
        assert_eq!(dataset.features.validation.n_rows(), 1);
        assert_eq!(dataset.features.test.n_rows(), 2);
        assert_eq!(dataset.features.train.columns, vec!["ISM Index", "Initial Claims"]);
        assert_eq!(dataset.labels_raw.train.index, dataset.features.train.index);
        assert_eq!(dataset.labels_adjusted.test.index, dataset.features.test.index);
    }

    // AM releases land on the prior session; ISM on Friday Jan 1.
    let briefing = &output.datasets[0];
    assert_eq!(briefing.variant, ForecastVariant::Briefing);
    assert_eq!(
        briefing.features.train.index,
        vec![ymd(2010, 1, 1), ymd(2010, 1, 6), ymd(2010, 1, 13)]
    );
    assert_eq!(briefing.features.test.index, vec![ymd(2010, 1, 27), ymd(2010, 2, 3)]);
}

#[test]
fn normalized_columns_are_centered_and_single_observations_zeroed() {
    let config = PipelineConfig::new(fixture_path());
    let output = build_datasets(
        &sample_records(),
        &full_index(),
        SynonymTable::builtin(),
        &config,
    )
    .unwrap();

    for dataset in &output.datasets {
        let rows: Vec<&Vec<f64>> = dataset
            .features
            .parts()
            .into_iter()
            .flat_map(|(_, part)| part.rows.iter())
            .collect();
        let claims_mean: f64 = rows.iter().map(|r| r[1]).sum::<f64>() / rows.len() as f64;
        assert!(claims_mean.abs() < 1e-9, "{}: mean {claims_mean}", dataset.variant);
        // One ISM observation has zero range.
        assert!(rows.iter().all(|r| r[0] == 0.0));
    }
    assert!(output
        .diagnostics
        .degenerate_columns
        .contains(&"briefing/ISM Index".to_string()));
    assert!(output
        .diagnostics
        .degenerate_columns
        .contains(&"market/ISM Index".to_string()));
}

#[test]
fn events_without_a_next_session_are_dropped() {
    // Bars end on the Feb 4 release's close-before session.
    let index = MarketIndex::from_bars(bars_between(ymd(2009, 11, 2), ymd(2010, 2, 3)));
    let config = PipelineConfig::new(fixture_path());
    let output =
        build_datasets(&sample_records(), &index, SynonymTable::builtin(), &config).unwrap();

    assert_eq!(output.diagnostics.no_session_found, 1);
    assert_eq!(output.diagnostics.missing_market_join, 0);
    assert_eq!(output.diagnostics.dropped_records(), 2);
    assert_eq!(output.events, 5);
    for dataset in &output.datasets {
        assert_eq!(dataset.n_rows(), 5);
        assert!(!dataset.features.test.index.contains(&ymd(2010, 2, 3)));
    }
}

#[test]
fn seeded_shuffle_is_reproducible_and_keeps_rows_paired() {
    let mut config = PipelineConfig::new(fixture_path());
    config.split.shuffle_seed = Some(42);
    let records = sample_records();
    let index = full_index();

    let a = build_datasets(&records, &index, SynonymTable::builtin(), &config).unwrap();
    let b = build_datasets(&records, &index, SynonymTable::builtin(), &config).unwrap();
    assert_eq!(a.datasets, b.datasets);

    for dataset in &a.datasets {
        let mut dates: Vec<NaiveDate> = dataset
            .features
            .parts()
            .into_iter()
            .flat_map(|(_, part)| part.index.iter().copied())
            .collect();
        for ((_, features), (_, labels)) in dataset
            .features
            .parts()
            .into_iter()
            .zip(dataset.labels_raw.parts())
        {
            assert_eq!(features.index, labels.index);
        }
        dates.sort();
        assert_eq!(dates.len(), 6);
        assert_eq!(dates[0], ymd(2010, 1, 1));
    }
}

#[test]
fn run_and_export_write_every_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let records_path = dir.path().join("econ_calendar.csv");
    RecordStore::new(&records_path)
        .save(&sample_records())
        .unwrap();

    let mut config = PipelineConfig::new(&records_path);
    config.data.cache_dir = dir.path().join("cache");
    let provider = StaticProvider::new(bars_between(ymd(2009, 11, 2), ymd(2010, 3, 31)));

    let run = run_pipeline(&config, Some(&provider), RunOptions::default()).unwrap();
    assert_eq!(run.start_date, ymd(2009, 12, 5));
    assert_eq!(run.end_date, ymd(2010, 3, 6));
    assert_eq!(run.bar_source, DataSource::Synthetic);

    let out = dir.path().join("out");
    let manifest = export_run(&out, &run).unwrap();
    for variant in ["briefing", "market"] {
        for split in ["train", "validation", "test"] {
            for stem in ["features", "labels_raw", "labels_adjusted"] {
                let path = out.join(variant).join(format!("{split}_{stem}.csv"));
                assert!(path.is_file(), "missing {}", path.display());
            }
        }
    }
    let header = std::fs::read_to_string(out.join("market/train_labels_raw.csv")).unwrap();
    assert!(header.starts_with("date,open_after,high_after,low_after,close_after,adj_close_after"));

    let json = std::fs::read_to_string(out.join("manifest.json")).unwrap();
    let loaded = import_manifest(&json).unwrap();
    assert_eq!(loaded, manifest);
    assert_eq!(loaded.variants.len(), 2);
    assert_eq!(loaded.variants[0].rows.train, 3);
    assert_eq!(loaded.diagnostics.duplicate_cells, 1);
    assert_eq!(loaded.input_hash.len(), 64);

    // Second run is served from the cache, offline.
    let offline = RunOptions {
        offline: true,
        ..RunOptions::default()
    };
    let again = run_pipeline(&config, None, offline).unwrap();
    assert_eq!(again.bar_source, DataSource::Cache);
    assert_eq!(again.input_hash, run.input_hash);
    assert_eq!(again.build.datasets, run.build.datasets);
}
