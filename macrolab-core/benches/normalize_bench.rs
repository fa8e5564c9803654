//! Criterion benchmarks for MacroLab hot paths.
//!
//! Benchmarks:
//! 1. Single-cell normalization across the rule families
//! 2. Record preparation (canonicalize, normalize, align) over a week batch
//! 3. Feature pivot and column normalization

use chrono::{Datelike, NaiveDate, Weekday};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use macrolab_core::calendar::SessionAligner;
use macrolab_core::canonicalize::RowCanonicalizer;
use macrolab_core::domain::RawEventRecord;
use macrolab_core::features::{EventPreparer, FeatureMatrixBuilder, ForecastVariant};
use macrolab_core::normalize::{SynonymTable, ValueNormalizer};
use macrolab_core::RunDiagnostics;

// ── Helpers ──────────────────────────────────────────────────────────

const CELLS: [&str; 12] = [
    "350K",
    "-$36.4B",
    "1.25 mln",
    "2.5%",
    "0,3%",
    "0 to 0.25%",
    "25bp",
    "1,234,567",
    "Unch",
    "---",
    "NAPM Index",
    "8:30 am",
];

const STATISTICS: [(&str, &str, &str, &str); 6] = [
    ("Initial Claims", "8:30 am", "444", "435"),
    ("Retail Sales", "8:30 am", "-0.3%", "0.5%"),
    ("NAPM Index", "10:00 am", "55.9", "54.5"),
    ("Trade Balance", "8:30 am", "-36.4", "-35.0"),
    ("Consumer Credit", "3:00 pm", "-$17.5B", "-$10.0B"),
    ("CPI", "8:30 am", "0.1%", "0.2%"),
];

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

fn weekdays(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// `n` records spread over consecutive calendar days of 2010.
fn make_records(n: usize) -> Vec<RawEventRecord> {
    let start = NaiveDate::from_ymd_opt(2010, 1, 4).unwrap();
    (0..n)
        .map(|i| {
            let date = start + chrono::Duration::days((i / STATISTICS.len()) as i64 % 360);
            let (statistic, time, actual, forecast) = STATISTICS[i % STATISTICS.len()];
            RawEventRecord {
                year: date.year().to_string(),
                week: date.iso_week().week().to_string(),
                date: format!("{} {}", MONTHS[date.month0() as usize], date.day()),
                time: time.to_string(),
                statistic: statistic.to_string(),
                period: "Dec".to_string(),
                actual: actual.to_string(),
                briefing_forecast: forecast.to_string(),
                market_expects: forecast.to_string(),
                prior: forecast.to_string(),
                revised: String::new(),
            }
        })
        .collect()
}

// ── 1. Cell Normalization ────────────────────────────────────────────

fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize_cell");
    let normalizer = ValueNormalizer::builtin();

    for cell in CELLS {
        group.bench_with_input(BenchmarkId::from_parameter(cell), cell, |b, cell| {
            b.iter(|| normalizer.normalize(black_box(cell)));
        });
    }

    group.finish();
}

// ── 2. Record Preparation ────────────────────────────────────────────

fn bench_prepare(c: &mut Criterion) {
    let mut group = c.benchmark_group("prepare_records");
    let synonyms = SynonymTable::builtin();
    let calendar = weekdays;

    for &count in &[60, 600, 6000] {
        let records = make_records(count);
        group.bench_with_input(BenchmarkId::new("prepare", count), &count, |b, _| {
            let preparer = EventPreparer::new(
                RowCanonicalizer::new(synonyms),
                ValueNormalizer::new(synonyms),
                SessionAligner::new(&calendar),
            );
            b.iter(|| {
                let mut diag = RunDiagnostics::new();
                preparer.prepare(black_box(&records), &mut diag)
            });
        });
    }

    group.finish();
}

// ── 3. Feature Matrix ────────────────────────────────────────────────

fn bench_feature_matrix(c: &mut Criterion) {
    let mut group = c.benchmark_group("feature_matrix");
    let synonyms = SynonymTable::builtin();
    let calendar = weekdays;
    let preparer = EventPreparer::new(
        RowCanonicalizer::new(synonyms),
        ValueNormalizer::new(synonyms),
        SessionAligner::new(&calendar),
    );
    let builder = FeatureMatrixBuilder::new(ForecastVariant::Briefing);

    for &count in &[600, 6000] {
        let mut diag = RunDiagnostics::new();
        let events = preparer.prepare(&make_records(count), &mut diag);
        group.bench_with_input(BenchmarkId::new("pivot_and_finish", count), &count, |b, _| {
            b.iter(|| {
                let mut diag = RunDiagnostics::new();
                builder.build(black_box(&events), &mut diag)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_normalize, bench_prepare, bench_feature_matrix);
criterion_main!(benches);
