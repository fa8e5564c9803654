//! MacroLab CLI: scrape, download, build, normalize and cache commands.
//!
//! Commands:
//! - `scrape` - fetch weekly calendar pages into the record CSV
//! - `download` - fetch daily bars from Yahoo Finance and cache as Parquet
//! - `build` - run the dataset pipeline from a TOML config and export it
//! - `normalize` - show how cell values normalize
//! - `cache status` - report cached symbols, date ranges and sizes

use anyhow::{bail, Context, Result};
use chrono::{Datelike, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use macrolab_core::domain::Normalized;
use macrolab_core::feed::{collect_weeks, HttpWeekFeed, TableRowParser};
use macrolab_core::market::{BarCache, DataSource, MarketDataProvider, YahooChartProvider};
use macrolab_core::normalize::{SynonymTable, ValueNormalizer};
use macrolab_core::store::RecordStore;
use macrolab_core::RunDiagnostics;
use macrolab_runner::{
    export_run, load_bars, run_pipeline, LoadOptions, PipelineConfig, RunOptions, RunOutput,
};

#[derive(Parser)]
#[command(
    name = "macrolab",
    about = "MacroLab CLI - economic-calendar surprise datasets"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch weekly economic-calendar pages and save the raw records as CSV.
    Scrape {
        /// First calendar year to fetch.
        #[arg(long)]
        start_year: i32,

        /// Last calendar year to fetch (inclusive). Defaults to the start year.
        #[arg(long)]
        end_year: Option<i32>,

        /// Record CSV to write.
        #[arg(long, default_value = "data/econ_calendar.csv")]
        out: PathBuf,

        /// Base URL of the week pages.
        #[arg(long)]
        base_url: Option<String>,

        /// Delay between page requests, in milliseconds.
        #[arg(long, default_value_t = 250)]
        pause_ms: u64,
    },
    /// Download daily bars from Yahoo Finance and cache as Parquet.
    Download {
        /// Symbols to download (e.g., SPY QQQ).
        #[arg(required = true)]
        symbols: Vec<String>,

        /// Start date (YYYY-MM-DD). Defaults to 2001-01-01.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<String>,

        /// Force re-download even if cached.
        #[arg(long, default_value_t = false)]
        force: bool,

        /// Cache directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,
    },
    /// Build feature and label datasets from a TOML config.
    Build {
        /// Path to the pipeline TOML config.
        #[arg(long)]
        config: PathBuf,

        /// Output directory for matrices and the manifest.
        #[arg(long, default_value = "datasets")]
        output_dir: PathBuf,

        /// Offline mode: no network access.
        #[arg(long, default_value_t = false)]
        offline: bool,

        /// Use synthetic bars when real data is unavailable.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Re-download bars even if cached.
        #[arg(long, default_value_t = false)]
        force_download: bool,

        /// Print the manifest as JSON instead of the summary.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print the normalized form of each value.
    Normalize {
        /// Cell values, e.g. "350K" "-$36.4B" "0 to 0.25%".
        #[arg(required = true)]
        values: Vec<String>,

        /// Synonym table TOML replacing the embedded one.
        #[arg(long)]
        synonyms: Option<PathBuf>,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Report cached symbols, date ranges and sizes.
    Status {
        /// Cache directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "macrolab=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scrape {
            start_year,
            end_year,
            out,
            base_url,
            pause_ms,
        } => run_scrape(
            start_year,
            end_year.unwrap_or(start_year),
            &out,
            base_url,
            pause_ms,
        ),
        Commands::Download {
            symbols,
            start,
            end,
            force,
            cache_dir,
        } => run_download(symbols, start, end, force, cache_dir),
        Commands::Build {
            config,
            output_dir,
            offline,
            synthetic,
            force_download,
            json,
        } => run_build(
            &config,
            &output_dir,
            RunOptions {
                offline,
                synthetic,
                force_download,
            },
            json,
        ),
        Commands::Normalize { values, synonyms } => run_normalize(&values, synonyms.as_deref()),
        Commands::Cache { action } => match action {
            CacheAction::Status { cache_dir } => run_cache_status(&cache_dir),
        },
    }
}

fn run_scrape(
    start_year: i32,
    end_year: i32,
    out: &Path,
    base_url: Option<String>,
    pause_ms: u64,
) -> Result<()> {
    if end_year < start_year {
        bail!("--end-year {end_year} is before --start-year {start_year}");
    }

    let mut feed = HttpWeekFeed::new(TableRowParser)?.with_pause(Duration::from_millis(pause_ms));
    if let Some(url) = base_url {
        feed = feed.with_base_url(url);
    }

    let mut diagnostics = RunDiagnostics::new();
    let records = collect_weeks(&feed, start_year..=end_year, &mut diagnostics);
    RecordStore::new(out)
        .save(&records)
        .with_context(|| format!("failed to save records to {}", out.display()))?;

    println!("Saved {} records to {}", records.len(), out.display());
    if !diagnostics.skipped_weeks.is_empty() {
        println!(
            "Skipped {} week(s): {}",
            diagnostics.skipped_weeks.len(),
            diagnostics.skipped_weeks.join(", ")
        );
    }
    Ok(())
}

fn parse_date_arg(arg: Option<&str>) -> Result<Option<NaiveDate>> {
    arg.map(|s| {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}'"))
    })
    .transpose()
}

fn run_download(
    symbols: Vec<String>,
    start: Option<String>,
    end: Option<String>,
    force: bool,
    cache_dir: PathBuf,
) -> Result<()> {
    let today = chrono::Local::now().date_naive();
    let start_date = parse_date_arg(start.as_deref())?
        .unwrap_or_else(|| NaiveDate::from_ymd_opt(2001, 1, 1).unwrap_or(today));
    let end_date = parse_date_arg(end.as_deref())?.unwrap_or(today);

    let provider = YahooChartProvider::new()?;
    let cache = BarCache::new(cache_dir);
    let opts = LoadOptions {
        force,
        ..LoadOptions::new(start_date, end_date)
    };

    let mut failed = 0usize;
    for symbol in &symbols {
        match load_bars(symbol, &cache, Some(&provider as &dyn MarketDataProvider), &opts) {
            Ok(loaded) => println!(
                "{symbol}: {} bars ({:?})",
                loaded.bars.len(),
                loaded.source
            ),
            Err(e) => {
                eprintln!("Error for {symbol}: {e}");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} symbol(s) failed", symbols.len());
    }
    Ok(())
}

fn run_build(
    config_path: &Path,
    output_dir: &Path,
    options: RunOptions,
    json: bool,
) -> Result<()> {
    let config = PipelineConfig::from_file(config_path)?;
    info!(config = %config_path.display(), symbol = %config.data.symbol, "building datasets");

    let provider = if options.offline {
        None
    } else {
        Some(YahooChartProvider::new()?)
    };
    let provider_ref = provider.as_ref().map(|p| p as &dyn MarketDataProvider);

    let run = run_pipeline(&config, provider_ref, options)?;
    let manifest = export_run(output_dir, &run)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&manifest)?);
    } else {
        print_summary(&run);
        println!("Artifacts saved to: {}", output_dir.display());
    }
    Ok(())
}

fn run_normalize(values: &[String], synonyms_path: Option<&Path>) -> Result<()> {
    let custom = synonyms_path.map(SynonymTable::from_file).transpose()?;
    let table = custom.as_ref().unwrap_or_else(|| SynonymTable::builtin());
    let normalizer = ValueNormalizer::new(table);

    for value in values {
        let shown = match normalizer.normalize(value) {
            Normalized::Number(v) => format!("number {v}"),
            Normalized::Missing => "missing".to_string(),
            Normalized::Text(t) => format!("text {t:?}"),
        };
        println!("{value:>24} → {shown}");
    }
    Ok(())
}

fn run_cache_status(cache_dir: &Path) -> Result<()> {
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }

    let cache = BarCache::new(cache_dir);
    let entries = cache.entries();
    if entries.is_empty() {
        println!("Cache is empty: {}", cache_dir.display());
        return Ok(());
    }

    let sizes: Vec<u64> = entries
        .iter()
        .map(|m| dir_size(&cache_dir.join(format!("symbol={}", m.symbol))))
        .collect();

    println!("Cache: {}", cache_dir.display());
    println!("Symbols: {}", entries.len());
    println!("Total size: {}", format_size(sizes.iter().sum()));
    println!();
    println!(
        "{:<8} {:<25} {:<12} {:<14} {:>10}",
        "Symbol", "Date Range", "Bars", "Source", "Size"
    );
    println!("{}", "-".repeat(73));
    for (meta, size) in entries.iter().zip(&sizes) {
        println!(
            "{:<8} {:<25} {:<12} {:<14} {:>10}",
            meta.symbol,
            format!("{} to {}", meta.start_date, meta.end_date),
            format!("{} bars", meta.bar_count),
            format!("{:?}", meta.source),
            format_size(*size)
        );
    }

    Ok(())
}

fn dir_size(path: &Path) -> u64 {
    let mut size = 0u64;
    if let Ok(entries) = std::fs::read_dir(path) {
        for entry in entries.flatten() {
            if let Ok(meta) = entry.metadata() {
                size += meta.len();
            }
        }
    }
    size
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

fn print_summary(run: &RunOutput) {
    let diag = &run.build.diagnostics;

    println!();
    println!("=== Dataset Build ===");
    println!("Symbol:         {} ({:?})", run.symbol, run.bar_source);
    println!("Period:         {} to {}", run.start_date, run.end_date);
    println!("Bars:           {}", run.bar_count);
    println!("Records:        {}", diag.records_in);
    println!("Events:         {}", run.build.events);
    for dataset in &run.build.datasets {
        let f = &dataset.features;
        println!(
            "{:<15} {} rows x {} columns (train {}, validation {}, test {})",
            format!("{}:", dataset.variant),
            dataset.n_rows(),
            f.train.n_cols(),
            f.train.n_rows(),
            f.validation.n_rows(),
            f.test.n_rows()
        );
    }

    println!();
    println!("--- Diagnostics ---");
    println!("Unparsable timing:   {}", diag.unparsable_timing);
    println!("No session found:    {}", diag.no_session_found);
    println!("Missing market join: {}", diag.missing_market_join);
    println!("Missing actual:      {}", diag.missing_actual);
    println!("Missing forecast:    {}", diag.missing_forecast);
    println!("Duplicate cells:     {}", diag.duplicate_cells);
    println!("Empty columns:       {}", diag.empty_columns.len());
    println!("Degenerate columns:  {}", diag.degenerate_columns.len());
    for (rule, count) in &diag.corrections {
        println!("Correction {rule}: {count}");
    }
    let top = diag.top_unrecognized(5);
    if !top.is_empty() {
        println!("Top unrecognized tokens:");
        for (token, count) in top {
            println!("  {token:?} x{count}");
        }
    }
    if run.start_date.year() < 2001 {
        println!();
        println!("NOTE: market data before 2001 is sparse for most symbols");
    }
    if run.bar_source == DataSource::Synthetic {
        println!();
        println!("WARNING: labels are based on SYNTHETIC bars");
    }
}
