//! Artifact export: matrix CSVs and the run manifest.
//!
//! Layout under the output directory:
//!
//! ```text
//! {output}/manifest.json
//! {output}/{variant}/{split}_features.csv
//! {output}/{variant}/{split}_labels_raw.csv
//! {output}/{variant}/{split}_labels_adjusted.csv
//! ```
//!
//! Every CSV starts with a `date` column followed by the matrix columns.
//! The manifest carries a `schema_version`; newer versions are rejected on
//! load.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use macrolab_core::features::DateMatrix;
use macrolab_core::market::{DataSource, LabelBasis};
use macrolab_core::partition::Split;
use macrolab_core::RunDiagnostics;

use crate::pipeline::{RunOutput, VariantDataset, SCHEMA_VERSION};

// ─── CSV export ─────────────────────────────────────────────────────

/// Render a dense matrix as CSV with a leading `date` column.
pub fn matrix_to_csv(matrix: &DateMatrix<f64>) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = Vec::with_capacity(matrix.n_cols() + 1);
    header.push("date");
    header.extend(matrix.columns.iter().map(String::as_str));
    wtr.write_record(&header)?;

    for (date, row) in matrix.index.iter().zip(&matrix.rows) {
        let mut record = Vec::with_capacity(row.len() + 1);
        record.push(date.to_string());
        record.extend(row.iter().map(|v| v.to_string()));
        wtr.write_record(&record)?;
    }

    let bytes = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

/// File stem of a label matrix for one basis.
fn label_stem(basis: LabelBasis) -> String {
    format!("labels_{}", basis.name())
}

/// Write every split of one variant into `dir`. Returns the written paths.
pub fn write_dataset(dir: &Path, dataset: &VariantDataset) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let mut written = Vec::new();
    let mut write = |split: &str, stem: &str, matrix: &DateMatrix<f64>| -> Result<()> {
        let path = dir.join(format!("{split}_{stem}.csv"));
        let csv = matrix_to_csv(matrix)?;
        fs::write(&path, csv).with_context(|| format!("failed to write {}", path.display()))?;
        written.push(path);
        Ok(())
    };

    for (split, features) in dataset.features.parts() {
        write(split, "features", features)?;
    }
    for basis in LabelBasis::ALL {
        let stem = label_stem(basis);
        for (split, labels) in dataset.labels(basis).parts() {
            write(split, &stem, labels)?;
        }
    }
    Ok(written)
}

// ─── Manifest ───────────────────────────────────────────────────────

/// Row counts of the three parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitCounts {
    pub train: usize,
    pub validation: usize,
    pub test: usize,
}

impl<T> From<&Split<DateMatrix<T>>> for SplitCounts
where
    T: Clone,
{
    fn from(split: &Split<DateMatrix<T>>) -> Self {
        Self {
            train: split.train.n_rows(),
            validation: split.validation.n_rows(),
            test: split.test.n_rows(),
        }
    }
}

/// Shape of one exported variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantSummary {
    pub variant: String,
    pub feature_columns: Vec<String>,
    pub label_columns: Vec<String>,
    pub rows: SplitCounts,
}

impl From<&VariantDataset> for VariantSummary {
    fn from(dataset: &VariantDataset) -> Self {
        Self {
            variant: dataset.variant.name().to_string(),
            feature_columns: dataset.features.train.columns.clone(),
            label_columns: dataset.labels_raw.train.columns.clone(),
            rows: SplitCounts::from(&dataset.features),
        }
    }
}

/// `manifest.json`: provenance, shapes and diagnostics of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub schema_version: u32,
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub bar_source: DataSource,
    pub bar_count: usize,
    pub input_hash: String,
    pub dataset_hash: String,
    pub config_hash: String,
    pub events: usize,
    pub variants: Vec<VariantSummary>,
    pub diagnostics: RunDiagnostics,
}

impl Manifest {
    pub fn from_run(run: &RunOutput) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            symbol: run.symbol.clone(),
            start_date: run.start_date,
            end_date: run.end_date,
            bar_source: run.bar_source,
            bar_count: run.bar_count,
            input_hash: run.input_hash.clone(),
            dataset_hash: run.dataset_hash.clone(),
            config_hash: run.config_hash.clone(),
            events: run.build.events,
            variants: run.build.datasets.iter().map(VariantSummary::from).collect(),
            diagnostics: run.build.diagnostics.clone(),
        }
    }
}

/// Serialize a manifest to pretty JSON.
pub fn export_manifest(manifest: &Manifest) -> Result<String> {
    serde_json::to_string_pretty(manifest).context("failed to serialize manifest to JSON")
}

/// Deserialize a manifest, rejecting unknown schema versions.
pub fn import_manifest(json: &str) -> Result<Manifest> {
    let manifest: Manifest =
        serde_json::from_str(json).context("failed to deserialize manifest from JSON")?;
    if manifest.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            manifest.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(manifest)
}

// ─── Run export ─────────────────────────────────────────────────────

/// Write every variant and the manifest under `output_dir`.
pub fn export_run(output_dir: &Path, run: &RunOutput) -> Result<Manifest> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    for dataset in &run.build.datasets {
        let dir = output_dir.join(dataset.variant.name());
        let written = write_dataset(&dir, dataset)?;
        tracing::info!(
            variant = %dataset.variant,
            files = written.len(),
            dir = %dir.display(),
            "variant exported"
        );
    }

    let manifest = Manifest::from_run(run);
    let path = output_dir.join("manifest.json");
    fs::write(&path, export_manifest(&manifest)?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(manifest)
}
