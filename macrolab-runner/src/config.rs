//! Pipeline configuration loaded from TOML.
//!
//! ```toml
//! [data]
//! records = "data/econ_calendar.csv"
//! symbol = "SPY"
//! cache_dir = "data"
//!
//! [alignment]
//! max_walk_days = 10
//!
//! [split]
//! train_ratio = 0.6
//! val_ratio = 0.2
//! shuffle_seed = 7
//!
//! [synonyms]
//! path = "synonyms.toml"
//! ```
//!
//! Every section is optional except `[data].records`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use macrolab_core::calendar::DEFAULT_MAX_WALK_DAYS;
use macrolab_core::normalize::{SynonymError, SynonymTable};
use macrolab_core::partition::{PartitionError, SplitConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("split: {0}")]
    Split(#[from] PartitionError),

    #[error("alignment.max_walk_days must be at least 1")]
    ZeroWalkDays,

    #[error("data.start_date {start} is after data.end_date {end}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },

    #[error("data.symbol must not be empty")]
    EmptySymbol,

    #[error("synonyms: {0}")]
    Synonyms(#[from] SynonymError),
}

/// Full configuration of one dataset build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub data: DataConfig,
    #[serde(default)]
    pub alignment: AlignmentConfig,
    #[serde(default)]
    pub split: SplitSection,
    #[serde(default)]
    pub synonyms: SynonymsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    /// Raw record CSV.
    pub records: PathBuf,
    #[serde(default = "default_symbol")]
    pub symbol: String,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Defaults to 30 days before the earliest event.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    /// Defaults to 30 days after the latest event.
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

fn default_symbol() -> String {
    "SPY".into()
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("data")
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignmentConfig {
    #[serde(default = "default_max_walk_days")]
    pub max_walk_days: u32,
}

fn default_max_walk_days() -> u32 {
    DEFAULT_MAX_WALK_DAYS
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            max_walk_days: DEFAULT_MAX_WALK_DAYS,
        }
    }
}

/// `[split]`: partition ratios plus the optional pre-shuffle seed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitSection {
    #[serde(default = "default_train_ratio")]
    pub train_ratio: f64,
    #[serde(default = "default_val_ratio")]
    pub val_ratio: f64,
    /// Rows are shuffled with this seed before partitioning. Unset keeps
    /// chronological order.
    #[serde(default)]
    pub shuffle_seed: Option<u64>,
}

fn default_train_ratio() -> f64 {
    SplitConfig::default().train_ratio
}

fn default_val_ratio() -> f64 {
    SplitConfig::default().val_ratio
}

impl Default for SplitSection {
    fn default() -> Self {
        Self {
            train_ratio: default_train_ratio(),
            val_ratio: default_val_ratio(),
            shuffle_seed: None,
        }
    }
}

impl SplitSection {
    pub fn ratios(&self) -> SplitConfig {
        SplitConfig {
            train_ratio: self.train_ratio,
            val_ratio: self.val_ratio,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SynonymsConfig {
    /// Replaces the embedded synonym table when set.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl PipelineConfig {
    /// Configuration with defaults for everything but the record file.
    pub fn new(records: impl Into<PathBuf>) -> Self {
        Self {
            data: DataConfig {
                records: records.into(),
                symbol: default_symbol(),
                cache_dir: default_cache_dir(),
                start_date: None,
                end_date: None,
            },
            alignment: AlignmentConfig::default(),
            split: SplitSection::default(),
            synonyms: SynonymsConfig::default(),
        }
    }

    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.split.ratios().validate()?;
        if self.alignment.max_walk_days == 0 {
            return Err(ConfigError::ZeroWalkDays);
        }
        if self.data.symbol.trim().is_empty() {
            return Err(ConfigError::EmptySymbol);
        }
        if let (Some(start), Some(end)) = (self.data.start_date, self.data.end_date) {
            if start > end {
                return Err(ConfigError::InvertedRange { start, end });
            }
        }
        Ok(())
    }

    /// The configured synonym table, or `None` for the embedded one.
    pub fn load_synonyms(&self) -> Result<Option<SynonymTable>, ConfigError> {
        match &self.synonyms.path {
            Some(path) => Ok(Some(SynonymTable::from_file(path)?)),
            None => Ok(None),
        }
    }

    /// blake3 digest of the canonical JSON form of this config.
    pub fn config_hash(&self) -> String {
        // Plain data with string keys; encoding cannot fail.
        let json = serde_json::to_string(self).unwrap_or_default();
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}
