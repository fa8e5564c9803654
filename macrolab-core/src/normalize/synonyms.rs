//! Canonical statistic-name dictionary.
//!
//! The dictionary is static configuration data: a TOML file mapping each
//! canonical name to the raw spellings that scraped pages have used for it.
//! The default table is embedded at compile time; a run may load its own.
//!
//! Lookup is an exact-string match. Unmapped names pass through unchanged,
//! and construction rejects tables that would make the mapping
//! non-idempotent, so `canonical(canonical(s)) == canonical(s)` always holds.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;

const BUILTIN_TABLE: &str = include_str!("../../data/synonyms.toml");

/// Errors from loading a synonym table.
#[derive(Debug, Error)]
pub enum SynonymError {
    #[error("read synonym file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse synonym TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("raw spelling '{raw}' maps to both '{first}' and '{second}'")]
    Conflict {
        raw: String,
        first: String,
        second: String,
    },

    #[error("raw spelling '{raw}' under '{canonical}' is itself a canonical name")]
    ChainedCanonical { raw: String, canonical: String },
}

#[derive(Debug, Deserialize)]
struct SynonymFile {
    statistics: BTreeMap<String, Vec<String>>,
}

/// Raw-spelling → canonical-name lookup.
#[derive(Debug, Clone, Default)]
pub struct SynonymTable {
    to_canonical: HashMap<String, String>,
    canonical_names: Vec<String>,
}

impl SynonymTable {
    /// The table embedded in the binary.
    pub fn builtin() -> &'static SynonymTable {
        static BUILTIN: OnceLock<SynonymTable> = OnceLock::new();
        BUILTIN.get_or_init(|| {
            SynonymTable::from_toml(BUILTIN_TABLE).expect("embedded synonym table is valid")
        })
    }

    /// Load a table from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, SynonymError> {
        let content = std::fs::read_to_string(path).map_err(|source| SynonymError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a table from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, SynonymError> {
        let file: SynonymFile = toml::from_str(content)?;
        Self::from_groups(file.statistics)
    }

    /// Build a table from `canonical → [raw spellings]` groups.
    pub fn from_groups(groups: BTreeMap<String, Vec<String>>) -> Result<Self, SynonymError> {
        let mut to_canonical: HashMap<String, String> = HashMap::new();

        for (canonical, variants) in &groups {
            for raw in variants {
                if raw == canonical {
                    continue;
                }
                if groups.contains_key(raw) {
                    return Err(SynonymError::ChainedCanonical {
                        raw: raw.clone(),
                        canonical: canonical.clone(),
                    });
                }
                if let Some(existing) = to_canonical.get(raw) {
                    if existing != canonical {
                        return Err(SynonymError::Conflict {
                            raw: raw.clone(),
                            first: existing.clone(),
                            second: canonical.clone(),
                        });
                    }
                }
                to_canonical.insert(raw.clone(), canonical.clone());
            }
        }

        Ok(Self {
            to_canonical,
            canonical_names: groups.into_keys().collect(),
        })
    }

    /// Exact lookup of a raw spelling. `None` when the spelling is unmapped.
    pub fn lookup(&self, raw: &str) -> Option<&str> {
        self.to_canonical.get(raw).map(String::as_str)
    }

    /// Canonical name for a raw statistic spelling; unmapped names pass through.
    pub fn canonical<'a>(&'a self, raw: &'a str) -> &'a str {
        self.lookup(raw).unwrap_or(raw)
    }

    /// Canonical names in sorted order.
    pub fn canonical_names(&self) -> &[String] {
        &self.canonical_names
    }

    /// Iterate over every `(raw, canonical)` entry.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.to_canonical
            .iter()
            .map(|(raw, canonical)| (raw.as_str(), canonical.as_str()))
    }

    pub fn len(&self) -> usize {
        self.to_canonical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_canonical.is_empty()
    }
}

/// Canonical statistic name using the embedded table.
pub fn canonical_statistic_name(raw: &str) -> &str {
    SynonymTable::builtin().canonical(raw)
}
