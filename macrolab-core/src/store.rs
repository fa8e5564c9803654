//! Flat CSV store of raw scraped records.
//!
//! Header: `Year,Week,Date,Time (ET),Statistic,For,Actual,Briefing Forecast,
//! Market Expects,Prior,Revised`. Cells are kept as text exactly as scraped.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::RawEventRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("record table: {0}")]
    Csv(#[from] csv::Error),

    #[error("record table: {0}")]
    Flush(#[from] std::io::Error),
}

/// Column order of the persisted table.
pub const HEADER: [&str; 11] = [
    "Year",
    "Week",
    "Date",
    "Time (ET)",
    "Statistic",
    "For",
    "Actual",
    "Briefing Forecast",
    "Market Expects",
    "Prior",
    "Revised",
];

/// Read every record from a CSV source, in file order.
pub fn read_records<R: Read>(reader: R) -> Result<Vec<RawEventRecord>, StoreError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::None)
        .from_reader(reader);
    rdr.deserialize::<RawEventRecord>()
        .map(|row| row.map_err(StoreError::from))
        .collect()
}

/// Write records with the standard header.
pub fn write_records<W: Write>(writer: W, records: &[RawEventRecord]) -> Result<(), StoreError> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    wtr.write_record(HEADER)?;
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// File-backed record store.
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn load(&self) -> Result<Vec<RawEventRecord>, StoreError> {
        let file = fs::File::open(&self.path).map_err(|source| self.io(source))?;
        read_records(file)
    }

    /// Replace the store's contents.
    pub fn save(&self, records: &[RawEventRecord]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| self.io(source))?;
        }
        let file = fs::File::create(&self.path).map_err(|source| self.io(source))?;
        write_records(file, records)
    }

    /// blake3 hex digest of the stored file's bytes.
    pub fn content_hash(&self) -> Result<String, StoreError> {
        let bytes = fs::read(&self.path).map_err(|source| self.io(source))?;
        Ok(blake3::hash(&bytes).to_hex().to_string())
    }

    fn io(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::fixtures::record;

    const SAMPLE: &str = "\
Year,Week,Date,Time (ET),Statistic,For,Actual,Briefing Forecast,Market Expects,Prior,Revised
2010,2,Jan 14,8:30 am,Initial Claims,01/09,444K,435K,440K,434K,439K
2010,2,Jan 14,8:30 am,Retail Sales,Dec,-0.3%,0.5%,0.5%,1.3%,1.8%
";

    #[test]
    fn reads_standard_header() {
        let records = read_records(SAMPLE.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].statistic, "Initial Claims");
        assert_eq!(records[0].time, "8:30 am");
        assert_eq!(records[0].period, "01/09");
        assert_eq!(records[1].briefing_forecast, "0.5%");
        assert_eq!(records[1].revised, "1.8%");
    }

    #[test]
    fn write_then_read_preserves_text() {
        let rows = vec![
            record("Trade Balance", "Jan 12", "8:30 am", "-$36.4B", "-$35.0B", "NA"),
            record("ISM Index", "Jan 4", "10:00 am", "55.9", "", "---"),
        ];
        let mut buf = Vec::new();
        write_records(&mut buf, &rows).unwrap();

        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with("Year,Week,Date,Time (ET),Statistic,For,"));
        assert_eq!(read_records(buf.as_slice()).unwrap(), rows);
    }

    #[test]
    fn missing_column_is_an_error() {
        let bad = "Year,Week,Date\n2010,2,Jan 4\n";
        assert!(matches!(read_records(bad.as_bytes()), Err(StoreError::Csv(_))));
    }
}
