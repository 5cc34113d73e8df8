//! Download ledger
//!
//! A CSV file with one row per download attempt. The header is written when
//! the file is first created; every later append adds exactly one row, so
//! the file accumulates across runs. Concurrent producers go through
//! [`LedgerWriter`], which owns the file and serializes all appends.

mod writer;

pub use writer::{LedgerHandle, LedgerWriter};

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::DownloadOutcome;

/// Column names, in file order
pub const LEDGER_HEADER: [&str; 6] = ["Title", "Timestamp", "Size (MB)", "Time (s)", "Status", "Summary"];

/// Rendered in the Summary column when no description was found
pub const SUMMARY_UNAVAILABLE: &str = "N/A";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Ledger CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Ledger writer is closed")]
    Closed,
}

/// One row as it appears in the file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRow {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "Size (MB)")]
    pub size_mb: String,
    #[serde(rename = "Time (s)")]
    pub time_s: String,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Summary")]
    pub summary: String,
}

impl From<&DownloadOutcome> for LedgerRow {
    fn from(outcome: &DownloadOutcome) -> Self {
        Self {
            title: outcome.title.clone(),
            timestamp: outcome.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            size_mb: format!("{:.2}", outcome.size_mb()),
            time_s: format!("{:.2}", outcome.time_secs()),
            status: outcome.status.to_string(),
            summary: outcome
                .summary
                .clone()
                .unwrap_or_else(|| SUMMARY_UNAVAILABLE.to_string()),
        }
    }
}

/// Append-only CSV ledger
#[derive(Debug)]
pub struct OutcomeLog {
    path: PathBuf,
    rows_written: usize,
}

impl OutcomeLog {
    /// Point a ledger at `path`. Nothing is touched until the first append.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            rows_written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows appended through this handle
    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Append one row, writing the header first if the file is new or empty.
    pub fn append(&mut self, outcome: &DownloadOutcome) -> Result<(), LedgerError> {
        let needs_header = match std::fs::metadata(&self.path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => return Err(e.into()),
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);

        writer.serialize(LedgerRow::from(outcome))?;
        writer.flush()?;

        self.rows_written += 1;
        Ok(())
    }
}

/// Read every row of a ledger file.
pub fn read_rows(path: &Path) -> Result<Vec<LedgerRow>, LedgerError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    if headers.iter().ne(LEDGER_HEADER.iter().copied()) {
        return Err(LedgerError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("unexpected ledger header: {:?}", headers),
        )));
    }

    reader
        .deserialize::<LedgerRow>()
        .map(|row| row.map_err(LedgerError::from))
        .collect()
}
