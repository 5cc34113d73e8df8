//! Core types shared across the harvest pipeline

use chrono::{DateTime, Local};
use std::fmt;
use std::time::Duration;
use url::Url;

/// Title used when an anchor has no visible text
pub const PLACEHOLDER_TITLE: &str = "SP_Document";

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// A publication found on the listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    /// Sanitized title, also the PDF file stem
    pub title: String,
    /// Landing page that links to the PDF
    pub intermediate_url: Url,
}

impl DocumentRef {
    pub fn new(title: impl Into<String>, intermediate_url: Url) -> Self {
        Self {
            title: title.into(),
            intermediate_url,
        }
    }

    /// Turn raw anchor text into a title usable as a file name.
    ///
    /// Whitespace runs collapse to one space, path separators become `_`,
    /// and empty text falls back to [`PLACEHOLDER_TITLE`].
    pub fn sanitize_title(raw: &str) -> String {
        let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            return PLACEHOLDER_TITLE.to_string();
        }
        collapsed.replace(['/', '\\'], "_")
    }
}

/// Everything learned from a document's intermediate page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDownload {
    pub title: String,
    pub intermediate_url: Url,
    /// First `.pdf` link on the page, if any
    pub pdf_url: Option<Url>,
    /// Content of the `description` meta tag, if any
    pub summary: Option<String>,
}

/// Outcome of one download attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DownloadStatus {
    Success,
    Failed,
}

impl DownloadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Failed => "Failed",
        }
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ledger entry: a download attempt and how it went
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadOutcome {
    pub title: String,
    /// When the attempt finished
    pub timestamp: DateTime<Local>,
    /// Bytes received and passed to the file before success or failure
    pub size_bytes: u64,
    /// Time spent opening and streaming the PDF
    pub elapsed: Duration,
    pub status: DownloadStatus,
    pub summary: Option<String>,
}

impl DownloadOutcome {
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / BYTES_PER_MB
    }

    pub fn time_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    pub fn is_success(&self) -> bool {
        self.status == DownloadStatus::Success
    }
}
