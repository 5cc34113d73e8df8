//! Coordinator types: per-document results and the run report

use std::fmt;

use crate::types::DownloadStatus;

/// What happened to one document from the work set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentResult {
    /// No PDF link on the intermediate page (or the page was unreachable)
    Skipped,
    /// PDF link found; dry runs stop here
    Resolved,
    /// A download was attempted and logged
    Downloaded(DownloadStatus),
    /// Shutdown was requested before the download started
    NotStarted,
}

/// Summary of one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Titles found on the listing page
    pub discovered: usize,
    /// Titles left after sampling
    pub selected: usize,
    /// Titles with a PDF link (dry runs only)
    pub resolved: usize,
    /// Titles without a PDF link
    pub skipped: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Titles never started because of shutdown
    pub not_started: usize,
    /// Rows the ledger wrote during this run
    pub rows_logged: usize,
    /// The listing page could not be fetched
    pub aborted: bool,
    /// Shutdown was requested during the run
    pub cancelled: bool,
}

impl RunReport {
    pub(super) fn aborted() -> Self {
        Self {
            aborted: true,
            ..Default::default()
        }
    }

    pub(super) fn record(&mut self, result: DocumentResult) {
        match result {
            DocumentResult::Skipped => self.skipped += 1,
            DocumentResult::Resolved => self.resolved += 1,
            DocumentResult::Downloaded(DownloadStatus::Success) => self.succeeded += 1,
            DocumentResult::Downloaded(DownloadStatus::Failed) => self.failed += 1,
            DocumentResult::NotStarted => self.not_started += 1,
        }
    }

    /// Download attempts made (one ledger row each)
    pub fn attempted(&self) -> usize {
        self.succeeded + self.failed
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.aborted {
            return write!(f, "Run aborted: listing page unavailable");
        }
        write!(
            f,
            "{} found, {} selected, {} downloaded, {} failed, {} without PDF",
            self.discovered, self.selected, self.succeeded, self.failed, self.skipped
        )?;
        if self.resolved > 0 {
            write!(f, ", {} resolved", self.resolved)?;
        }
        if self.cancelled {
            write!(f, " (cancelled, {} not started)", self.not_started)?;
        }
        Ok(())
    }
}
