//! Harvest configuration: site layout, download directory, sampling and dispatch

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// How per-document work is dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchStrategy {
    /// Fixed number of workers pulling from a shared queue
    #[default]
    Pool,
    /// One task per document, all awaited together
    Gather,
}

/// Harvest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Origin of the publication site
    pub base_url: String,
    /// Path of the listing page, relative to `base_url`
    pub listing_path: String,
    /// Href prefix that marks an intermediate publication page
    pub link_prefix: String,
    /// Origin used to resolve relative PDF links
    pub pdf_origin: String,
    /// Where PDFs, the ledger and the log file are written
    pub download_dir: PathBuf,
    /// Ledger file name inside `download_dir`
    pub ledger_file: String,
    /// Plain-text log file name inside `download_dir`
    pub log_file: String,
    /// Only process a random sample of the listing
    pub limit_downloads: bool,
    /// Sample size when `limit_downloads` is set
    pub sample_size: usize,
    /// Seed for the sampler (random when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_seed: Option<u64>,
    /// Dispatch strategy
    pub dispatch: DispatchStrategy,
    /// Worker count for the pool strategy
    pub workers: usize,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            base_url: "https://csrc.nist.gov".to_string(),
            listing_path: "/publications/sp".to_string(),
            link_prefix: "/pubs/sp/".to_string(),
            pdf_origin: "https://nvlpubs.nist.gov".to_string(),
            download_dir: default_download_dir(),
            ledger_file: "download_log.csv".to_string(),
            log_file: "nist_sp_download.log".to_string(),
            limit_downloads: true,
            sample_size: 5,
            sample_seed: None,
            dispatch: DispatchStrategy::Pool,
            workers: 3,
        }
    }
}

fn default_download_dir() -> PathBuf {
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("nist_downloads")
}

impl HarvestConfig {
    pub fn base_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.base_url)
    }

    pub fn pdf_origin(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.pdf_origin)
    }

    /// Absolute URL of the listing page
    pub fn listing_url(&self) -> Result<Url, url::ParseError> {
        self.base_url()?.join(&self.listing_path)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.download_dir.join(&self.ledger_file)
    }

    pub fn log_path(&self) -> PathBuf {
        self.download_dir.join(&self.log_file)
    }

    pub(super) fn collect_errors(&self, errors: &mut Vec<String>) {
        match self.base_url() {
            Ok(url) if url.cannot_be_a_base() => {
                errors.push(format!("base_url '{}' cannot be a base URL", self.base_url));
            }
            Ok(_) => {}
            Err(e) => errors.push(format!("base_url '{}' is invalid: {}", self.base_url, e)),
        }
        if let Err(e) = self.pdf_origin() {
            errors.push(format!("pdf_origin '{}' is invalid: {}", self.pdf_origin, e));
        }
        if !self.listing_path.starts_with('/') {
            errors.push("listing_path must start with '/'".to_string());
        }
        if self.link_prefix.is_empty() {
            errors.push("link_prefix must not be empty".to_string());
        }
        if self.download_dir.as_os_str().is_empty() {
            errors.push("download_dir must not be empty".to_string());
        }
        if self.ledger_file.is_empty() {
            errors.push("ledger_file must not be empty".to_string());
        }
        if self.log_file.is_empty() {
            errors.push("log_file must not be empty".to_string());
        }
        if self.limit_downloads && self.sample_size == 0 {
            errors.push("sample_size must be positive when limit_downloads is set".to_string());
        }
        if self.workers == 0 || self.workers > 64 {
            errors.push(format!("workers must be between 1 and 64, got {}", self.workers));
        }
    }
}
