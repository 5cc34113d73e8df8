//! Streams resolved PDFs to disk and records every attempt in the ledger

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use futures::StreamExt;
use thiserror::Error;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, error, info};
use url::Url;

use super::fetcher::{FetchEngine, FetchError};
use crate::ledger::LedgerHandle;
use crate::progress::DownloadProgress;
use crate::types::{DownloadOutcome, DownloadStatus};
use crate::util::throughput_mb_s;

/// Write buffer size; each flush to disk is at most this large
pub const CHUNK_SIZE: usize = 128 * 1024;

/// Why a download failed
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Downloads PDFs into a directory
pub struct DownloadCoordinator {
    fetcher: Arc<FetchEngine>,
    download_dir: PathBuf,
    ledger: LedgerHandle,
    progress: DownloadProgress,
}

impl DownloadCoordinator {
    pub fn new(
        fetcher: Arc<FetchEngine>,
        download_dir: impl Into<PathBuf>,
        ledger: LedgerHandle,
        progress: DownloadProgress,
    ) -> Self {
        Self {
            fetcher,
            download_dir: download_dir.into(),
            ledger,
            progress,
        }
    }

    /// Target path for a title
    pub fn file_path(&self, title: &str) -> PathBuf {
        self.download_dir.join(format!("{}.pdf", title))
    }

    /// Download `pdf_url` to `{title}.pdf` and append the outcome to the
    /// ledger. Always yields exactly one outcome; failures never propagate.
    ///
    /// The elapsed time covers opening and streaming the PDF only.
    pub async fn download(&self, title: &str, pdf_url: &Url, summary: Option<String>) -> DownloadOutcome {
        let path = self.file_path(title);
        let started = Instant::now();
        let mut written = 0u64;

        let result = self.stream_to_file(title, pdf_url, &path, &mut written).await;
        let elapsed = started.elapsed();

        let status = match &result {
            Ok(()) => DownloadStatus::Success,
            Err(e) => {
                error!("Failed to download {}: {}", title, e);
                DownloadStatus::Failed
            }
        };

        let outcome = DownloadOutcome {
            title: title.to_string(),
            timestamp: Local::now(),
            size_bytes: written,
            elapsed,
            status,
            summary,
        };

        if outcome.is_success() {
            info!(
                "Downloaded: {} ({:.2} MB in {:.2}s, {:.2} MB/s)",
                path.display(),
                outcome.size_mb(),
                outcome.time_secs(),
                throughput_mb_s(outcome.size_mb(), outcome.time_secs())
            );
        }

        if let Err(e) = self.ledger.append(outcome.clone()).await {
            error!("Could not record outcome for {}: {}", title, e);
        }

        outcome
    }

    async fn stream_to_file(
        &self,
        title: &str,
        pdf_url: &Url,
        path: &Path,
        written: &mut u64,
    ) -> Result<(), DownloadError> {
        let response = self.fetcher.open_stream(pdf_url).await?;
        let expected = response.content_length().unwrap_or(0);
        let chunk_timeout = self.fetcher.config().download_timeout;

        let bar = self.progress.start(title, expected);
        let file = tokio::fs::File::create(path).await?;
        let mut writer = BufWriter::with_capacity(CHUNK_SIZE, file);
        let mut body = response.bytes_stream();

        let result: Result<(), DownloadError> = async {
            loop {
                let next = tokio::time::timeout(chunk_timeout, body.next())
                    .await
                    .map_err(|_| FetchError::Timeout(chunk_timeout))?;
                let Some(chunk) = next else {
                    break;
                };
                let chunk = chunk.map_err(FetchError::from)?;
                writer.write_all(&chunk).await?;
                *written += chunk.len() as u64;
                bar.inc(chunk.len() as u64);
            }
            writer.flush().await?;
            Ok(())
        }
        .await;

        match &result {
            Ok(()) => bar.finish_and_clear(),
            Err(_) => {
                // Keep the partial file in step with the counted bytes
                if let Err(e) = writer.flush().await {
                    debug!("Could not flush partial {}: {}", path.display(), e);
                }
                bar.abandon();
            }
        }
        result
    }
}
