//! Fetch engine for the harvest pipeline
//!
//! One pooled `reqwest::Client` serves every request in a run. Pages are
//! fetched whole with a short timeout; PDFs are opened as a streaming
//! response. Both paths share the same retry policy, which only retries
//! transient failures.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, error, warn};
use url::Url;

use crate::config::HttpConfig;

/// Errors that can occur during fetching
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("Timeout after {0:?}")]
    Timeout(Duration),
}

impl FetchError {
    /// Whether another attempt could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Status { status, .. } => is_transient_status(*status),
            Self::Timeout(_) => true,
        }
    }
}

fn is_transient_status(status: u16) -> bool {
    matches!(status, 408 | 429) || (500..=599).contains(&status)
}

/// Bounded exponential backoff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per request, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_backoff: Duration,
    /// Delay ceiling
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// A single attempt, no retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << shift)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

/// Configuration for the fetch engine
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string
    pub user_agent: String,
    /// Total timeout for listing and intermediate pages
    pub page_timeout: Duration,
    /// Timeout for the PDF response headers and for each body chunk
    pub download_timeout: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Maximum redirects to follow
    pub max_redirects: usize,
    /// Retry policy shared by pages and downloads
    pub retry: RetryPolicy,
}

impl FetchConfig {
    pub fn from_config(config: &HttpConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            page_timeout: Duration::from_secs(config.page_timeout_secs),
            download_timeout: Duration::from_secs(config.download_timeout_secs),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            max_redirects: config.max_redirects,
            retry: RetryPolicy {
                max_attempts: config.max_attempts.max(1),
                initial_backoff: Duration::from_millis(config.initial_backoff_ms),
                max_backoff: Duration::from_millis(config.max_backoff_ms),
            },
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::from_config(&HttpConfig::default())
    }
}

/// Fetch counters (lock-free so the engine can sit behind an `Arc`)
#[derive(Debug, Default)]
struct FetchCounters {
    requests: AtomicU64,
    failures: AtomicU64,
    retries: AtomicU64,
}

/// Snapshot of the fetch counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Requests sent, retries included
    pub requests: u64,
    /// Requests that ended in an error after all attempts
    pub failures: u64,
    /// Extra attempts made after a transient failure
    pub retries: u64,
}

/// HTTP fetch engine
pub struct FetchEngine {
    http_client: reqwest::Client,
    config: FetchConfig,
    counters: FetchCounters,
}

impl FetchEngine {
    /// Create a new fetch engine
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(config.connect_timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(&config.user_agent)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            http_client,
            config,
            counters: FetchCounters::default(),
        })
    }

    /// Fetch a page and return its body as text.
    pub async fn fetch_text(&self, url: &Url) -> Result<String, FetchError> {
        self.with_retry(url, || async {
            let response = self
                .http_client
                .get(url.as_str())
                .timeout(self.config.page_timeout)
                .send()
                .await?;
            let response = check_status(response)?;
            Ok(response.text().await?)
        })
        .await
    }

    /// Fetch a page, logging and swallowing any failure.
    pub async fn fetch_page(&self, url: &Url) -> Option<String> {
        match self.fetch_text(url).await {
            Ok(body) => Some(body),
            Err(e) => {
                error!("Error fetching {}: {}", url, e);
                None
            }
        }
    }

    /// Open a streaming GET for a binary resource.
    ///
    /// Only the wait for response headers is bounded here; callers bound each
    /// body chunk with [`FetchConfig::download_timeout`].
    pub async fn open_stream(&self, url: &Url) -> Result<reqwest::Response, FetchError> {
        let timeout = self.config.download_timeout;
        self.with_retry(url, || async {
            let send = self.http_client.get(url.as_str()).send();
            let response = tokio::time::timeout(timeout, send)
                .await
                .map_err(|_| FetchError::Timeout(timeout))??;
            check_status(response)
        })
        .await
    }

    async fn with_retry<T, F, Fut>(&self, url: &Url, mut attempt_fn: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let policy = &self.config.retry;
        let mut attempt = 1;

        loop {
            self.counters.requests.fetch_add(1, Ordering::Relaxed);

            match attempt_fn().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                    let delay = policy.backoff_for(attempt);
                    warn!(
                        "Attempt {}/{} for {} failed: {}; retrying in {:?}",
                        attempt, policy.max_attempts, url, e, delay
                    );
                    self.counters.retries.fetch_add(1, Ordering::Relaxed);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    debug!("Giving up on {} after {} attempt(s)", url, attempt);
                    self.counters.failures.fetch_add(1, Ordering::Relaxed);
                    return Err(e);
                }
            }
        }
    }

    /// Get fetch statistics
    pub fn stats(&self) -> FetchStats {
        FetchStats {
            requests: self.counters.requests.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
            retries: self.counters.retries.load(Ordering::Relaxed),
        }
    }

    /// Get configuration
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

fn check_status(response: reqwest::Response) -> Result<reqwest::Response, FetchError> {
    let status: StatusCode = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(FetchError::Status {
            url: response.url().to_string(),
            status: status.as_u16(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_up_to_ceiling() {
        let policy = RetryPolicy {
            max_attempts: 6,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(3),
        };
        assert_eq!(policy.backoff_for(1), Duration::from_millis(500));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(2000));
        assert_eq!(policy.backoff_for(4), Duration::from_secs(3));
        assert_eq!(policy.backoff_for(40), Duration::from_secs(3));
    }

    #[test]
    fn only_transient_statuses_retry() {
        let status = |status| FetchError::Status {
            url: "https://example.com".to_string(),
            status,
        };
        assert!(status(503).is_transient());
        assert!(status(429).is_transient());
        assert!(status(408).is_transient());
        assert!(!status(404).is_transient());
        assert!(!status(403).is_transient());
        assert!(FetchError::Timeout(Duration::from_secs(1)).is_transient());
    }

    #[test]
    fn config_maps_seconds_and_clamps_attempts() {
        let http = HttpConfig {
            page_timeout_secs: 4,
            download_timeout_secs: 9,
            max_attempts: 0,
            initial_backoff_ms: 250,
            max_backoff_ms: 1_000,
            ..Default::default()
        };
        let config = FetchConfig::from_config(&http);
        assert_eq!(config.page_timeout, Duration::from_secs(4));
        assert_eq!(config.download_timeout, Duration::from_secs(9));
        assert_eq!(config.retry.max_attempts, 1);
        assert_eq!(config.retry.initial_backoff, Duration::from_millis(250));
    }

    #[test]
    fn engine_starts_with_empty_stats() {
        let engine = FetchEngine::new(FetchConfig::default()).unwrap();
        assert_eq!(engine.stats(), FetchStats::default());
        assert_eq!(engine.config().retry, RetryPolicy::default());
    }
}
