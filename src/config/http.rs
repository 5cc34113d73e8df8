//! HTTP client configuration

use serde::{Deserialize, Serialize};

use super::DEFAULT_USER_AGENT;

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// User agent string
    pub user_agent: String,
    /// Timeout for listing and intermediate pages (seconds)
    pub page_timeout_secs: u64,
    /// Timeout for the PDF response and for each body chunk (seconds)
    pub download_timeout_secs: u64,
    /// TCP/TLS connect timeout (seconds)
    pub connect_timeout_secs: u64,
    /// Maximum redirects to follow
    pub max_redirects: usize,
    /// Attempts per request, including the first (1 disables retries)
    pub max_attempts: u32,
    /// Backoff before the first retry (milliseconds)
    pub initial_backoff_ms: u64,
    /// Backoff ceiling (milliseconds)
    pub max_backoff_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            page_timeout_secs: 10,
            download_timeout_secs: 20,
            connect_timeout_secs: 10,
            max_redirects: 10,
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
        }
    }
}

impl HttpConfig {
    pub(super) fn collect_errors(&self, errors: &mut Vec<String>) {
        if self.user_agent.trim().is_empty() {
            errors.push("user_agent must not be empty".to_string());
        }
        if self.page_timeout_secs == 0 {
            errors.push("page_timeout_secs must be positive".to_string());
        }
        if self.download_timeout_secs == 0 {
            errors.push("download_timeout_secs must be positive".to_string());
        }
        if self.connect_timeout_secs == 0 {
            errors.push("connect_timeout_secs must be positive".to_string());
        }
        if self.max_attempts == 0 {
            errors.push("max_attempts must be at least 1".to_string());
        }
        if self.max_backoff_ms < self.initial_backoff_ms {
            errors.push(format!(
                "max_backoff_ms ({}) must not be below initial_backoff_ms ({})",
                self.max_backoff_ms, self.initial_backoff_ms
            ));
        }
    }
}
