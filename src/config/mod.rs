//! Configuration for csrc-harvest

mod harvest;
mod http;
mod logging;

pub use harvest::{DispatchStrategy, HarvestConfig};
pub use http::HttpConfig;
pub use logging::{LogFormat, LogLevel, LoggingConfig};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default user agent for every request (listing, intermediate pages, PDFs)
pub const DEFAULT_USER_AGENT: &str = "csrc-harvest/0.1 (+https://github.com/csrc-harvest)";

/// Config file looked up in the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "csrc-harvest.toml";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Site layout, download directory and sampling
    #[serde(default)]
    pub harvest: HarvestConfig,
    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let config = Self::parse_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse `path` if it exists, otherwise fall back to defaults.
    ///
    /// Not validated: callers apply command-line overrides first and then
    /// call [`Config::validate`].
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::parse_file(path)
        } else {
            Ok(Self::default())
        }
    }

    fn parse_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))
    }

    /// Render the configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate all configuration fields.
    ///
    /// Collects every problem and reports them together.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        self.harvest.collect_errors(&mut errors);
        self.http.collect_errors(&mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }
    }
}
