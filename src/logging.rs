//! Tracing subscriber setup: console output plus an optional plain-text file

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

use crate::config::{LogFormat, LogLevel, LoggingConfig};

/// Effective level: `-v` raises to debug, `-vv` to trace
fn effective_level(config: &LoggingConfig, verbosity: u8) -> LogLevel {
    match verbosity {
        0 => config.level,
        1 => LogLevel::Debug,
        _ => LogLevel::Trace,
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over both the config level and `verbosity`. When
/// `log_file` is given and `config.to_file` is set, every event is also
/// appended to that file without ANSI colors.
pub fn init_logging(config: &LoggingConfig, verbosity: u8, log_file: Option<&Path>) -> Result<()> {
    let level = effective_level(config, verbosity);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    let console = fmt::layer().with_writer(std::io::stderr).with_target(false);
    layers.push(match config.format {
        LogFormat::Text => console.boxed(),
        LogFormat::Json => console.json().boxed(),
    });

    if let Some(path) = log_file.filter(|_| config.to_file) {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        layers.push(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(false)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .context("Failed to install tracing subscriber")?;
    Ok(())
}
