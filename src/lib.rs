//! csrc-harvest: bulk downloader for NIST CSRC Special Publications
//!
//! Crawls the SP listing page, follows each publication's intermediate page
//! to its PDF, and streams the PDFs to a local directory:
//! - Concurrent downloads with a bounded worker pool or full fan-out
//! - Optional random sampling of the listing
//! - One CSV ledger row per download attempt, written by a single task
//! - Graceful shutdown on Ctrl-C

pub mod config;
pub mod ledger;
pub mod logging;
pub mod progress;
pub mod scraping;
pub mod types;
pub mod util;

pub use config::Config;
pub use types::*;
