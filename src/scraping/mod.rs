//! Crawling pipeline for the CSRC Special Publications listing
//!
//! The listing page links to one intermediate page per publication; each
//! intermediate page links to the PDF and carries a short description.
//!
//! Key components:
//! - `FetchEngine`: pooled HTTP client with timeouts and retry
//! - `LinkExtractor`: listing links, PDF link and summary from HTML
//! - `DocumentResolver`: intermediate page to PDF link plus summary
//! - `DownloadCoordinator`: streams PDFs to disk and records outcomes
//! - `HarvestCoordinator`: orchestrates the whole run

pub mod coordinator;
pub mod downloader;
pub mod extractor;
pub mod fetcher;
pub mod resolver;

pub use coordinator::{HarvestCoordinator, RunReport};
pub use downloader::DownloadCoordinator;
pub use extractor::LinkExtractor;
pub use fetcher::{FetchConfig, FetchEngine, RetryPolicy};
pub use resolver::DocumentResolver;
