//! Harvest coordinator orchestrating the download pipeline
//!
//! Fetches the listing page, extracts publication links, optionally samples
//! them, then resolves and downloads every document with the configured
//! dispatch strategy. All outcomes flow into a single ledger writer.

mod dispatch;
mod types;

pub use types::*;

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use rand::seq::IteratorRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::watch;
use tracing::{error, info};
use url::Url;

use self::dispatch::{dispatch_gather, dispatch_pool, DocumentWorker};
use super::{
    downloader::DownloadCoordinator,
    extractor::LinkExtractor,
    fetcher::{FetchConfig, FetchEngine},
    resolver::DocumentResolver,
};
use crate::config::{DispatchStrategy, HarvestConfig};
use crate::ledger::LedgerWriter;
use crate::progress::DownloadProgress;
use crate::types::DocumentRef;

/// Keep a uniformly random subset of at most `sample_size` titles.
pub fn select_sample<R: Rng + ?Sized>(
    links: BTreeMap<String, Url>,
    sample_size: usize,
    rng: &mut R,
) -> BTreeMap<String, Url> {
    if links.len() <= sample_size {
        return links;
    }
    links.into_iter().choose_multiple(rng, sample_size).into_iter().collect()
}

/// Harvest coordinator
pub struct HarvestCoordinator {
    config: HarvestConfig,
    /// Shared by the listing fetch, resolvers and downloads (one connection pool)
    fetcher: Arc<FetchEngine>,
    extractor: Arc<LinkExtractor>,
    progress: DownloadProgress,
    shutdown: watch::Receiver<bool>,
    /// Keeps the default shutdown channel open when none was supplied
    _shutdown_tx: Option<watch::Sender<bool>>,
    dry_run: bool,
}

impl HarvestCoordinator {
    /// Create a new harvest coordinator
    pub fn new(config: HarvestConfig, fetch: FetchConfig) -> Result<Self> {
        let fetcher = FetchEngine::new(fetch).context("Failed to build HTTP client")?;
        let extractor = LinkExtractor::from_config(&config)?;
        let (shutdown_tx, shutdown) = watch::channel(false);

        Ok(Self {
            config,
            fetcher: Arc::new(fetcher),
            extractor: Arc::new(extractor),
            progress: DownloadProgress::hidden(),
            shutdown,
            _shutdown_tx: Some(shutdown_tx),
            dry_run: false,
        })
    }

    /// Stop dispatching new documents once `shutdown` turns true
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = shutdown;
        self._shutdown_tx = None;
        self
    }

    pub fn with_progress(mut self, progress: DownloadProgress) -> Self {
        self.progress = progress;
        self
    }

    /// Resolve PDF links without downloading or writing ledger rows
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    pub fn fetcher(&self) -> &FetchEngine {
        &self.fetcher
    }

    /// Resolver sharing this coordinator's client and extractor
    pub fn resolver(&self) -> DocumentResolver {
        DocumentResolver::new(self.fetcher.clone(), self.extractor.clone())
    }

    /// Run the pipeline once.
    ///
    /// Only local setup problems (download directory, bad listing URL)
    /// return an error; an unreachable listing page yields an aborted report.
    pub async fn run(&self) -> Result<RunReport> {
        tokio::fs::create_dir_all(&self.config.download_dir)
            .await
            .with_context(|| {
                format!(
                    "Failed to create download directory {}",
                    self.config.download_dir.display()
                )
            })?;

        let listing_url = self
            .config
            .listing_url()
            .context("Invalid listing URL")?;

        info!("Starting download process from {}", listing_url);
        let Some(html) = self.fetcher.fetch_page(&listing_url).await else {
            error!("Failed to fetch listing page {}. Exiting.", listing_url);
            return Ok(RunReport::aborted());
        };

        let mut links = self.extractor.extract_intermediate_links(&html);
        let mut report = RunReport {
            discovered: links.len(),
            ..Default::default()
        };
        info!("Found {} documents to process.", links.len());

        if self.config.limit_downloads {
            let mut rng = match self.config.sample_seed {
                Some(seed) => ChaCha8Rng::seed_from_u64(seed),
                None => ChaCha8Rng::from_entropy(),
            };
            links = select_sample(links, self.config.sample_size, &mut rng);
            info!(
                "Sampling is on. Only these {} documents will be processed: {}",
                links.len(),
                links.keys().map(String::as_str).collect::<Vec<_>>().join(", ")
            );
        }
        report.selected = links.len();

        let docs: Vec<DocumentRef> = links
            .into_iter()
            .map(|(title, url)| DocumentRef::new(title, url))
            .collect();

        let ledger = (!self.dry_run).then(|| LedgerWriter::start(self.config.ledger_path()));
        let worker = Arc::new(DocumentWorker {
            resolver: self.resolver(),
            downloader: ledger.as_ref().map(|ledger| {
                DownloadCoordinator::new(
                    self.fetcher.clone(),
                    &self.config.download_dir,
                    ledger.handle(),
                    self.progress.clone(),
                )
            }),
            shutdown: self.shutdown.clone(),
        });

        let results = match self.config.dispatch {
            DispatchStrategy::Pool => dispatch_pool(docs, self.config.workers, worker).await,
            DispatchStrategy::Gather => dispatch_gather(docs, worker).await,
        };
        for result in results {
            report.record(result);
        }

        if let Some(ledger) = ledger {
            report.rows_logged = ledger.close().await?;
        }
        report.cancelled = *self.shutdown.borrow();

        if report.cancelled {
            info!("Run cancelled: {}", report);
        } else {
            info!("All downloads complete: {}", report);
        }
        Ok(report)
    }
}
