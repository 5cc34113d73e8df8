use anyhow::Result;
use csrc_harvest::{
    config::{Config, DispatchStrategy},
    progress::DownloadProgress,
    scraping::{FetchConfig, HarvestCoordinator},
};
use std::future::Future;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Command-line overrides for a run
#[derive(Debug, Default)]
pub struct RunArgs {
    pub all: bool,
    pub sample_size: Option<usize>,
    pub seed: Option<u64>,
    pub workers: Option<usize>,
    pub strategy: Option<DispatchStrategy>,
    pub dry_run: bool,
}

impl RunArgs {
    fn apply(&self, config: &mut Config) {
        let harvest = &mut config.harvest;
        if self.all {
            harvest.limit_downloads = false;
        }
        if let Some(sample_size) = self.sample_size {
            harvest.limit_downloads = true;
            harvest.sample_size = sample_size;
        }
        if let Some(seed) = self.seed {
            harvest.sample_seed = Some(seed);
        }
        if let Some(workers) = self.workers {
            harvest.workers = workers;
        }
        if let Some(strategy) = self.strategy {
            harvest.dispatch = strategy;
        }
    }
}

/// The first Ctrl-C requests a graceful shutdown; the second returns `true`
/// so the caller can exit at once. Returns `false` if the signal stream fails.
async fn forward_interrupts<S, Fut>(mut next_signal: S, shutdown: watch::Sender<bool>) -> bool
where
    S: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if next_signal().await.is_err() {
        return false;
    }
    warn!("Run interrupted by user. Press Ctrl-C again to exit immediately.");
    let _ = shutdown.send(true);

    next_signal().await.is_ok()
}

pub async fn run_harvest(mut config: Config, args: RunArgs, quiet: bool) -> Result<()> {
    args.apply(&mut config);
    config.validate()?;

    info!("Download directory: {}", config.harvest.download_dir.display());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let signal_task = tokio::spawn(async move {
        if forward_interrupts(tokio::signal::ctrl_c, shutdown_tx).await {
            error!("Interrupted twice, exiting without waiting for downloads.");
            std::process::exit(130);
        }
    });

    let coordinator = HarvestCoordinator::new(config.harvest, FetchConfig::from_config(&config.http))?
        .with_shutdown(shutdown_rx)
        .with_progress(DownloadProgress::new(quiet))
        .dry_run(args.dry_run);

    let report = coordinator.run().await;
    signal_task.abort();
    let report = report?;

    let stats = coordinator.fetcher().stats();
    info!(
        "HTTP: {} requests, {} retries, {} failures",
        stats.requests, stats.retries, stats.failures
    );

    println!("{}", report);
    if report.cancelled {
        println!("Download interrupted. Exiting gracefully.");
    } else if !report.aborted && !args.dry_run {
        println!(
            "{} row(s) appended to {}",
            report.rows_logged,
            coordinator.config().ledger_path().display()
        );
    }

    Ok(())
}
