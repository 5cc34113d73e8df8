//! csrc-harvest: bulk downloader for NIST CSRC Special Publications

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use csrc_harvest::config::{Config, DispatchStrategy, DEFAULT_CONFIG_FILE};
use csrc_harvest::logging::init_logging;
use std::path::PathBuf;

use commands::{init::init_config, run::run_harvest, run::RunArgs};

#[derive(Parser)]
#[command(name = "csrc-harvest")]
#[command(about = "Download NIST Special Publication PDFs from csrc.nist.gov")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Download directory (overrides the config file)
    #[arg(short, long, global = true)]
    download_dir: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Hide progress bars
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl the listing and download PDFs (default)
    Run(RunCli),

    /// Write a default configuration file
    Init {
        /// Output directory
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

#[derive(clap::Args, Default)]
struct RunCli {
    /// Download every listed publication instead of a sample
    #[arg(long, conflicts_with = "sample_size")]
    all: bool,

    /// Number of publications to sample
    #[arg(short = 'n', long)]
    sample_size: Option<usize>,

    /// Seed for reproducible sampling
    #[arg(long)]
    seed: Option<u64>,

    /// Concurrent downloads for the pool strategy
    #[arg(short, long)]
    workers: Option<usize>,

    /// Dispatch strategy
    #[arg(long, value_enum)]
    strategy: Option<CliStrategy>,

    /// Resolve PDF links without downloading
    #[arg(long)]
    dry_run: bool,
}

/// CLI strategy enum (mirrors DispatchStrategy but with clap support)
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum CliStrategy {
    /// Bounded worker pool
    Pool,
    /// One task per publication
    Gather,
}

impl From<CliStrategy> for DispatchStrategy {
    fn from(strategy: CliStrategy) -> Self {
        match strategy {
            CliStrategy::Pool => DispatchStrategy::Pool,
            CliStrategy::Gather => DispatchStrategy::Gather,
        }
    }
}

impl From<RunCli> for RunArgs {
    fn from(cli: RunCli) -> Self {
        RunArgs {
            all: cli.all,
            sample_size: cli.sample_size,
            seed: cli.seed,
            workers: cli.workers,
            strategy: cli.strategy.map(Into::into),
            dry_run: cli.dry_run,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = match cli.command.unwrap_or(Commands::Run(RunCli::default())) {
        Commands::Init { path } => return init_config(path),
        Commands::Run(args) => args,
    };

    let mut config = Config::load_or_default(&cli.config)?;

    // Override download dir if specified
    if let Some(download_dir) = cli.download_dir {
        config.harvest.download_dir = download_dir;
    }

    // The log file lives inside the download directory
    std::fs::create_dir_all(&config.harvest.download_dir).with_context(|| {
        format!(
            "Failed to create download directory {}",
            config.harvest.download_dir.display()
        )
    })?;
    let log_path = config.harvest.log_path();
    init_logging(&config.logging, cli.verbose, Some(&log_path))?;

    run_harvest(config, args.into(), cli.quiet).await
}
