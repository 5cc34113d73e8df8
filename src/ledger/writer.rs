//! Single-writer ledger actor
//!
//! One background task owns the [`OutcomeLog`]; producers only hold a cheap
//! [`LedgerHandle`] and send outcomes over a channel, so appends never race.

use std::path::PathBuf;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::{LedgerError, OutcomeLog};
use crate::types::DownloadOutcome;

const QUEUE_CAPACITY: usize = 256;

enum LedgerCommand {
    Append(Box<DownloadOutcome>),
    Shutdown { respond_to: oneshot::Sender<usize> },
}

/// Cloneable sender side of the ledger
#[derive(Clone)]
pub struct LedgerHandle {
    tx: mpsc::Sender<LedgerCommand>,
}

impl LedgerHandle {
    /// Queue an outcome for appending
    pub async fn append(&self, outcome: DownloadOutcome) -> Result<(), LedgerError> {
        self.tx
            .send(LedgerCommand::Append(Box::new(outcome)))
            .await
            .map_err(|_| LedgerError::Closed)
    }
}

/// Owner of the ledger task
pub struct LedgerWriter {
    handle: LedgerHandle,
    worker: JoinHandle<()>,
}

impl LedgerWriter {
    /// Spawn the writer task for the ledger at `path`
    pub fn start(path: impl Into<PathBuf>) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let log = OutcomeLog::open(path);

        let worker = tokio::spawn(run_worker(log, rx));

        Self {
            handle: LedgerHandle { tx },
            worker,
        }
    }

    /// A new sender for producers
    pub fn handle(&self) -> LedgerHandle {
        self.handle.clone()
    }

    /// Drain everything queued so far, stop the task and return the number
    /// of rows it wrote.
    pub async fn close(self) -> Result<usize, LedgerError> {
        let (respond_to, rows) = oneshot::channel();
        self.handle
            .tx
            .send(LedgerCommand::Shutdown { respond_to })
            .await
            .map_err(|_| LedgerError::Closed)?;

        let rows = rows.await.map_err(|_| LedgerError::Closed)?;
        if let Err(e) = self.worker.await {
            error!("Ledger task ended abnormally: {}", e);
        }
        Ok(rows)
    }
}

async fn run_worker(mut log: OutcomeLog, mut rx: mpsc::Receiver<LedgerCommand>) {
    debug!("Ledger writer started for {}", log.path().display());

    while let Some(command) = rx.recv().await {
        match command {
            LedgerCommand::Append(outcome) => {
                if let Err(e) = log.append(&outcome) {
                    error!(
                        "Failed to append ledger row for {} to {}: {}",
                        outcome.title,
                        log.path().display(),
                        e
                    );
                }
            }
            LedgerCommand::Shutdown { respond_to } => {
                info!(
                    "Ledger closed: {} row(s) written to {}",
                    log.rows_written(),
                    log.path().display()
                );
                let _ = respond_to.send(log.rows_written());
                return;
            }
        }
    }

    debug!("Ledger writer stopped: all handles dropped");
}
