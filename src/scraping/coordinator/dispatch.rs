//! Per-document work and the two dispatch strategies

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::types::DocumentResult;
use crate::scraping::downloader::DownloadCoordinator;
use crate::scraping::resolver::DocumentResolver;
use crate::types::DocumentRef;

/// Resolve + download for a single document
pub(super) struct DocumentWorker {
    pub(super) resolver: DocumentResolver,
    /// None on dry runs
    pub(super) downloader: Option<DownloadCoordinator>,
    pub(super) shutdown: watch::Receiver<bool>,
}

impl DocumentWorker {
    fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    pub(super) async fn process(&self, doc: DocumentRef) -> DocumentResult {
        if self.shutdown_requested() {
            return DocumentResult::NotStarted;
        }

        let resolved = self.resolver.resolve(doc).await;
        let Some(pdf_url) = resolved.pdf_url else {
            warn!("No PDF link found for {} ({})", resolved.title, resolved.intermediate_url);
            return DocumentResult::Skipped;
        };

        let Some(downloader) = &self.downloader else {
            info!("{} -> {}", resolved.title, pdf_url);
            return DocumentResult::Resolved;
        };

        if self.shutdown_requested() {
            debug!("Shutdown requested, not starting {}", resolved.title);
            return DocumentResult::NotStarted;
        }

        let outcome = downloader
            .download(&resolved.title, &pdf_url, resolved.summary)
            .await;
        DocumentResult::Downloaded(outcome.status)
    }
}

/// Fixed pool of workers draining a shared queue. Each worker finishes one
/// document before taking the next, so at most `workers` are in flight.
pub(super) async fn dispatch_pool(
    docs: Vec<DocumentRef>,
    workers: usize,
    worker: Arc<DocumentWorker>,
) -> Vec<DocumentResult> {
    let total = docs.len();
    let queue = Arc::new(Mutex::new(VecDeque::from(docs)));
    let workers = workers.max(1).min(total.max(1));

    let mut handles = Vec::with_capacity(workers);
    for id in 0..workers {
        let queue = queue.clone();
        let worker = worker.clone();
        handles.push(tokio::spawn(async move {
            let mut results = Vec::new();
            loop {
                if worker.shutdown_requested() {
                    break;
                }
                let next = queue.lock().unwrap_or_else(|e| e.into_inner()).pop_front();
                let Some(doc) = next else {
                    break;
                };
                results.push(worker.process(doc).await);
            }
            debug!("Worker {} done after {} document(s)", id, results.len());
            results
        }));
    }

    let mut results = Vec::with_capacity(total);
    for handle in handles {
        match handle.await {
            Ok(batch) => results.extend(batch),
            Err(e) => error!("Download worker panicked: {}", e),
        }
    }

    // Anything still queued was never picked up
    let remaining = queue.lock().unwrap_or_else(|e| e.into_inner()).len();
    results.extend(std::iter::repeat(DocumentResult::NotStarted).take(remaining));
    results
}

/// One task per document, all awaited together
pub(super) async fn dispatch_gather(
    docs: Vec<DocumentRef>,
    worker: Arc<DocumentWorker>,
) -> Vec<DocumentResult> {
    let handles: Vec<_> = docs
        .into_iter()
        .map(|doc| {
            let worker = worker.clone();
            tokio::spawn(async move { worker.process(doc).await })
        })
        .collect();

    futures::future::join_all(handles)
        .await
        .into_iter()
        .filter_map(|joined| match joined {
            Ok(result) => Some(result),
            Err(e) => {
                error!("Download task panicked: {}", e);
                None
            }
        })
        .collect()
}
