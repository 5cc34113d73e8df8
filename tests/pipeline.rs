//! End-to-end tests for the harvest pipeline
//!
//! Each test serves a small fake publication site from an in-process axum
//! server and runs the real coordinator against it.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use csrc_harvest::{
    config::{DispatchStrategy, HarvestConfig},
    ledger::{read_rows, SUMMARY_UNAVAILABLE},
    scraping::{
        coordinator::RunReport, DocumentResolver, FetchConfig, FetchEngine, HarvestCoordinator,
        LinkExtractor, RetryPolicy,
    },
};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{watch, Notify};
use url::Url;

const LISTING_PATH: &str = "/publications/sp";

/// One canned response
#[derive(Clone)]
struct Fixture {
    status: StatusCode,
    content_type: &'static str,
    body: Vec<u8>,
}

impl Fixture {
    fn html(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: "text/html; charset=utf-8",
            body: body.into().into_bytes(),
        }
    }

    fn pdf(body: &[u8]) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: "application/pdf",
            body: body.to_vec(),
        }
    }

    fn status(status: StatusCode) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: status.to_string().into_bytes(),
        }
    }
}

/// Holds every PDF response until released
#[derive(Default)]
struct Gate {
    started: Notify,
    release: Notify,
}

/// Fake site: each path serves its fixtures in order, repeating the last one
#[derive(Default)]
struct Site {
    routes: HashMap<String, Vec<Fixture>>,
    hits: Mutex<HashMap<String, usize>>,
    pdf_hits: AtomicUsize,
    gate: Option<Gate>,
}

impl Site {
    fn gated(mut self) -> Self {
        self.gate = Some(Gate::default());
        self
    }

    fn route(mut self, path: &str, fixtures: Vec<Fixture>) -> Self {
        self.routes.insert(path.to_string(), fixtures);
        self
    }

    /// Listing page linking to `/pubs/sp/800/{id}/final` for every
    /// `(id, title)`, plus a few links the extractor must ignore.
    fn listing(self, docs: &[(&str, &str)]) -> Self {
        let mut html = String::from(
            "<html><body><nav><a href=\"/publications\">All</a><a href=\"/glossary\">Glossary</a></nav><ul>",
        );
        for (id, title) in docs {
            html.push_str(&format!(
                "<li><a href=\"/pubs/sp/800/{}/final\">{}</a></li>",
                id, title
            ));
        }
        html.push_str("</ul></body></html>");
        self.route(LISTING_PATH, vec![Fixture::html(html)])
    }

    /// Intermediate page with a description and a relative PDF link
    fn document(self, id: &str, summary: &str, pdf: &[u8]) -> Self {
        let page = format!(
            "<html><head><meta name=\"description\" content=\"{}\"></head><body>\
             <a href=\"/pubs/sp/800/{}/final/errata\">Errata</a>\
             <a href=\"/nistpubs/SP.800-{}.pdf\">Local Download</a>\
             <a href=\"/nistpubs/SP.800-{}-draft.pdf\">Draft</a></body></html>",
            summary, id, id, id
        );
        self.route(&format!("/pubs/sp/800/{}/final", id), vec![Fixture::html(page)])
            .route(&format!("/nistpubs/SP.800-{}.pdf", id), vec![Fixture::pdf(pdf)])
    }

    fn hits(&self, path: &str) -> usize {
        self.hits.lock().unwrap().get(path).copied().unwrap_or(0)
    }
}

async fn serve(State(site): State<Arc<Site>>, uri: Uri) -> Response {
    let path = uri.path().to_string();
    let nth = {
        let mut hits = site.hits.lock().unwrap();
        let count = hits.entry(path.clone()).or_insert(0);
        *count += 1;
        *count - 1
    };
    if path.ends_with(".pdf") {
        site.pdf_hits.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &site.gate {
            gate.started.notify_one();
            gate.release.notified().await;
        }
    }

    match site.routes.get(&path) {
        Some(fixtures) => {
            let fixture = &fixtures[nth.min(fixtures.len() - 1)];
            (
                fixture.status,
                [(header::CONTENT_TYPE, fixture.content_type)],
                fixture.body.clone(),
            )
                .into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Serve `site` on an ephemeral port and return its origin
async fn spawn_site(site: Arc<Site>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().fallback(serve).with_state(site);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Raw HTTP server that promises `promised` bytes, sends `sent`, then hangs up
async fn spawn_truncating_server(promised: usize, sent: &'static [u8]) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut request = [0u8; 4096];
                let _ = socket.read(&mut request).await;
                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/pdf\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    promised
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(sent).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    format!("http://{}", addr)
}

fn harvest_config(origin: &str, download_dir: &Path) -> HarvestConfig {
    HarvestConfig {
        base_url: origin.to_string(),
        pdf_origin: origin.to_string(),
        download_dir: download_dir.to_path_buf(),
        limit_downloads: false,
        ..Default::default()
    }
}

fn fetch_config(max_attempts: u32) -> FetchConfig {
    FetchConfig {
        page_timeout: Duration::from_secs(5),
        download_timeout: Duration::from_secs(5),
        retry: RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(50),
        },
        ..Default::default()
    }
}

async fn run(config: HarvestConfig) -> RunReport {
    HarvestCoordinator::new(config, fetch_config(3))
        .unwrap()
        .run()
        .await
        .unwrap()
}

fn pdf_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".pdf"))
        .collect();
    names.sort();
    names
}

/// Test a full run: one success, one page without a PDF, one missing PDF
#[tokio::test]
async fn test_full_run_logs_one_row_per_attempt() {
    let site = Site::default()
        .listing(&[
            ("53", "SP 800-53 Rev. 5"),
            ("12", "SP 800-12"),
            ("999", "SP 800-999"),
        ])
        .document("53", "Security and Privacy Controls", b"%PDF-1.7 controls")
        .route(
            "/pubs/sp/800/12/final",
            vec![Fixture::html("<html><body><a href=\"/about\">About</a></body></html>")],
        )
        .route(
            "/pubs/sp/800/999/final",
            vec![Fixture::html(
                "<html><body><a href=\"/nistpubs/SP.800-999.pdf\">Local Download</a></body></html>",
            )],
        );
    let origin = spawn_site(Arc::new(site)).await;
    let temp_dir = TempDir::new().unwrap();

    let report = run(harvest_config(&origin, temp_dir.path())).await;

    assert_eq!(report.discovered, 3);
    assert_eq!(report.selected, 3);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.rows_logged, 2);
    assert!(!report.aborted && !report.cancelled);

    let saved = std::fs::read(temp_dir.path().join("SP 800-53 Rev. 5.pdf")).unwrap();
    assert_eq!(saved, b"%PDF-1.7 controls");
    assert!(!temp_dir.path().join("SP 800-12.pdf").exists());

    let mut rows = read_rows(&temp_dir.path().join("download_log.csv")).unwrap();
    rows.sort_by(|a, b| a.title.cmp(&b.title));
    assert_eq!(rows.len(), 2);

    assert_eq!(rows[0].title, "SP 800-53 Rev. 5");
    assert_eq!(rows[0].status, "Success");
    assert_eq!(rows[0].size_mb, "0.00");
    assert_eq!(rows[0].summary, "Security and Privacy Controls");

    assert_eq!(rows[1].title, "SP 800-999");
    assert_eq!(rows[1].status, "Failed");
    assert_eq!(rows[1].size_mb, "0.00");
    assert_eq!(rows[1].summary, SUMMARY_UNAVAILABLE);
}

#[tokio::test]
async fn test_empty_listing_writes_nothing() {
    let site = Site::default().listing(&[]);
    let origin = spawn_site(Arc::new(site)).await;
    let temp_dir = TempDir::new().unwrap();

    let report = run(harvest_config(&origin, temp_dir.path())).await;

    assert_eq!(report.discovered, 0);
    assert_eq!(report.attempted(), 0);
    assert!(!temp_dir.path().join("download_log.csv").exists());
    assert!(pdf_files(temp_dir.path()).is_empty());
}

#[tokio::test]
async fn test_listing_failure_aborts_run() {
    let site = Site::default().route(
        LISTING_PATH,
        vec![Fixture::status(StatusCode::INTERNAL_SERVER_ERROR)],
    );
    let site = Arc::new(site);
    let origin = spawn_site(site.clone()).await;
    let temp_dir = TempDir::new().unwrap();

    let report = HarvestCoordinator::new(harvest_config(&origin, temp_dir.path()), fetch_config(1))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert!(report.aborted);
    assert_eq!(report, RunReport { aborted: true, ..Default::default() });
    assert_eq!(site.hits(LISTING_PATH), 1);
    assert!(!temp_dir.path().join("download_log.csv").exists());
    assert!(pdf_files(temp_dir.path()).is_empty());
}

#[tokio::test]
async fn test_sampling_limits_downloads() {
    let ids: Vec<String> = (1..=8).map(|i| i.to_string()).collect();
    let docs: Vec<(String, String)> = ids
        .iter()
        .map(|id| (id.clone(), format!("SP 800-{}", id)))
        .collect();
    let doc_refs: Vec<(&str, &str)> = docs.iter().map(|(id, t)| (id.as_str(), t.as_str())).collect();

    let mut site = Site::default().listing(&doc_refs);
    for id in &ids {
        site = site.document(id, "summary", b"%PDF");
    }
    let site = Arc::new(site);
    let origin = spawn_site(site.clone()).await;
    let temp_dir = TempDir::new().unwrap();

    let config = HarvestConfig {
        limit_downloads: true,
        sample_size: 5,
        sample_seed: Some(17),
        ..harvest_config(&origin, temp_dir.path())
    };
    let report = run(config).await;

    assert_eq!(report.discovered, 8);
    assert_eq!(report.selected, 5);
    assert_eq!(report.succeeded, 5);
    assert_eq!(site.pdf_hits.load(Ordering::SeqCst), 5);
    assert_eq!(pdf_files(temp_dir.path()).len(), 5);

    let rows = read_rows(&temp_dir.path().join("download_log.csv")).unwrap();
    let mut titles: Vec<_> = rows.iter().map(|row| row.title.clone()).collect();
    titles.sort();
    titles.dedup();
    assert_eq!(titles.len(), 5);
}

#[tokio::test]
async fn test_rerun_appends_rows_and_overwrites_files() {
    let site = Site::default()
        .listing(&[("30", "SP 800-30"), ("61", "SP 800-61")])
        .document("30", "Risk Assessments", b"%PDF-30")
        .document("61", "Incident Handling", b"%PDF-61");
    let origin = spawn_site(Arc::new(site)).await;
    let temp_dir = TempDir::new().unwrap();
    let ledger = temp_dir.path().join("download_log.csv");

    run(harvest_config(&origin, temp_dir.path())).await;
    let files_after_first = pdf_files(temp_dir.path());
    assert_eq!(read_rows(&ledger).unwrap().len(), 2);

    let report = run(harvest_config(&origin, temp_dir.path())).await;
    assert_eq!(report.rows_logged, 2);
    assert_eq!(read_rows(&ledger).unwrap().len(), 4);
    assert_eq!(pdf_files(temp_dir.path()), files_after_first);

    // Header appears exactly once
    let raw = std::fs::read_to_string(&ledger).unwrap();
    assert_eq!(raw.matches("Title,Timestamp").count(), 1);
}

#[tokio::test]
async fn test_gather_strategy_downloads_everything() {
    let site = Site::default()
        .listing(&[("1", "SP 800-1"), ("2", "SP 800-2"), ("3", "SP 800-3"), ("4", "SP 800-4")])
        .document("1", "one", b"%PDF-1")
        .document("2", "two", b"%PDF-2")
        .document("3", "three", b"%PDF-3")
        .document("4", "four", b"%PDF-4");
    let origin = spawn_site(Arc::new(site)).await;
    let temp_dir = TempDir::new().unwrap();

    let config = HarvestConfig {
        dispatch: DispatchStrategy::Gather,
        ..harvest_config(&origin, temp_dir.path())
    };
    let report = run(config).await;

    assert_eq!(report.succeeded, 4);
    assert_eq!(report.rows_logged, 4);
    assert_eq!(
        pdf_files(temp_dir.path()),
        vec!["SP 800-1.pdf", "SP 800-2.pdf", "SP 800-3.pdf", "SP 800-4.pdf"]
    );
}

#[tokio::test]
async fn test_transient_error_is_retried() {
    let site = Site::default()
        .listing(&[("207", "SP 800-207")])
        .document("207", "Zero Trust Architecture", b"%PDF-zta")
        .route(
            "/nistpubs/SP.800-207.pdf",
            vec![
                Fixture::status(StatusCode::SERVICE_UNAVAILABLE),
                Fixture::pdf(b"%PDF-zta"),
            ],
        );
    let site = Arc::new(site);
    let origin = spawn_site(site.clone()).await;
    let temp_dir = TempDir::new().unwrap();

    let coordinator =
        HarvestCoordinator::new(harvest_config(&origin, temp_dir.path()), fetch_config(3)).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.succeeded, 1);
    assert_eq!(site.hits("/nistpubs/SP.800-207.pdf"), 2);
    assert_eq!(coordinator.fetcher().stats().retries, 1);
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let site = Arc::new(Site::default());
    let origin = spawn_site(site.clone()).await;
    let fetcher = FetchEngine::new(fetch_config(3)).unwrap();

    let url = Url::parse(&format!("{}/missing.pdf", origin)).unwrap();
    let err = fetcher.open_stream(&url).await.unwrap_err();

    assert!(!err.is_transient());
    assert_eq!(site.hits("/missing.pdf"), 1);
    assert_eq!(fetcher.stats().retries, 0);
    assert_eq!(fetcher.stats().failures, 1);
}

#[tokio::test]
async fn test_resolver_reads_intermediate_page() {
    let site = Site::default().document("63", "Digital Identity Guidelines", b"%PDF");
    let site = Arc::new(site);
    let origin = spawn_site(site.clone()).await;
    let origin_url = Url::parse(&origin).unwrap();

    let fetcher = Arc::new(FetchEngine::new(fetch_config(1)).unwrap());
    let extractor = Arc::new(LinkExtractor::new(origin_url.clone(), origin_url.clone(), "/pubs/sp/").unwrap());
    let resolver = DocumentResolver::new(fetcher, extractor);

    let page = origin_url.join("/pubs/sp/800/63/final").unwrap();
    assert_eq!(
        resolver.fetch_pdf_link(&page).await,
        Some(origin_url.join("/nistpubs/SP.800-63.pdf").unwrap())
    );
    assert_eq!(
        resolver.fetch_summary(&page).await.as_deref(),
        Some("Digital Identity Guidelines")
    );

    let missing = origin_url.join("/pubs/sp/800/0/final").unwrap();
    assert_eq!(resolver.fetch_pdf_link(&missing).await, None);
    assert_eq!(resolver.fetch_summary(&missing).await, None);
}

#[tokio::test]
async fn test_resolve_fetches_intermediate_page_once() {
    let site = Site::default()
        .listing(&[("88", "SP 800-88")])
        .document("88", "Media Sanitization", b"%PDF-88");
    let site = Arc::new(site);
    let origin = spawn_site(site.clone()).await;
    let temp_dir = TempDir::new().unwrap();

    let report = run(harvest_config(&origin, temp_dir.path())).await;

    assert_eq!(report.succeeded, 1);
    assert_eq!(site.hits("/pubs/sp/800/88/final"), 1);
}

#[tokio::test]
async fn test_dry_run_downloads_nothing() {
    let site = Site::default()
        .listing(&[("37", "SP 800-37"), ("12", "SP 800-12")])
        .document("37", "Risk Management Framework", b"%PDF-37")
        .route(
            "/pubs/sp/800/12/final",
            vec![Fixture::html("<html><body>No downloads</body></html>")],
        );
    let site = Arc::new(site);
    let origin = spawn_site(site.clone()).await;
    let temp_dir = TempDir::new().unwrap();

    let report = HarvestCoordinator::new(harvest_config(&origin, temp_dir.path()), fetch_config(1))
        .unwrap()
        .dry_run(true)
        .run()
        .await
        .unwrap();

    assert_eq!(report.resolved, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.attempted(), 0);
    assert_eq!(report.rows_logged, 0);
    assert_eq!(site.pdf_hits.load(Ordering::SeqCst), 0);
    assert!(!temp_dir.path().join("download_log.csv").exists());
    assert!(pdf_files(temp_dir.path()).is_empty());
}

#[tokio::test]
async fn test_shutdown_before_dispatch_starts_nothing() {
    let site = Site::default()
        .listing(&[("1", "SP 800-1"), ("2", "SP 800-2"), ("3", "SP 800-3")])
        .document("1", "one", b"%PDF-1")
        .document("2", "two", b"%PDF-2")
        .document("3", "three", b"%PDF-3");
    let site = Arc::new(site);
    let origin = spawn_site(site.clone()).await;
    let temp_dir = TempDir::new().unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    shutdown_tx.send(true).unwrap();

    for dispatch in [DispatchStrategy::Pool, DispatchStrategy::Gather] {
        let config = HarvestConfig {
            dispatch,
            ..harvest_config(&origin, temp_dir.path())
        };
        let report = HarvestCoordinator::new(config, fetch_config(1))
            .unwrap()
            .with_shutdown(shutdown_rx.clone())
            .run()
            .await
            .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.selected, 3);
        assert_eq!(report.not_started, 3);
        assert_eq!(report.attempted(), 0);
    }

    assert_eq!(site.pdf_hits.load(Ordering::SeqCst), 0);
    assert!(!temp_dir.path().join("download_log.csv").exists());
}

#[tokio::test]
async fn test_truncated_stream_is_logged_as_failed() {
    let pdf_origin = spawn_truncating_server(100_000, b"%PDF-1.7 par").await;
    let site = Site::default()
        .listing(&[("171", "SP 800-171")])
        .route(
            "/pubs/sp/800/171/final",
            vec![Fixture::html(format!(
                "<html><body><a href=\"{}/nistpubs/SP.800-171.pdf\">Local Download</a></body></html>",
                pdf_origin
            ))],
        );
    let origin = spawn_site(Arc::new(site)).await;
    let temp_dir = TempDir::new().unwrap();

    let report = run(harvest_config(&origin, temp_dir.path())).await;

    assert_eq!(report.succeeded, 0);
    assert_eq!(report.failed, 1);
    assert_eq!(report.rows_logged, 1);

    let rows = read_rows(&temp_dir.path().join("download_log.csv")).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].title, "SP 800-171");
    assert_eq!(rows[0].status, "Failed");

    // The partial file is kept and holds what was received
    let partial = std::fs::read(temp_dir.path().join("SP 800-171.pdf")).unwrap();
    assert_eq!(partial, b"%PDF-1.7 par");
}

#[tokio::test]
async fn test_unwritable_target_is_logged_as_failed() {
    let site = Site::default()
        .listing(&[("18", "SP 800-18"), ("34", "SP 800-34")])
        .document("18", "System Security Plans", b"%PDF-18")
        .document("34", "Contingency Planning", b"%PDF-34");
    let origin = spawn_site(Arc::new(site)).await;
    let temp_dir = TempDir::new().unwrap();
    std::fs::create_dir(temp_dir.path().join("SP 800-18.pdf")).unwrap();

    let report = run(harvest_config(&origin, temp_dir.path())).await;

    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.rows_logged, 2);

    let rows = read_rows(&temp_dir.path().join("download_log.csv")).unwrap();
    let failed: Vec<_> = rows.iter().filter(|row| row.status == "Failed").collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].title, "SP 800-18");
    assert_eq!(failed[0].size_mb, "0.00");
    assert_eq!(
        std::fs::read(temp_dir.path().join("SP 800-34.pdf")).unwrap(),
        b"%PDF-34"
    );
}

#[tokio::test]
async fn test_shutdown_during_download_finishes_in_flight_work() {
    let site = Site::default()
        .gated()
        .listing(&[("1", "SP 800-1"), ("2", "SP 800-2"), ("3", "SP 800-3")])
        .document("1", "one", b"%PDF-1")
        .document("2", "two", b"%PDF-2")
        .document("3", "three", b"%PDF-3");
    let site = Arc::new(site);
    let origin = spawn_site(site.clone()).await;
    let temp_dir = TempDir::new().unwrap();

    let config = HarvestConfig {
        workers: 1,
        ..harvest_config(&origin, temp_dir.path())
    };
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let coordinator = HarvestCoordinator::new(config, fetch_config(1))
        .unwrap()
        .with_shutdown(shutdown_rx);

    let gate = site.gate.as_ref().unwrap();
    let interrupt = async {
        gate.started.notified().await;
        shutdown_tx.send(true).unwrap();
        gate.release.notify_one();
    };
    let (report, ()) = tokio::join!(coordinator.run(), interrupt);
    let report = report.unwrap();

    assert!(report.cancelled);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.not_started, 2);
    assert_eq!(report.rows_logged, 1);
    assert_eq!(site.pdf_hits.load(Ordering::SeqCst), 1);

    let rows = read_rows(&temp_dir.path().join("download_log.csv")).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, "Success");
    assert_eq!(pdf_files(temp_dir.path()), vec!["SP 800-1.pdf"]);
}
