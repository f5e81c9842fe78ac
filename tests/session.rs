//! Session orchestration tests against an in-memory portal.
//!
//! `FakeBrowser` serves canned HTML per URL and can be told to hang,
//! refuse, or reject the login, so every orchestration path runs without a
//! real Chromium.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tams_scrape::session::{LOGGED_IN_MARKER, PASSWORD_SELECTOR, TIMEOUT_SCREENSHOT};
use tams_scrape::{
    default_filings, run, BrowserError, Concurrency, FilingTarget, OutputNaming, PortalBrowser, PortalPage,
    Record, ScrapeConfig, ScrapeConfigBuilder, ScrapeError, ScrapeProgressCallback,
    ScrapeResult, SelectorStrategy, TargetError,
};

const BASE: &str = "https://tams.test";

// ── Fake portal ──────────────────────────────────────────────────────────────

#[derive(Clone)]
enum Behaviour {
    Html(String),
    HangNavigation,
    RefuseNavigation,
    /// The browser's own request timeout fires during navigation.
    NavigationRequestTimeout,
    /// Loads, but the DOM can never be queried.
    DomUnavailable,
}

#[derive(Default)]
struct Portal {
    pages: HashMap<String, Behaviour>,
    reject_login: bool,
    hang_login: bool,
    login_request_timeout: bool,
    /// Artificial latency on every navigation.
    latency: Duration,
}

#[derive(Default)]
struct Tracker {
    opened: AtomicUsize,
    closed: AtomicUsize,
    open_now: AtomicUsize,
    peak_open: AtomicUsize,
    browser_closed: AtomicBool,
    granted: Mutex<Vec<String>>,
    typed: Mutex<Vec<(String, String)>>,
    visited: Mutex<Vec<String>>,
}

struct FakeBrowser {
    portal: Arc<Portal>,
    tracker: Arc<Tracker>,
}

impl FakeBrowser {
    fn new(portal: Portal) -> Self {
        Self {
            portal: Arc::new(portal),
            tracker: Arc::new(Tracker::default()),
        }
    }
}

#[async_trait]
impl PortalBrowser for FakeBrowser {
    async fn new_page(&self) -> Result<Box<dyn PortalPage>, BrowserError> {
        self.tracker.opened.fetch_add(1, Ordering::SeqCst);
        let now = self.tracker.open_now.fetch_add(1, Ordering::SeqCst) + 1;
        self.tracker.peak_open.fetch_max(now, Ordering::SeqCst);
        Ok(Box::new(FakePage {
            portal: Arc::clone(&self.portal),
            tracker: Arc::clone(&self.tracker),
            url: Mutex::new(String::new()),
        }))
    }

    async fn grant_geolocation(&self, origin: &str) -> Result<(), BrowserError> {
        self.tracker.granted.lock().unwrap().push(origin.to_string());
        Ok(())
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.tracker.browser_closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct FakePage {
    portal: Arc<Portal>,
    tracker: Arc<Tracker>,
    url: Mutex<String>,
}

impl FakePage {
    fn behaviour(&self) -> Option<Behaviour> {
        let url = self.url.lock().unwrap().clone();
        self.portal.pages.get(&url).cloned()
    }

    fn matches(&self, selector: &str) -> Result<bool, BrowserError> {
        if selector == LOGGED_IN_MARKER {
            return Ok(!self.portal.reject_login);
        }
        match self.behaviour() {
            Some(Behaviour::DomUnavailable) => {
                Err(BrowserError::Command("Execution context was destroyed".into()))
            }
            Some(Behaviour::Html(html)) => {
                let selector = scraper::Selector::parse(selector)
                    .map_err(|e| BrowserError::Command(e.to_string()))?;
                Ok(scraper::Html::parse_document(&html)
                    .select(&selector)
                    .next()
                    .is_some())
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl PortalPage for FakePage {
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        *self.url.lock().unwrap() = url.to_string();
        self.tracker.visited.lock().unwrap().push(url.to_string());
        if !self.portal.latency.is_zero() {
            tokio::time::sleep(self.portal.latency).await;
        }
        if url.ends_with("/Auth") && self.portal.hang_login {
            std::future::pending::<()>().await;
        }
        if url.ends_with("/Auth") && self.portal.login_request_timeout {
            return Err(BrowserError::Timeout(Duration::from_millis(50)));
        }
        match self.behaviour() {
            Some(Behaviour::HangNavigation) => std::future::pending().await,
            Some(Behaviour::NavigationRequestTimeout) => {
                Err(BrowserError::Timeout(Duration::from_millis(50)))
            }
            Some(Behaviour::RefuseNavigation) => {
                Err(BrowserError::Command("net::ERR_CONNECTION_REFUSED".into()))
            }
            _ => Ok(()),
        }
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        if let Ok(true) = self.matches(selector) {
            return Ok(());
        }
        tokio::time::sleep(timeout).await;
        Err(BrowserError::Timeout(timeout))
    }

    async fn has_element(&self, selector: &str) -> Result<bool, BrowserError> {
        self.matches(selector)
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<(), BrowserError> {
        self.tracker
            .typed
            .lock()
            .unwrap()
            .push((selector.to_string(), text.to_string()));
        Ok(())
    }

    async fn click(&self, _selector: &str) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn wait_for_navigation(&self) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn content(&self) -> Result<String, BrowserError> {
        match self.behaviour() {
            Some(Behaviour::Html(html)) => Ok(html),
            _ => Ok("<html><body></body></html>".to_string()),
        }
    }

    async fn screenshot(&self) -> Result<Vec<u8>, BrowserError> {
        Ok(b"\x89PNG\r\n\x1a\nfake".to_vec())
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        self.tracker.closed.fetch_add(1, Ordering::SeqCst);
        self.tracker.open_now.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

fn table_page(id: Option<&str>, headers: &[&str], rows: &[&[&str]]) -> String {
    let id_attr = id.map(|i| format!(r#" id="tbl_{i}""#)).unwrap_or_default();
    let head: String = headers.iter().map(|h| format!("<th>{h}</th>")).collect();
    let body: String = rows
        .iter()
        .map(|r| {
            let cells: String = r.iter().map(|c| format!("<td>{c}</td>")).collect();
            format!("<tr>{cells}</tr>")
        })
        .collect();
    format!(
        "<html><body><table{id_attr}><thead><tr>{head}</tr></thead>\
         <tbody>{body}</tbody></table></body></html>"
    )
}

fn leave_page() -> String {
    table_page(
        None,
        &["Date Filed", "Status", "Action"],
        &[
            &["2024-08-27, Tue, 9:09 am", "Approved", "View"],
            &["2024-08-15, Thu, 6:00 pm", "Pending", "Edit"],
        ],
    )
}

fn overtime_page() -> String {
    table_page(
        None,
        &["Date", "Duration", "Reason"],
        &[&["2024-08-15", "18:30", "Release night"]],
    )
}

fn url(path: &str) -> String {
    format!("{BASE}{path}")
}

fn full_portal() -> Portal {
    let mut pages = HashMap::new();
    pages.insert(
        url("/attendance"),
        Behaviour::Html(table_page(None, &["Date", "Time In"], &[&["2024-08-27", "9:05"]])),
    );
    pages.insert(url("/filing/overtime"), Behaviour::Html(overtime_page()));
    pages.insert(
        url("/filing/officialbusiness"),
        Behaviour::Html(table_page(None, &["Date", "Destination"], &[])),
    );
    pages.insert(url("/filing/leave"), Behaviour::Html(leave_page()));
    Portal {
        pages,
        ..Portal::default()
    }
}

fn config(dir: &Path) -> ScrapeConfigBuilder {
    ScrapeConfig::builder()
        .base_url(BASE)
        .credentials("jdoe", "hunter2")
        .output_dir(dir)
        .navigation_timeout(Duration::from_millis(300))
        .selector_timeout(Duration::from_millis(100))
        .login_timeout(Duration::from_millis(300))
}

/// Route library logs to the test harness; `RUST_LOG=tams_scrape=debug`
/// shows session transitions.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn read_records(path: &Path) -> Vec<Record> {
    let text = std::fs::read_to_string(path).unwrap();
    serde_json::from_str(&text).unwrap()
}

// ── Happy paths ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_sequential_run_writes_every_table() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let browser = FakeBrowser::new(full_portal());
    let cfg = config(dir.path()).build().unwrap();

    let report = run(&cfg, &browser).await.unwrap();

    assert_eq!(report.stats.total_targets, 4);
    assert_eq!(report.stats.found, 4);
    assert_eq!(report.stats.failed, 0);
    assert_eq!(report.stats.records_written, 4);
    assert!(report.all_succeeded());

    // Sequential mode reuses the login tab.
    assert_eq!(browser.tracker.opened.load(Ordering::SeqCst), 1);
    assert_eq!(browser.tracker.closed.load(Ordering::SeqCst), 1);
    // The orchestrator does not close a browser it did not launch.
    assert!(!browser.tracker.browser_closed.load(Ordering::SeqCst));

    let leave = read_records(&dir.path().join("leave-data.json"));
    assert_eq!(leave.len(), 2);
    assert_eq!(leave[0]["date_filed"], "Tue, 27 Aug 2024 09:09:00 GMT");
    assert_eq!(leave[0]["status"], "Approved");
    assert!(!leave[0].contains_key("action"));
    assert_eq!(leave[1]["date_filed"], "Thu, 15 Aug 2024 18:00:00 GMT");

    let ot = read_records(&dir.path().join("overtime-data.json"));
    assert_eq!(ot[0]["duration"], "6:30 PM");
    assert_eq!(ot[0]["reason"], "Release night");

    // An empty table is still Found and still written.
    let ob = read_records(&dir.path().join("officialbusiness-data.json"));
    assert!(ob.is_empty());
}

#[tokio::test]
async fn test_login_types_credentials_and_grants_geolocation() {
    let dir = tempfile::tempdir().unwrap();
    let browser = FakeBrowser::new(full_portal());
    let cfg = config(dir.path())
        .permission_origin("https://hcc.test")
        .build()
        .unwrap();

    run(&cfg, &browser).await.unwrap();

    assert_eq!(
        *browser.tracker.granted.lock().unwrap(),
        vec!["https://hcc.test".to_string()]
    );
    let typed = browser.tracker.typed.lock().unwrap();
    assert!(typed
        .iter()
        .any(|(sel, text)| sel == PASSWORD_SELECTOR && text == "hunter2"));
    let visited = browser.tracker.visited.lock().unwrap();
    assert_eq!(visited[0], url("/Auth"));
}

#[tokio::test]
async fn test_timestamped_names_use_short_labels() {
    let dir = tempfile::tempdir().unwrap();
    let browser = FakeBrowser::new(full_portal());
    let cfg = config(dir.path())
        .targets(vec![FilingTarget::new("overtime", "ot")])
        .output_naming(OutputNaming::Timestamped)
        .build()
        .unwrap();

    let report = run(&cfg, &browser).await.unwrap();
    let path = report.outcomes[0].output_path.clone().unwrap();
    let name = path.file_name().unwrap().to_string_lossy().to_string();
    // ot-YYYYMMDD-HHmmss.json
    assert!(name.starts_with("ot-"), "got {name}");
    assert!(name.ends_with(".json"));
    assert_eq!(name.len(), "ot-20240827-090507.json".len());
}

// ── Failure isolation ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_parallel_timeout_does_not_block_other_targets() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let mut portal = full_portal();
    portal
        .pages
        .insert(url("/filing/overtime"), Behaviour::HangNavigation);
    let browser = FakeBrowser::new(portal);
    let cfg = config(dir.path())
        .concurrency(Concurrency::Parallel)
        .build()
        .unwrap();

    let report = run(&cfg, &browser).await.unwrap();

    assert_eq!(report.stats.found, 3);
    assert_eq!(report.stats.failed, 1);
    assert!(!report.all_succeeded());

    let ot = report.outcome("overtime").unwrap();
    match &ot.result {
        ScrapeResult::Failed(TargetError::NavigationTimeout { target, url: u, .. }) => {
            assert_eq!(target, "overtime");
            assert_eq!(u, &url("/filing/overtime"));
        }
        other => panic!("expected navigation timeout, got {other:?}"),
    }
    assert!(ot.output_path.is_none());
    assert!(!dir.path().join("overtime-data.json").exists());
    assert!(dir.path().join("leave-data.json").exists());

    // Outcomes follow the configured target order.
    let keys: Vec<&str> = report.outcomes.iter().map(|o| o.target.key.as_str()).collect();
    assert_eq!(keys, ["attendance", "overtime", "officialbusiness", "leave"]);

    // Login tab + one tab per target, all closed.
    assert_eq!(browser.tracker.opened.load(Ordering::SeqCst), 5);
    assert_eq!(browser.tracker.closed.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_parallel_respects_max_tabs() {
    let dir = tempfile::tempdir().unwrap();
    let mut portal = full_portal();
    portal.latency = Duration::from_millis(30);
    let browser = FakeBrowser::new(portal);
    let cfg = config(dir.path())
        .concurrency(Concurrency::Parallel)
        .max_tabs(2)
        .build()
        .unwrap();

    let report = run(&cfg, &browser).await.unwrap();

    assert_eq!(report.stats.found, 4);
    assert!(browser.tracker.peak_open.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn test_selector_timeout_and_refused_navigation_are_target_failures() {
    let dir = tempfile::tempdir().unwrap();
    let mut portal = full_portal();
    portal
        .pages
        .insert(url("/attendance"), Behaviour::DomUnavailable);
    portal
        .pages
        .insert(url("/filing/officialbusiness"), Behaviour::RefuseNavigation);
    let browser = FakeBrowser::new(portal);
    let cfg = config(dir.path()).build().unwrap();

    let report = run(&cfg, &browser).await.unwrap();

    assert!(matches!(
        report.outcome("attendance").unwrap().result,
        ScrapeResult::Failed(TargetError::SelectorTimeout { .. })
    ));
    match &report.outcome("officialbusiness").unwrap().result {
        ScrapeResult::Failed(e @ TargetError::Navigation { .. }) => {
            assert!(!e.is_timeout());
            assert!(e.to_string().contains("REFUSED"));
        }
        other => panic!("expected navigation failure, got {other:?}"),
    }
    assert_eq!(report.stats.found, 2);
}

#[tokio::test]
async fn test_missing_table_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let mut portal = full_portal();
    portal.pages.insert(
        url("/filing/leave"),
        Behaviour::Html("<html><body><p>No filings yet</p></body></html>".into()),
    );
    let browser = FakeBrowser::new(portal);
    let cfg = config(dir.path()).build().unwrap();

    let report = run(&cfg, &browser).await.unwrap();

    let leave = report.outcome("leave").unwrap();
    assert!(matches!(leave.result, ScrapeResult::NotFound));
    assert!(leave.output_path.is_none());
    assert!(!dir.path().join("leave-data.json").exists());
    assert_eq!(report.stats.not_found, 1);
    // NotFound is not a failure.
    assert!(report.all_succeeded());
}

#[tokio::test]
async fn test_identified_locator_picks_labelled_table() {
    let dir = tempfile::tempdir().unwrap();
    let mut portal = Portal::default();
    let html = format!(
        "{}{}",
        table_page(None, &["Noise"], &[&["ignore me"]]),
        table_page(Some("leaves"), &["Status"], &[&["Approved"]]),
    );
    portal.pages.insert(url("/filing/leave"), Behaviour::Html(html));
    let browser = FakeBrowser::new(portal);
    let cfg = config(dir.path())
        .targets(vec![FilingTarget::new("leave", "lv").with_table_id("leaves")])
        .selector_strategy(SelectorStrategy::IdentifierQualified)
        .build()
        .unwrap();

    let report = run(&cfg, &browser).await.unwrap();

    let records = report.outcome("leave").unwrap().result.records().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["status"], "Approved");
    assert!(!records[0].contains_key("noise"));
}

#[tokio::test]
async fn test_identified_locator_uses_portal_table_ids() {
    let dir = tempfile::tempdir().unwrap();
    let mut portal = Portal::default();
    for (path, id) in [
        ("/attendance", "attendance"),
        ("/filing/overtime", "overtime"),
        ("/filing/officialbusiness", "ob"),
        ("/filing/leave", "leaves"),
    ] {
        portal.pages.insert(
            url(path),
            Behaviour::Html(table_page(Some(id), &["Status"], &[&["Approved"]])),
        );
    }
    let browser = FakeBrowser::new(portal);
    let cfg = config(dir.path())
        .targets(default_filings())
        .selector_strategy(SelectorStrategy::IdentifierQualified)
        .build()
        .unwrap();

    let report = run(&cfg, &browser).await.unwrap();

    assert_eq!(report.stats.found, 4, "{:?}", report.outcomes);
    assert!(dir.path().join("overtime-data.json").is_file());
    assert!(dir.path().join("leave-data.json").is_file());
}

#[tokio::test]
async fn test_identified_table_absent_after_wait_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    // A bare table is present, but not the one the id lookup wants.
    let browser = FakeBrowser::new(full_portal());
    let cfg = config(dir.path())
        .targets(vec![FilingTarget::new("leave", "lv").with_table_id("leaves")])
        .selector_strategy(SelectorStrategy::IdentifierQualified)
        .build()
        .unwrap();

    let report = run(&cfg, &browser).await.unwrap();

    let leave = report.outcome("leave").unwrap();
    assert!(matches!(leave.result, ScrapeResult::NotFound), "{:?}", leave.result);
    assert_eq!(report.stats.failed, 0);
}

#[tokio::test]
async fn test_browser_request_timeout_is_navigation_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let mut portal = full_portal();
    portal
        .pages
        .insert(url("/filing/overtime"), Behaviour::NavigationRequestTimeout);
    let browser = FakeBrowser::new(portal);
    let cfg = config(dir.path()).build().unwrap();

    let report = run(&cfg, &browser).await.unwrap();

    match &report.outcome("overtime").unwrap().result {
        ScrapeResult::Failed(e @ TargetError::NavigationTimeout { .. }) => {
            assert!(e.is_timeout())
        }
        other => panic!("expected navigation timeout, got {other:?}"),
    }
    assert_eq!(report.stats.found, 3);
}

#[tokio::test]
async fn test_parallel_run_with_zero_max_tabs_completes() {
    let dir = tempfile::tempdir().unwrap();
    let browser = FakeBrowser::new(full_portal());
    let mut cfg = config(dir.path())
        .concurrency(Concurrency::Parallel)
        .build()
        .unwrap();
    // Fields are public, so the builder's clamp can be bypassed.
    cfg.max_tabs = 0;

    let report = tokio::time::timeout(Duration::from_secs(5), run(&cfg, &browser))
        .await
        .expect("parallel run stalled")
        .unwrap();

    assert_eq!(report.stats.found, 4);
    assert!(browser.tracker.peak_open.load(Ordering::SeqCst) <= 1);
}

#[tokio::test]
async fn test_persistence_failure_is_isolated() {
    let dir = tempfile::tempdir().unwrap();
    // A directory squatting on the output path makes the rename fail.
    std::fs::create_dir_all(dir.path().join("leave-data.json")).unwrap();
    let browser = FakeBrowser::new(full_portal());
    let cfg = config(dir.path()).build().unwrap();

    let report = run(&cfg, &browser).await.unwrap();

    assert!(matches!(
        report.outcome("leave").unwrap().result,
        ScrapeResult::Failed(TargetError::PersistenceFailed { .. })
    ));
    assert_eq!(report.stats.found, 3);
    assert!(dir.path().join("overtime-data.json").is_file());
    assert!(!dir.path().join("leave-data.json.tmp").exists());
}

// ── Authentication ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_rejected_login_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut portal = full_portal();
    portal.reject_login = true;
    let browser = FakeBrowser::new(portal);
    let cfg = config(dir.path()).build().unwrap();

    let err = run(&cfg, &browser).await.unwrap_err();

    assert!(matches!(err, ScrapeError::AuthenticationFailed { .. }));
    // Login tab released, no target visited.
    assert_eq!(browser.tracker.closed.load(Ordering::SeqCst), 1);
    assert_eq!(browser.tracker.visited.lock().unwrap().len(), 1);
    assert!(!dir.path().join("leave-data.json").exists());
}

#[tokio::test]
async fn test_login_timeout_saves_screenshot() {
    let dir = tempfile::tempdir().unwrap();
    let mut portal = full_portal();
    portal.hang_login = true;
    let browser = FakeBrowser::new(portal);
    let cfg = config(dir.path()).build().unwrap();

    let err = run(&cfg, &browser).await.unwrap_err();

    assert!(err.to_string().contains("did not load"), "got: {err}");
    let shot = std::fs::read(dir.path().join(TIMEOUT_SCREENSHOT)).unwrap();
    assert!(shot.starts_with(b"\x89PNG"));
}

#[tokio::test]
async fn test_login_request_timeout_saves_screenshot() {
    let dir = tempfile::tempdir().unwrap();
    let mut portal = full_portal();
    portal.login_request_timeout = true;
    let browser = FakeBrowser::new(portal);
    let cfg = config(dir.path()).build().unwrap();

    let err = run(&cfg, &browser).await.unwrap_err();

    assert!(matches!(err, ScrapeError::AuthenticationFailed { .. }));
    assert!(err.to_string().contains("did not load"), "got: {err}");
    assert!(dir.path().join(TIMEOUT_SCREENSHOT).is_file());
}

#[tokio::test]
async fn test_login_timeout_without_screenshot() {
    let dir = tempfile::tempdir().unwrap();
    let mut portal = full_portal();
    portal.hang_login = true;
    let browser = FakeBrowser::new(portal);
    let cfg = config(dir.path())
        .screenshot_on_timeout(false)
        .build()
        .unwrap();

    tokio_test::assert_err!(run(&cfg, &browser).await);
    assert!(!dir.path().join(TIMEOUT_SCREENSHOT).exists());
}

#[tokio::test]
async fn test_output_dir_is_created() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("exports/2024");
    let browser = FakeBrowser::new(full_portal());
    let cfg = config(&nested).build().unwrap();

    let report = tokio_test::assert_ok!(run(&cfg, &browser).await);
    assert_eq!(report.stats.found, 4);
    assert!(nested.join("attendance-data.json").is_file());
}

// ── Progress ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl ScrapeProgressCallback for Recorder {
    fn on_run_start(&self, total: usize) {
        self.events.lock().unwrap().push(format!("start:{total}"));
    }
    fn on_target_complete(&self, key: &str, records: usize) {
        self.events.lock().unwrap().push(format!("ok:{key}:{records}"));
    }
    fn on_target_not_found(&self, key: &str) {
        self.events.lock().unwrap().push(format!("none:{key}"));
    }
    fn on_target_error(&self, key: &str, _error: &str) {
        self.events.lock().unwrap().push(format!("err:{key}"));
    }
    fn on_run_complete(&self, total: usize, found: usize) {
        self.events.lock().unwrap().push(format!("done:{total}:{found}"));
    }
}

#[tokio::test]
async fn test_progress_events_in_parallel_mode() {
    let dir = tempfile::tempdir().unwrap();
    let mut portal = full_portal();
    portal
        .pages
        .insert(url("/filing/overtime"), Behaviour::HangNavigation);
    let browser = FakeBrowser::new(portal);
    let recorder = Arc::new(Recorder::default());
    let cfg = config(dir.path())
        .concurrency(Concurrency::Parallel)
        .progress_callback(recorder.clone() as Arc<dyn ScrapeProgressCallback>)
        .build()
        .unwrap();

    run(&cfg, &browser).await.unwrap();

    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(events.first().map(String::as_str), Some("start:4"));
    assert_eq!(events.last().map(String::as_str), Some("done:4:3"));
    assert!(events.contains(&"err:overtime".to_string()));
    assert!(events.contains(&"ok:leave:2".to_string()));
    assert!(events.contains(&"ok:officialbusiness:0".to_string()));
}

#[test]
fn test_fake_browser_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<FakeBrowser>();
    assert_send_sync::<tams_scrape::NoopProgressCallback>();
}
