//! Session orchestration: log in once, then fetch every filing table.
//!
//! ```text
//! Unauthenticated ─▶ Authenticating ─▶ Authenticated ─▶ Closed
//!                                          │
//!                           per target: Navigating ─▶ Waiting ─▶ Extracting ─▶ Done | Failed
//! ```
//!
//! Authentication failure is fatal. Everything after it is isolated per
//! target: a timeout or write error on one table becomes a
//! [`ScrapeResult::Failed`] in the report and the others carry on.

use crate::browser::{ChromeBrowser, PortalBrowser, PortalPage};
use crate::config::{Concurrency, ScrapeConfig};
use crate::error::{BrowserError, ScrapeError, TargetError};
use crate::output::{RunReport, RunStats, ScrapeResult, TargetOutcome};
use crate::pipeline::persist;
use crate::pipeline::table::{self, Extraction};
use crate::target::FilingTarget;
use chrono::Local;
use futures::stream::{self, StreamExt};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Login form selectors.
pub const USERNAME_SELECTOR: &str = r#"input[name="username"]"#;
pub const PASSWORD_SELECTOR: &str = r#"input[name="password"]"#;
pub const SUBMIT_SELECTOR: &str = r#"button[type="submit"]"#;
/// Present only once the portal has accepted the credentials.
pub const LOGGED_IN_MARKER: &str = r#"input[name="employee_id"]"#;
/// Saved into the output directory when the login page times out.
pub const TIMEOUT_SCREENSHOT: &str = "timeout-screenshot.png";

/// Lifecycle of the shared browser session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticating,
    Authenticated,
    Closed,
}

/// Lifecycle of one target fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPhase {
    Navigating,
    Waiting,
    Extracting,
    Done,
    Failed,
}

struct Session {
    state: SessionState,
}

impl Session {
    fn new() -> Self {
        Self {
            state: SessionState::Unauthenticated,
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug!("Session {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

/// Launch Chromium, run every configured target, and close the browser.
///
/// The browser is closed whether or not the run succeeds.
///
/// # Errors
/// Fatal conditions only: browser launch, output directory, authentication.
/// Per-target failures are inside the returned [`RunReport`].
pub async fn scrape(config: &ScrapeConfig) -> Result<RunReport, ScrapeError> {
    let browser = ChromeBrowser::launch(config).await?;
    let result = run(config, &browser).await;
    if let Err(e) = browser.close().await {
        warn!("Failed to close browser: {}", e);
    }
    result
}

/// Run a full session against an already-launched browser.
///
/// Does not close `browser`; the caller owns it.
pub async fn run(
    config: &ScrapeConfig,
    browser: &dyn PortalBrowser,
) -> Result<RunReport, ScrapeError> {
    let run_start = Instant::now();
    let mut session = Session::new();

    // ── Setup ────────────────────────────────────────────────────────────
    persist::ensure_output_dir(&config.output_dir).await?;

    if let Some(ref origin) = config.permission_origin {
        browser
            .grant_geolocation(origin)
            .await
            .map_err(|e| ScrapeError::Browser(format!("geolocation grant for {origin}: {e}")))?;
    }

    // ── Authenticate ─────────────────────────────────────────────────────
    let login_page = browser
        .new_page()
        .await
        .map_err(|e| ScrapeError::Browser(format!("failed to open login tab: {e}")))?;

    session.transition(SessionState::Authenticating);
    if let Err(e) = authenticate(config, login_page.as_ref()).await {
        error!("{}", e);
        close_page(login_page).await;
        session.transition(SessionState::Closed);
        return Err(e);
    }
    session.transition(SessionState::Authenticated);
    info!("Logged in as {}", config.credentials.username);

    // ── Fetch ────────────────────────────────────────────────────────────
    let total = config.targets.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(total);
    }

    let outcomes = match config.concurrency {
        Concurrency::Sequential => {
            let outcomes = fetch_sequential(config, login_page.as_ref()).await;
            close_page(login_page).await;
            outcomes
        }
        Concurrency::Parallel => {
            // Cookies live on the browser, so the login tab is not needed.
            close_page(login_page).await;
            fetch_parallel(config, browser).await
        }
    };
    session.transition(SessionState::Closed);

    // ── Report ───────────────────────────────────────────────────────────
    let mut stats = RunStats::from_outcomes(&outcomes);
    stats.duration_ms = run_start.elapsed().as_millis() as u64;

    info!(
        "Run complete: {}/{} found, {} not found, {} failed, {} records, {}ms",
        stats.found,
        stats.total_targets,
        stats.not_found,
        stats.failed,
        stats.records_written,
        stats.duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(total, stats.found);
    }

    Ok(RunReport { outcomes, stats })
}

/// Submit the login form on `page` and confirm the logged-in marker.
pub async fn authenticate(config: &ScrapeConfig, page: &dyn PortalPage) -> Result<(), ScrapeError> {
    let url = config.login_url();
    let login_timeout = config.timeouts.login;
    let fail = |reason: String| ScrapeError::AuthenticationFailed {
        url: url.clone(),
        reason,
    };

    debug!("Opening login page {}", url);
    match tokio::time::timeout(login_timeout, page.goto(&url)).await {
        Ok(Ok(())) => {}
        Ok(Err(BrowserError::Timeout(_))) | Err(_) => {
            if config.screenshot_on_timeout {
                save_timeout_screenshot(config, page).await;
            }
            return Err(fail(format!(
                "login page did not load within {}s",
                login_timeout.as_secs()
            )));
        }
        Ok(Err(e)) => return Err(fail(format!("login page failed to load: {e}"))),
    }

    page.type_text(USERNAME_SELECTOR, &config.credentials.username)
        .await
        .map_err(|e| fail(format!("username field: {e}")))?;
    page.type_text(PASSWORD_SELECTOR, &config.credentials.password)
        .await
        .map_err(|e| fail(format!("password field: {e}")))?;
    page.click(SUBMIT_SELECTOR)
        .await
        .map_err(|e| fail(format!("submit button: {e}")))?;

    match tokio::time::timeout(login_timeout, page.wait_for_navigation()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(fail(format!("post-login navigation: {e}"))),
        Err(_) => {
            return Err(fail(format!(
                "post-login navigation did not finish within {}s",
                login_timeout.as_secs()
            )))
        }
    }

    let logged_in = page
        .has_element(LOGGED_IN_MARKER)
        .await
        .map_err(|e| fail(format!("checking login marker: {e}")))?;
    if !logged_in {
        return Err(fail("post-login marker missing; credentials rejected?".into()));
    }
    Ok(())
}

async fn save_timeout_screenshot(config: &ScrapeConfig, page: &dyn PortalPage) {
    let path = config.output_dir.join(TIMEOUT_SCREENSHOT);
    match page.screenshot().await {
        Ok(png) => match persist::write_bytes(&path, &png).await {
            Ok(()) => info!("Saved login timeout screenshot to {}", path.display()),
            Err(e) => warn!("Could not write {}: {}", path.display(), e),
        },
        Err(e) => warn!("Could not capture login timeout screenshot: {}", e),
    }
}

/// One tab, one target at a time.
async fn fetch_sequential(config: &ScrapeConfig, page: &dyn PortalPage) -> Vec<TargetOutcome> {
    let mut outcomes = Vec::with_capacity(config.targets.len());
    for target in &config.targets {
        outcomes.push(fetch_target(config, page, target).await);
    }
    outcomes
}

/// One tab per target, at most `max_tabs` open at once.
async fn fetch_parallel(config: &ScrapeConfig, browser: &dyn PortalBrowser) -> Vec<TargetOutcome> {
    // `buffer_unordered(0)` never polls anything.
    let max_tabs = config.max_tabs.max(1);
    let mut outcomes: Vec<TargetOutcome> = stream::iter(config.targets.iter().map(|target| async move {
        match browser.new_page().await {
            Ok(page) => {
                let outcome = fetch_target(config, page.as_ref(), target).await;
                close_page(page).await;
                outcome
            }
            Err(e) => {
                let err = TargetError::Navigation {
                    target: target.key.clone(),
                    url: target.url(&config.base_url),
                    detail: format!("could not open tab: {e}"),
                };
                report_failure(config, target, &err);
                TargetOutcome {
                    target: target.clone(),
                    result: ScrapeResult::Failed(err),
                    output_path: None,
                    unparsed_cells: 0,
                    duration_ms: 0,
                }
            }
        }
    }))
    .buffer_unordered(max_tabs)
    .collect()
    .await;

    // Report in configured order regardless of completion order.
    outcomes.sort_by_key(|o| {
        config
            .targets
            .iter()
            .position(|t| t.key == o.target.key)
            .unwrap_or(usize::MAX)
    });
    outcomes
}

/// Fetch, extract and persist one target on `page`.
///
/// Never fails: every error is folded into the returned outcome.
pub async fn fetch_target(
    config: &ScrapeConfig,
    page: &dyn PortalPage,
    target: &FilingTarget,
) -> TargetOutcome {
    let started = Instant::now();
    if let Some(ref cb) = config.progress_callback {
        cb.on_target_start(&target.key);
    }

    let mut outcome = TargetOutcome {
        target: target.clone(),
        result: ScrapeResult::NotFound,
        output_path: None,
        unparsed_cells: 0,
        duration_ms: 0,
    };

    match load_table(config, page, target).await {
        Ok(Some(extraction)) => {
            outcome.unparsed_cells = extraction.unparsed_cells;
            let file_name = config.output_naming.file_name(target, Local::now());
            let path = config.output_dir.join(file_name);
            match persist::write_records(&path, &extraction.records).await {
                Ok(()) => {
                    info!(
                        "{}: {} records -> {}",
                        target.key,
                        extraction.records.len(),
                        path.display()
                    );
                    if let Some(ref cb) = config.progress_callback {
                        cb.on_target_complete(&target.key, extraction.records.len());
                    }
                    outcome.output_path = Some(path);
                    outcome.result = ScrapeResult::Found(extraction.records);
                    debug!("{}: {:?}", target.key, FetchPhase::Done);
                }
                Err(e) => {
                    let err = TargetError::PersistenceFailed {
                        target: target.key.clone(),
                        path,
                        detail: e.to_string(),
                    };
                    report_failure(config, target, &err);
                    outcome.result = ScrapeResult::Failed(err);
                }
            }
        }
        Ok(None) => {
            warn!("{}: no matching table on page", target.key);
            if let Some(ref cb) = config.progress_callback {
                cb.on_target_not_found(&target.key);
            }
            debug!("{}: {:?}", target.key, FetchPhase::Done);
        }
        Err(err) => {
            report_failure(config, target, &err);
            outcome.result = ScrapeResult::Failed(err);
        }
    }

    outcome.duration_ms = started.elapsed().as_millis() as u64;
    outcome
}

async fn load_table(
    config: &ScrapeConfig,
    page: &dyn PortalPage,
    target: &FilingTarget,
) -> Result<Option<Extraction>, TargetError> {
    let url = target.url(&config.base_url);
    let locator = config.locator_for(target);
    let selector = locator.selector();
    let nav_timeout = config.timeouts.navigation;

    debug!("{}: {:?} {}", target.key, FetchPhase::Navigating, url);
    let nav_timed_out = || TargetError::NavigationTimeout {
        target: target.key.clone(),
        url: url.clone(),
        secs: nav_timeout.as_secs(),
    };
    match tokio::time::timeout(nav_timeout, page.goto(&url)).await {
        Ok(Ok(())) => {}
        Ok(Err(BrowserError::Timeout(_))) | Err(_) => return Err(nav_timed_out()),
        Ok(Err(e)) => {
            return Err(TargetError::Navigation {
                target: target.key.clone(),
                url: url.clone(),
                detail: e.to_string(),
            })
        }
    }

    debug!("{}: {:?} for '{}'", target.key, FetchPhase::Waiting, selector);
    match page
        .wait_for_selector(&selector, config.timeouts.selector_wait)
        .await
    {
        Ok(()) => {}
        // The page loaded, so a table that still does not match is absent.
        // Only a document that cannot be queried counts as a timeout.
        Err(BrowserError::Timeout(_)) => match page.has_element(&selector).await {
            Ok(true) => debug!("{}: '{}' matched after the wait", target.key, selector),
            Ok(false) => return Ok(None),
            Err(e) => {
                debug!("{}: presence check failed: {}", target.key, e);
                return Err(TargetError::SelectorTimeout {
                    target: target.key.clone(),
                    selector,
                    secs: config.timeouts.selector_wait.as_secs(),
                });
            }
        },
        Err(e) => {
            return Err(TargetError::Navigation {
                target: target.key.clone(),
                url: url.clone(),
                detail: e.to_string(),
            })
        }
    }

    debug!("{}: {:?}", target.key, FetchPhase::Extracting);
    let html = page.content().await.map_err(|e| TargetError::Extraction {
        target: target.key.clone(),
        detail: e.to_string(),
    })?;
    let extraction = table::extract_table(&html, &locator);
    if let Some(ref ex) = extraction {
        if ex.unparsed_cells > 0 {
            warn!(
                "{}: {} date/duration cells kept their original text",
                target.key, ex.unparsed_cells
            );
        }
    }
    Ok(extraction)
}

fn report_failure(config: &ScrapeConfig, target: &FilingTarget, err: &TargetError) {
    warn!("{}", err);
    debug!("{}: {:?}", target.key, FetchPhase::Failed);
    if let Some(ref cb) = config.progress_callback {
        cb.on_target_error(&target.key, &err.to_string());
    }
}

async fn close_page(page: Box<dyn PortalPage>) {
    if let Err(e) = page.close().await {
        warn!("Failed to close tab: {}", e);
    }
}
