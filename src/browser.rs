//! Browser seam: the narrow set of page operations the session needs, and a
//! Chromium implementation over the DevTools protocol.
//!
//! The session orchestrator only ever talks to [`PortalBrowser`] and
//! [`PortalPage`], so tests drive it with in-memory fakes and production
//! drives it with [`ChromeBrowser`].

use crate::config::{PageEmulation, ScrapeConfig};
use crate::error::{BrowserError, ScrapeError};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::error::CdpError;
use chromiumoxide::cdp::browser_protocol::browser::{GrantPermissionsParams, PermissionType};
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetGeolocationOverrideParams, SetTimezoneOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// How often [`PortalPage::wait_for_selector`] re-queries the DOM.
const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A launched browser that can open tabs sharing one cookie jar.
#[async_trait]
pub trait PortalBrowser: Send + Sync {
    /// Open a fresh tab. Every tab shares the browser's session cookies.
    async fn new_page(&self) -> Result<Box<dyn PortalPage>, BrowserError>;

    /// Grant the geolocation permission to `origin`.
    async fn grant_geolocation(&self, origin: &str) -> Result<(), BrowserError>;

    /// Shut the browser down. Safe to call more than once.
    async fn close(&self) -> Result<(), BrowserError>;
}

/// One browser tab.
#[async_trait]
pub trait PortalPage: Send + Sync {
    /// Navigate and wait for the load event.
    async fn goto(&self, url: &str) -> Result<(), BrowserError>;

    /// Resolve once `selector` matches, or fail with
    /// [`BrowserError::Timeout`] after `timeout`.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration)
        -> Result<(), BrowserError>;

    /// Whether `selector` currently matches anything. An `Err` means the
    /// document could not be queried at all.
    async fn has_element(&self, selector: &str) -> Result<bool, BrowserError>;

    /// Focus the first match of `selector` and type `text` into it.
    async fn type_text(&self, selector: &str, text: &str) -> Result<(), BrowserError>;

    /// Click the first match of `selector`.
    async fn click(&self, selector: &str) -> Result<(), BrowserError>;

    /// Wait for the navigation triggered by the last action to finish.
    async fn wait_for_navigation(&self) -> Result<(), BrowserError>;

    /// Serialised DOM of the current document.
    async fn content(&self) -> Result<String, BrowserError>;

    /// Full-page PNG.
    async fn screenshot(&self) -> Result<Vec<u8>, BrowserError>;

    async fn close(self: Box<Self>) -> Result<(), BrowserError>;
}

// ── Chromium ─────────────────────────────────────────────────────────────

/// [`PortalBrowser`] backed by a local Chromium over CDP.
pub struct ChromeBrowser {
    browser: Mutex<Option<Browser>>,
    handler: Mutex<Option<JoinHandle<()>>>,
    emulation: PageEmulation,
    /// Bound chromiumoxide applies to every CDP request.
    request_timeout: Duration,
}

impl ChromeBrowser {
    /// Launch Chromium with the flags the portal needs in containers.
    pub async fn launch(config: &ScrapeConfig) -> Result<Self, ScrapeError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-dev-shm-usage")
            .request_timeout(config.timeouts.navigation);
        if !config.headless {
            builder = builder.with_head();
        }
        let browser_config = builder.build().map_err(ScrapeError::BrowserLaunch)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ScrapeError::BrowserLaunch(e.to_string()))?;

        // The CDP event loop must be polled for any command to complete.
        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler event error: {}", e);
                }
            }
        });

        debug!("Chromium launched (headless: {})", config.headless);
        Ok(Self {
            browser: Mutex::new(Some(browser)),
            handler: Mutex::new(Some(handle)),
            emulation: config.emulation.clone(),
            request_timeout: config.timeouts.navigation,
        })
    }

    fn cdp(&self) -> impl Fn(CdpError) -> BrowserError {
        cdp_error(self.request_timeout)
    }

    async fn apply_emulation(&self, page: &Page) -> Result<(), BrowserError> {
        if let Some(ref ua) = self.emulation.user_agent {
            page.set_user_agent(SetUserAgentOverrideParams::new(ua.clone()))
                .await
                .map_err(self.cdp())?;
        }
        if let Some(ref tz) = self.emulation.timezone {
            page.execute(SetTimezoneOverrideParams::new(tz.clone()))
                .await
                .map_err(self.cdp())?;
        }
        if let Some(geo) = self.emulation.geolocation {
            let params = SetGeolocationOverrideParams::builder()
                .latitude(geo.latitude)
                .longitude(geo.longitude)
                .accuracy(geo.accuracy)
                .build();
            page.execute(params).await.map_err(self.cdp())?;
        }
        Ok(())
    }
}

#[async_trait]
impl PortalBrowser for ChromeBrowser {
    async fn new_page(&self) -> Result<Box<dyn PortalPage>, BrowserError> {
        let page = {
            let guard = self.browser.lock().await;
            let browser = guard
                .as_ref()
                .ok_or_else(|| BrowserError::Command("browser already closed".into()))?;
            browser.new_page("about:blank").await.map_err(self.cdp())?
        };
        self.apply_emulation(&page).await?;
        Ok(Box::new(ChromePage {
            page,
            request_timeout: self.request_timeout,
        }))
    }

    async fn grant_geolocation(&self, origin: &str) -> Result<(), BrowserError> {
        let guard = self.browser.lock().await;
        let browser = guard
            .as_ref()
            .ok_or_else(|| BrowserError::Command("browser already closed".into()))?;
        let mut params = GrantPermissionsParams::new(vec![PermissionType::Geolocation]);
        params.origin = Some(origin.to_string());
        browser.execute(params).await.map_err(self.cdp())?;
        Ok(())
    }

    async fn close(&self) -> Result<(), BrowserError> {
        let Some(mut browser) = self.browser.lock().await.take() else {
            return Ok(());
        };
        let closed = browser.close().await.map(|_| ()).map_err(self.cdp());
        if let Err(e) = browser.wait().await {
            warn!("Chromium did not exit cleanly: {}", e);
        }
        if let Some(handle) = self.handler.lock().await.take() {
            handle.abort();
        }
        closed
    }
}

/// [`PortalPage`] over a chromiumoxide tab.
pub struct ChromePage {
    page: Page,
    request_timeout: Duration,
}

impl ChromePage {
    fn cdp(&self) -> impl Fn(CdpError) -> BrowserError {
        cdp_error(self.request_timeout)
    }
}

#[async_trait]
impl PortalPage for ChromePage {
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        self.page.goto(url).await.map_err(self.cdp())?;
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        let poll = async {
            loop {
                if self.page.find_element(selector).await.is_ok() {
                    return;
                }
                tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
            }
        };
        tokio::time::timeout(timeout, poll)
            .await
            .map_err(|_| BrowserError::Timeout(timeout))
    }

    async fn has_element(&self, selector: &str) -> Result<bool, BrowserError> {
        let literal = serde_json::to_string(selector)
            .map_err(|e| BrowserError::Command(e.to_string()))?;
        self.page
            .evaluate(format!("document.querySelector({literal}) !== null"))
            .await
            .map_err(self.cdp())?
            .into_value::<bool>()
            .map_err(|e| BrowserError::Command(format!("querySelector result: {e}")))
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<(), BrowserError> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::NoSuchElement(selector.to_string()))?;
        element.click().await.map_err(self.cdp())?;
        element.type_str(text).await.map_err(self.cdp())?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::NoSuchElement(selector.to_string()))?;
        element.click().await.map_err(self.cdp())?;
        Ok(())
    }

    async fn wait_for_navigation(&self) -> Result<(), BrowserError> {
        self.page.wait_for_navigation().await.map_err(self.cdp())?;
        Ok(())
    }

    async fn content(&self) -> Result<String, BrowserError> {
        self.page.content().await.map_err(self.cdp())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, BrowserError> {
        self.page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
            .map_err(self.cdp())
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        let request_timeout = self.request_timeout;
        self.page.close().await.map_err(cdp_error(request_timeout))
    }
}

/// chromiumoxide's own request timeout is a timeout like any other, so it
/// keeps its [`BrowserError::Timeout`] identity.
fn cdp_error(request_timeout: Duration) -> impl Fn(CdpError) -> BrowserError {
    move |e| match e {
        CdpError::Timeout => BrowserError::Timeout(request_timeout),
        other => BrowserError::Command(other.to_string()),
    }
}
