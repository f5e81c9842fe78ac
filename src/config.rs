//! Configuration types for a portal scrape run.
//!
//! All run behaviour is controlled through [`ScrapeConfig`], built via its
//! [`ScrapeConfigBuilder`] or loaded from the environment with
//! [`ScrapeConfig::from_env`]. One struct holds every knob the old
//! per-variant scripts hard-coded: selector strategy, sequential vs. tabbed
//! fetching, and the navigation/selector timeouts.

use crate::error::ScrapeError;
use crate::pipeline::table::TableLocator;
use crate::progress::ProgressCallback;
use crate::target::{default_filings, FilingTarget};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable holding the portal base URL.
pub const ENV_BASE_URL: &str = "TAMS_BASE_URL";
/// Environment variable holding the origin granted geolocation permission.
pub const ENV_PERMISSION_ORIGIN: &str = "HCC_BASE_URL";
/// Environment variable holding the login user name.
pub const ENV_USERNAME: &str = "ZEE_USERNAME";
/// Environment variable holding the login password.
pub const ENV_PASSWORD: &str = "ZEE_PASSWORD";

/// Configuration for a scrape run.
///
/// # Example
/// ```rust
/// use tams_scrape::{Concurrency, ScrapeConfig};
///
/// let config = ScrapeConfig::builder()
///     .base_url("https://tams.example.com")
///     .credentials("jdoe", "secret")
///     .concurrency(Concurrency::Parallel)
///     .max_tabs(3)
///     .build()
///     .unwrap();
/// assert_eq!(config.targets.len(), 4);
/// ```
#[derive(Clone)]
pub struct ScrapeConfig {
    /// Portal base URL, e.g. `https://tams.example.com`.
    pub base_url: String,

    /// Origin granted the geolocation permission before login. Optional; the
    /// portal's clock-in widget refuses to render without it on some accounts.
    pub permission_origin: Option<String>,

    pub credentials: Credentials,

    /// Tables to fetch. Default: [`default_filings`].
    pub targets: Vec<FilingTarget>,

    /// How each target's table is located on its page. Default: `Generic`.
    pub selector_strategy: SelectorStrategy,

    /// Sequential on one tab, or one tab per target. Default: `Sequential`.
    pub concurrency: Concurrency,

    /// Upper bound on tabs open at once in parallel mode. Default: 4.
    pub max_tabs: usize,

    pub timeouts: Timeouts,

    /// Directory receiving one JSON file per found table. Default: `results`.
    pub output_dir: PathBuf,

    /// Output file naming. Default: `Fixed`.
    pub output_naming: OutputNaming,

    /// Save a full-page screenshot to the output directory when the login
    /// page times out. Default: true.
    pub screenshot_on_timeout: bool,

    /// Browser-side emulation applied to every tab.
    pub emulation: PageEmulation,

    /// Run Chromium without a window. Default: true.
    pub headless: bool,

    /// Per-target progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            permission_origin: None,
            credentials: Credentials::default(),
            targets: default_filings(),
            selector_strategy: SelectorStrategy::default(),
            concurrency: Concurrency::default(),
            max_tabs: 4,
            timeouts: Timeouts::default(),
            output_dir: PathBuf::from("results"),
            output_naming: OutputNaming::default(),
            screenshot_on_timeout: true,
            emulation: PageEmulation::default(),
            headless: true,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ScrapeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScrapeConfig")
            .field("base_url", &self.base_url)
            .field("permission_origin", &self.permission_origin)
            .field("credentials", &self.credentials)
            .field("targets", &self.targets)
            .field("selector_strategy", &self.selector_strategy)
            .field("concurrency", &self.concurrency)
            .field("max_tabs", &self.max_tabs)
            .field("timeouts", &self.timeouts)
            .field("output_dir", &self.output_dir)
            .field("output_naming", &self.output_naming)
            .field("headless", &self.headless)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ScrapeProgressCallback>"),
            )
            .finish()
    }
}

impl ScrapeConfig {
    /// Create a new builder for `ScrapeConfig`.
    pub fn builder() -> ScrapeConfigBuilder {
        ScrapeConfigBuilder {
            config: Self::default(),
        }
    }

    /// Start a builder pre-filled from `TAMS_BASE_URL`, `ZEE_USERNAME`,
    /// `ZEE_PASSWORD` and (optionally) `HCC_BASE_URL`.
    pub fn builder_from_env() -> Result<ScrapeConfigBuilder, ScrapeError> {
        let mut builder = Self::builder()
            .base_url(require_env(ENV_BASE_URL)?)
            .credentials(require_env(ENV_USERNAME)?, require_env(ENV_PASSWORD)?);
        if let Some(origin) = optional_env(ENV_PERMISSION_ORIGIN) {
            builder = builder.permission_origin(origin);
        }
        Ok(builder)
    }

    /// Build a validated config from the environment with all other knobs
    /// at their defaults.
    pub fn from_env() -> Result<Self, ScrapeError> {
        Self::builder_from_env()?.build()
    }

    /// The table locator for `target` under the configured strategy.
    pub fn locator_for(&self, target: &FilingTarget) -> TableLocator {
        match self.selector_strategy {
            SelectorStrategy::Generic => TableLocator::Generic,
            SelectorStrategy::IdentifierQualified => {
                TableLocator::Identified(target.table_id.clone())
            }
        }
    }

    /// URL of the login page.
    pub fn login_url(&self) -> String {
        format!("{}/Auth", self.base_url.trim_end_matches('/'))
    }
}

fn require_env(var: &'static str) -> Result<String, ScrapeError> {
    optional_env(var).ok_or(ScrapeError::MissingEnv { var })
}

fn optional_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

/// Builder for [`ScrapeConfig`].
#[derive(Debug)]
pub struct ScrapeConfigBuilder {
    config: ScrapeConfig,
}

impl ScrapeConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn permission_origin(mut self, origin: impl Into<String>) -> Self {
        self.config.permission_origin = Some(origin.into());
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.credentials = Credentials {
            username: username.into(),
            password: password.into(),
        };
        self
    }

    pub fn targets(mut self, targets: Vec<FilingTarget>) -> Self {
        self.config.targets = targets;
        self
    }

    pub fn selector_strategy(mut self, strategy: SelectorStrategy) -> Self {
        self.config.selector_strategy = strategy;
        self
    }

    pub fn concurrency(mut self, mode: Concurrency) -> Self {
        self.config.concurrency = mode;
        self
    }

    /// Parallel tab cap. Zero is treated as one.
    pub fn max_tabs(mut self, n: usize) -> Self {
        self.config.max_tabs = n.max(1);
        self
    }

    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.config.timeouts = timeouts;
        self
    }

    pub fn navigation_timeout(mut self, d: Duration) -> Self {
        self.config.timeouts.navigation = d;
        self
    }

    pub fn selector_timeout(mut self, d: Duration) -> Self {
        self.config.timeouts.selector_wait = d;
        self
    }

    pub fn login_timeout(mut self, d: Duration) -> Self {
        self.config.timeouts.login = d;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn output_naming(mut self, naming: OutputNaming) -> Self {
        self.config.output_naming = naming;
        self
    }

    pub fn screenshot_on_timeout(mut self, v: bool) -> Self {
        self.config.screenshot_on_timeout = v;
        self
    }

    pub fn emulation(mut self, emulation: PageEmulation) -> Self {
        self.config.emulation = emulation;
        self
    }

    pub fn headless(mut self, v: bool) -> Self {
        self.config.headless = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ScrapeConfig, ScrapeError> {
        let c = &self.config;
        if !is_http_url(&c.base_url) {
            return Err(ScrapeError::InvalidConfig(format!(
                "base URL must start with http:// or https://, got '{}'",
                c.base_url
            )));
        }
        if let Some(ref origin) = c.permission_origin {
            if !is_http_url(origin) {
                return Err(ScrapeError::InvalidConfig(format!(
                    "permission origin must be an http(s) URL, got '{origin}'"
                )));
            }
        }
        if c.credentials.username.is_empty() || c.credentials.password.is_empty() {
            return Err(ScrapeError::InvalidConfig(
                "username and password must both be set".into(),
            ));
        }
        if c.targets.is_empty() {
            return Err(ScrapeError::InvalidConfig("no filing targets configured".into()));
        }
        for t in &c.targets {
            if !is_identifier(&t.key) || !is_identifier(&t.label) || !is_identifier(&t.table_id) {
                return Err(ScrapeError::InvalidConfig(format!(
                    "target key/label/table id must be alphanumeric, '_' or '-', got '{}'/'{}'/'{}'",
                    t.key, t.label, t.table_id
                )));
            }
        }
        let t = &c.timeouts;
        if t.navigation.is_zero() || t.selector_wait.is_zero() || t.login.is_zero() {
            return Err(ScrapeError::InvalidConfig("timeouts must be non-zero".into()));
        }
        Ok(self.config)
    }
}

fn is_http_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

// ── Credentials ──────────────────────────────────────────────────────────

/// Portal login. `Debug` never prints the password.
#[derive(Clone, Default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Table lookup strategy shared by all targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SelectorStrategy {
    /// First `<table>` on the page. (default)
    #[default]
    Generic,
    /// `table#tbl_<table_id>`.
    IdentifierQualified,
}

/// How targets are scheduled after login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Concurrency {
    /// One tab, targets fetched one after another. (default)
    #[default]
    Sequential,
    /// One tab per target, up to `max_tabs` in flight.
    Parallel,
}

/// Time bounds for the three waits a run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeouts {
    /// Page navigation. Default: 30 s.
    pub navigation: Duration,
    /// Table selector presence after navigation. Default: 15 s.
    pub selector_wait: Duration,
    /// Login page load and post-submit navigation. Default: 30 s.
    pub login: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation: Duration::from_secs(30),
            selector_wait: Duration::from_secs(15),
            login: Duration::from_secs(30),
        }
    }
}

/// Output file naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputNaming {
    /// `<key>-data.json`, overwritten on every run. (default)
    #[default]
    Fixed,
    /// `<label>-<YYYYMMDD-HHmmss>.json`, one file per run.
    Timestamped,
}

impl OutputNaming {
    /// File name for `target` under this scheme at local time `now`.
    pub fn file_name(&self, target: &FilingTarget, now: DateTime<Local>) -> String {
        match self {
            OutputNaming::Fixed => format!("{}-data.json", target.key),
            OutputNaming::Timestamped => format!(
                "{}-{}.json",
                target.label,
                now.format("%Y%m%d-%H%M%S")
            ),
        }
    }
}

/// Browser-side emulation the portal expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageEmulation {
    pub user_agent: Option<String>,
    /// IANA zone id, e.g. `Asia/Manila`.
    pub timezone: Option<String>,
    pub geolocation: Option<Geolocation>,
}

impl Default for PageEmulation {
    fn default() -> Self {
        Self {
            user_agent: Some(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/74.0.3729.169 Safari/537.36"
                    .to_string(),
            ),
            timezone: Some("Asia/Manila".to_string()),
            geolocation: Some(Geolocation {
                latitude: 14.5995,
                longitude: 120.9842,
                accuracy: 100.0,
            }),
        }
    }
}

impl PageEmulation {
    /// No overrides at all.
    pub fn none() -> Self {
        Self {
            user_agent: None,
            timezone: None,
            geolocation: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geolocation {
    pub latitude: f64,
    pub longitude: f64,
    /// Metres.
    pub accuracy: f64,
}
