//! # tams-scrape
//!
//! Scrape filing tables (attendance, overtime, official business, leave) out
//! of the TAMS time-and-attendance portal and write each one as a JSON array
//! of records.
//!
//! The portal renders its data client-side behind a login form, so plain HTTP
//! requests see nothing useful. This crate drives a headless Chromium through
//! one authenticated session, waits for each table to render, and turns the
//! rendered HTML into clean records: ASCII-normalised text, canonical
//! timestamps in date columns, 12-hour clock times in duration columns.
//!
//! ## Pipeline Overview
//!
//! ```text
//! login ──▶ for each filing target
//!             │
//!             ├─ 1. Navigate  <base>/attendance or <base>/filing/<key>
//!             ├─ 2. Wait      table selector (bounded)
//!             ├─ 3. Extract   header → schema, rows → records
//!             ├─ 4. Clean     normalise text, parse dates and durations
//!             └─ 5. Persist   <output_dir>/<key>-data.json (atomic)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tams_scrape::{scrape, ScrapeConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // TAMS_BASE_URL, ZEE_USERNAME, ZEE_PASSWORD (+ optional HCC_BASE_URL)
//!     let config = ScrapeConfig::from_env()?;
//!     let report = scrape(&config).await?;
//!     for outcome in &report.outcomes {
//!         eprintln!("{}: {:?}", outcome.target.key, outcome.output_path);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `tams-scrape` binary (clap + indicatif + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! tams-scrape = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod browser;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod session;
pub mod target;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use browser::{ChromeBrowser, PortalBrowser, PortalPage};
pub use config::{
    Concurrency, Credentials, Geolocation, OutputNaming, PageEmulation, ScrapeConfig,
    ScrapeConfigBuilder, SelectorStrategy, Timeouts,
};
pub use error::{BrowserError, ScrapeError, TargetError};
pub use output::{Record, RunReport, RunStats, ScrapeResult, TargetOutcome};
pub use pipeline::normalize::normalize;
pub use pipeline::table::{extract_table, TableLocator};
pub use pipeline::temporal::{format_duration, parse_date, Temporal};
pub use progress::{NoopProgressCallback, ProgressCallback, ScrapeProgressCallback};
pub use session::{run, scrape};
pub use target::{default_filings, FilingTarget};
