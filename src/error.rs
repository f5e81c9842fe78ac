//! Error types for the tams-scrape library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ScrapeError`] is **fatal**. The run cannot proceed at all (missing
//!   configuration, browser would not start, login rejected). Returned as
//!   `Err(ScrapeError)` from [`crate::session::scrape`] and
//!   [`crate::session::run`].
//!
//! * [`TargetError`] is **non-fatal**. A single filing table could not be
//!   fetched or written, but every other target is unaffected. Stored inside
//!   [`crate::output::ScrapeResult::Failed`] so callers see partial success
//!   instead of losing the whole run to one slow page.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the tams-scrape library.
///
/// Per-target failures use [`TargetError`] and are reported in
/// [`crate::output::TargetOutcome`] rather than propagated here.
#[derive(Debug, Error)]
pub enum ScrapeError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// A required environment variable is unset or empty.
    #[error("Environment variable {var} is not set.\nAdd it to your shell or pass the matching flag.")]
    MissingEnv { var: &'static str },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Browser errors ────────────────────────────────────────────────────
    /// The Chromium process could not be launched or connected to.
    #[error("Failed to launch browser: {0}\nIs Chrome or Chromium installed and on PATH?")]
    BrowserLaunch(String),

    /// A browser-level command (new tab, permission grant) failed.
    #[error("Browser error: {0}")]
    Browser(String),

    // ── Session errors ────────────────────────────────────────────────────
    /// Credentials were submitted but the portal never reached the
    /// logged-in state.
    #[error("Authentication failed at '{url}': {reason}")]
    AuthenticationFailed { url: String, reason: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// The output directory could not be created.
    #[error("Failed to create output directory '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single filing target.
///
/// Stored in [`crate::output::ScrapeResult::Failed`]. The run continues with
/// the remaining targets.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum TargetError {
    /// The page did not finish loading within the navigation bound.
    #[error("{target}: navigation to '{url}' timed out after {secs}s")]
    NavigationTimeout {
        target: String,
        url: String,
        secs: u64,
    },

    /// The table selector never appeared within the wait bound.
    #[error("{target}: selector '{selector}' not present after {secs}s")]
    SelectorTimeout {
        target: String,
        selector: String,
        secs: u64,
    },

    /// Navigation failed outright (DNS, connection reset, closed tab).
    #[error("{target}: navigation to '{url}' failed: {detail}")]
    Navigation {
        target: String,
        url: String,
        detail: String,
    },

    /// The page loaded but its content could not be read.
    #[error("{target}: could not read page content: {detail}")]
    Extraction { target: String, detail: String },

    /// Records were extracted but the JSON artifact could not be written.
    #[error("{target}: failed to write '{path}': {detail}")]
    PersistenceFailed {
        target: String,
        path: PathBuf,
        detail: String,
    },
}

impl TargetError {
    /// Key of the target this error belongs to.
    pub fn target(&self) -> &str {
        match self {
            TargetError::NavigationTimeout { target, .. }
            | TargetError::SelectorTimeout { target, .. }
            | TargetError::Navigation { target, .. }
            | TargetError::Extraction { target, .. }
            | TargetError::PersistenceFailed { target, .. } => target,
        }
    }

    /// True for the two timeout variants.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            TargetError::NavigationTimeout { .. } | TargetError::SelectorTimeout { .. }
        )
    }
}

/// Failure of a single browser command, as reported by a
/// [`crate::browser::PortalPage`] or [`crate::browser::PortalBrowser`].
///
/// The session maps these onto [`TargetError`] or [`ScrapeError`] depending
/// on which phase issued the command.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BrowserError {
    /// The command did not complete within its bound.
    #[error("timed out after {}s", .0.as_secs())]
    Timeout(std::time::Duration),

    /// No element matched the selector.
    #[error("no element matches '{0}'")]
    NoSuchElement(String),

    /// Protocol or transport failure.
    #[error("{0}")]
    Command(String),
}
