//! Progress-callback trait for per-target scrape events.
//!
//! Inject an [`Arc<dyn ScrapeProgressCallback>`] via
//! [`crate::config::ScrapeConfigBuilder::progress_callback`] to receive
//! events as the session fetches each filing table.
//!
//! # Example
//!
//! ```rust
//! use tams_scrape::{ScrapeConfig, ScrapeProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     rows: AtomicUsize,
//! }
//!
//! impl ScrapeProgressCallback for CountingCallback {
//!     fn on_target_complete(&self, key: &str, records: usize) {
//!         self.rows.fetch_add(records, Ordering::SeqCst);
//!         eprintln!("{key}: {records} rows");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { rows: AtomicUsize::new(0) });
//!
//! let config = ScrapeConfig::builder()
//!     .base_url("https://tams.example.com")
//!     .credentials("jdoe", "secret")
//!     .progress_callback(counter as Arc<dyn ScrapeProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the session orchestrator as it works through its targets.
///
/// All methods default to no-ops. In parallel mode the per-target methods
/// may be called concurrently from different tasks, so shared state needs
/// synchronisation (`Mutex`, atomics).
pub trait ScrapeProgressCallback: Send + Sync {
    /// Called once after login succeeds, before the first target.
    fn on_run_start(&self, total_targets: usize) {
        let _ = total_targets;
    }

    /// Called before navigating to a target's page.
    fn on_target_start(&self, key: &str) {
        let _ = key;
    }

    /// Called when a table was found and persisted.
    ///
    /// # Arguments
    /// * `key`: target key
    /// * `records`: number of records written
    fn on_target_complete(&self, key: &str, records: usize) {
        let _ = (key, records);
    }

    /// Called when the page loaded but held no matching table.
    fn on_target_not_found(&self, key: &str) {
        let _ = key;
    }

    /// Called when a target fails (timeout, navigation or write error).
    fn on_target_error(&self, key: &str, error: &str) {
        let _ = (key, error);
    }

    /// Called once after every target has been attempted.
    ///
    /// # Arguments
    /// * `total_targets`: targets attempted
    /// * `found`: targets whose table was found
    fn on_run_complete(&self, total_targets: usize, found: usize) {
        let _ = (total_targets, found);
    }
}

/// A no-op implementation, used when no callback is configured.
pub struct NoopProgressCallback;

impl ScrapeProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ScrapeConfig`].
pub type ProgressCallback = Arc<dyn ScrapeProgressCallback>;
