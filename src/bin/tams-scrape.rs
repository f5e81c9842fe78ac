//! CLI binary for tams-scrape.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ScrapeConfig` and prints a run summary.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tams_scrape::{
    default_filings, scrape, Concurrency, FilingTarget, OutputNaming, ProgressCallback,
    RunReport, ScrapeConfig, ScrapeProgressCallback, ScrapeResult, SelectorStrategy,
};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over all targets plus a log line per
/// target. Targets may finish out of order in parallel mode.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<String, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until login succeeds and the target count is known.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Logging in…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>2}/{len} tables  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Scraping");
    }

    /// Clear the bar when the run ends in a fatal error.
    fn abandon(&self) {
        self.bar.finish_and_clear();
    }

    fn elapsed_secs(&self, key: &str) -> f64 {
        self.start_times
            .lock()
            .map(|mut m| m.remove(key))
            .ok()
            .flatten()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ScrapeProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_targets: usize) {
        self.activate_bar(total_targets);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Logged in; fetching {total_targets} tables…"))
        ));
    }

    fn on_target_start(&self, key: &str) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(key.to_string(), Instant::now());
        }
        self.bar.set_message(key.to_string());
    }

    fn on_target_complete(&self, key: &str, records: usize) {
        let secs = self.elapsed_secs(key);
        self.bar.println(format!(
            "  {} {:<18} {:<12}  {}",
            green("✓"),
            key,
            dim(&format!("{records:>4} records")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_target_not_found(&self, key: &str) {
        let secs = self.elapsed_secs(key);
        self.bar.println(format!(
            "  {} {:<18} {:<12}  {}",
            yellow("∅"),
            key,
            yellow("no table"),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_target_error(&self, key: &str, error: &str) {
        let secs = self.elapsed_secs(key);
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg: String = if error.chars().count() > 80 {
            let head: String = error.chars().take(79).collect();
            format!("{head}\u{2026}")
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:<18} {}  {}",
            red("✗"),
            key,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total_targets: usize, found: usize) {
        self.bar.finish_and_clear();
        let errors = self.errors.load(Ordering::SeqCst);
        if errors == 0 {
            eprintln!(
                "{} {}/{} tables found",
                green("✔"),
                bold(&found.to_string()),
                total_targets
            );
        } else {
            eprintln!(
                "{} {}/{} tables found  ({} failed)",
                if errors == total_targets {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&found.to_string()),
                total_targets,
                red(&errors.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # All four tables, one tab, credentials from the environment
  tams-scrape

  # Four tabs at once, timestamped output files
  tams-scrape --parallel --timestamped -o ./exports

  # Only leave and overtime, tables located by id (table#tbl_<id>)
  tams-scrape --only leave,overtime --selector identified

  # Watch the browser while debugging a login problem
  tams-scrape --headed --verbose

  # Machine-readable run report on stdout
  tams-scrape --json > report.json

FILING TARGETS:
  Key               Label        Page
  ────────────────  ───────────  ─────────────────────────
  attendance        attendance   <base>/attendance
  overtime          ot           <base>/filing/overtime
  officialbusiness  ob           <base>/filing/officialbusiness
  leave             lv           <base>/filing/leave

ENVIRONMENT VARIABLES:
  TAMS_BASE_URL   Portal base URL (required)
  ZEE_USERNAME    Login user name (required)
  ZEE_PASSWORD    Login password (required)
  HCC_BASE_URL    Origin granted geolocation permission (optional)
  RUST_LOG        Overrides the log filter, e.g. tams_scrape=debug

EXIT STATUS:
  0  Login succeeded; every target was attempted (see the summary for
     per-table failures)
  1  Fatal error: missing configuration, browser launch, or login failure
"#;

/// Scrape TAMS filing tables to JSON.
#[derive(Parser, Debug)]
#[command(
    name = "tams-scrape",
    version,
    about = "Scrape TAMS attendance and filing tables to JSON",
    long_about = "Log into the TAMS portal with a headless Chromium, read the attendance, \
overtime, official-business and leave tables, and write each one as a JSON array of \
normalised records.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Portal base URL.
    #[arg(long, env = "TAMS_BASE_URL")]
    base_url: String,

    /// Origin granted the geolocation permission before login.
    #[arg(long, env = "HCC_BASE_URL")]
    permission_origin: Option<String>,

    /// Login user name.
    #[arg(long, env = "ZEE_USERNAME")]
    username: String,

    /// Login password.
    #[arg(long, env = "ZEE_PASSWORD", hide_env_values = true)]
    password: String,

    /// Comma-separated target keys to fetch (default: all four).
    #[arg(long, value_delimiter = ',')]
    only: Vec<String>,

    /// Output directory for the JSON files.
    #[arg(short, long = "output-dir", env = "TAMS_OUTPUT_DIR", default_value = "results")]
    output_dir: PathBuf,

    /// Name files `<label>-YYYYMMDD-HHmmss.json` instead of `<key>-data.json`.
    #[arg(long, env = "TAMS_TIMESTAMPED")]
    timestamped: bool,

    /// Fetch targets in separate tabs concurrently.
    #[arg(long, env = "TAMS_PARALLEL")]
    parallel: bool,

    /// Max tabs open at once with --parallel.
    #[arg(long, env = "TAMS_MAX_TABS", default_value_t = 4,
          value_parser = clap::value_parser!(u16).range(1..=16))]
    max_tabs: u16,

    /// Table lookup: generic (first table) or identified (table#tbl_<id>).
    #[arg(long, env = "TAMS_SELECTOR", value_enum, default_value = "generic")]
    selector: SelectorArg,

    /// Page navigation timeout in seconds.
    #[arg(long, env = "TAMS_NAVIGATION_TIMEOUT", default_value_t = 30)]
    navigation_timeout: u64,

    /// Table selector wait in seconds.
    #[arg(long, env = "TAMS_SELECTOR_TIMEOUT", default_value_t = 15)]
    selector_timeout: u64,

    /// Login page and post-submit navigation timeout in seconds.
    #[arg(long, env = "TAMS_LOGIN_TIMEOUT", default_value_t = 30)]
    login_timeout: u64,

    /// Show the browser window.
    #[arg(long)]
    headed: bool,

    /// Do not save a screenshot when the login page times out.
    #[arg(long)]
    no_screenshot: bool,

    /// Print the run report as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "TAMS_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "TAMS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "TAMS_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum SelectorArg {
    Generic,
    Identified,
}

impl From<SelectorArg> for SelectorStrategy {
    fn from(v: SelectorArg) -> Self {
        match v {
            SelectorArg::Generic => SelectorStrategy::Generic,
            SelectorArg::Identified => SelectorStrategy::IdentifierQualified,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar carries the per-target feedback, so library INFO
    // logs are suppressed while it is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let cli_cb = show_progress.then(CliProgressCallback::new_dynamic);
    let progress_cb: Option<ProgressCallback> = cli_cb
        .clone()
        .map(|cb| cb as Arc<dyn ScrapeProgressCallback>);

    let config = match build_config(&cli, progress_cb) {
        Ok(config) => config,
        Err(e) => {
            if let Some(ref cb) = cli_cb {
                cb.abandon();
            }
            return Err(e);
        }
    };

    // ── Run ──────────────────────────────────────────────────────────────
    let report = match scrape(&config).await {
        Ok(report) => report,
        Err(e) => {
            if let Some(ref cb) = cli_cb {
                cb.abandon();
            }
            return Err(e).context("Scrape failed");
        }
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&report, show_progress);
    }

    Ok(())
}

/// Map CLI args to `ScrapeConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ScrapeConfig> {
    let targets = select_targets(&cli.only)?;

    let mut builder = ScrapeConfig::builder()
        .base_url(&cli.base_url)
        .credentials(&cli.username, &cli.password)
        .targets(targets)
        .selector_strategy(cli.selector.clone().into())
        .concurrency(if cli.parallel {
            Concurrency::Parallel
        } else {
            Concurrency::Sequential
        })
        .max_tabs(cli.max_tabs as usize)
        .navigation_timeout(Duration::from_secs(cli.navigation_timeout))
        .selector_timeout(Duration::from_secs(cli.selector_timeout))
        .login_timeout(Duration::from_secs(cli.login_timeout))
        .output_dir(&cli.output_dir)
        .output_naming(if cli.timestamped {
            OutputNaming::Timestamped
        } else {
            OutputNaming::Fixed
        })
        .screenshot_on_timeout(!cli.no_screenshot)
        .headless(!cli.headed);

    if let Some(ref origin) = cli.permission_origin {
        builder = builder.permission_origin(origin);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Resolve `--only` keys against the default filing list, keeping its order.
fn select_targets(only: &[String]) -> Result<Vec<FilingTarget>> {
    let all = default_filings();
    if only.is_empty() {
        return Ok(all);
    }
    let wanted: Vec<String> = only.iter().map(|k| k.trim().to_lowercase()).collect();
    for key in &wanted {
        if !all.iter().any(|t| &t.key == key) {
            let known: Vec<&str> = all.iter().map(|t| t.key.as_str()).collect();
            anyhow::bail!("Unknown target '{}'; expected one of {}", key, known.join(", "));
        }
    }
    Ok(all.into_iter().filter(|t| wanted.contains(&t.key)).collect())
}

fn print_summary(report: &RunReport, show_progress: bool) {
    // Per-target lines were already printed by the progress callback.
    if !show_progress {
        for outcome in &report.outcomes {
            let line = match &outcome.result {
                ScrapeResult::Found(records) => format!(
                    "  {} {:<18} {} records",
                    green("✓"),
                    outcome.target.key,
                    records.len()
                ),
                ScrapeResult::NotFound => {
                    format!("  {} {:<18} no table", yellow("∅"), outcome.target.key)
                }
                ScrapeResult::Failed(e) => {
                    format!("  {} {:<18} {}", red("✗"), outcome.target.key, red(&e.to_string()))
                }
            };
            eprintln!("{line}");
        }
    }

    let stats = &report.stats;
    eprintln!(
        "{}  {}/{} tables  {} records  {}ms",
        if stats.failed == 0 { green("✔") } else { cyan("⚠") },
        stats.found,
        stats.total_targets,
        stats.records_written,
        stats.duration_ms,
    );
    if stats.unparsed_cells > 0 {
        eprintln!(
            "   {}",
            dim(&format!(
                "{} date/duration cells kept their original text",
                stats.unparsed_cells
            ))
        );
    }
    for outcome in &report.outcomes {
        if let Some(ref path) = outcome.output_path {
            eprintln!("   {} {}", dim("→"), bold(&path.display().to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abandon_finishes_the_login_spinner() {
        let cb = CliProgressCallback::new_dynamic();
        assert!(!cb.bar.is_finished());
        cb.abandon();
        assert!(cb.bar.is_finished());
    }
}
