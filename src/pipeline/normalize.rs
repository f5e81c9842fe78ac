//! Text normalisation for header and cell text.
//!
//! Portal cells carry non-breaking spaces, icon glyphs, stray markup
//! whitespace and the occasional emoji. [`normalize`] reduces all of that to
//! a plain single-spaced ASCII string. The same pass is applied to headers and
//! body cells so that a header's field name and its cells are derived from
//! identical text.
//!
//! ## Rule Order
//!
//! 1. Drop every character outside printable ASCII (`0x20..=0x7E`)
//! 2. Drop every remaining character outside the allow-set
//!    (letters, digits, whitespace, `. , ! ? ( ) : -`)
//! 3. Collapse whitespace runs to a single space
//! 4. Trim

use once_cell::sync::Lazy;
use regex::Regex;

/// Normalise raw cell or header text.
///
/// Pure and idempotent: `normalize(&normalize(s)) == normalize(s)`.
pub fn normalize(raw: &str) -> String {
    let s = strip_non_printable(raw);
    let s = strip_disallowed(&s);
    let s = collapse_whitespace(&s);
    s.trim().to_string()
}

/// Derive a record field name from raw header text.
///
/// `"Date Filed"` → `"date_filed"`, `"Time (In/Out)"` → `"time_inout"`.
/// Every run of non-alphanumeric characters becomes a single `_`, and
/// leading/trailing separators are dropped.
pub fn field_name(raw: &str) -> String {
    let lowered = normalize(raw).to_lowercase();
    RE_FIELD_SEPARATORS
        .replace_all(&lowered, "_")
        .trim_matches('_')
        .to_string()
}

// ── Rule 1: Strip non-printable ──────────────────────────────────────────────

static RE_NON_PRINTABLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\x20-\x7E]").unwrap());

fn strip_non_printable(input: &str) -> String {
    RE_NON_PRINTABLE.replace_all(input, "").into_owned()
}

// ── Rule 2: Strip characters outside the allow-set ───────────────────────────

static RE_DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9\s.,!?():\-]").unwrap());

fn strip_disallowed(input: &str) -> String {
    RE_DISALLOWED.replace_all(input, "").into_owned()
}

// ── Rule 3: Collapse whitespace ──────────────────────────────────────────────

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

fn collapse_whitespace(input: &str) -> String {
    RE_WHITESPACE.replace_all(input, " ").into_owned()
}

// ── Field names ──────────────────────────────────────────────────────────────

static RE_FIELD_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());
