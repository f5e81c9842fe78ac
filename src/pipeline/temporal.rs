//! Date and duration parsing for portal cell text.
//!
//! The portal renders timestamps in a handful of locale-specific shapes:
//!
//! ```text
//! 2024-08-27, Tue, 9:09 am          attendance log entries
//! 2024-08-15 6:00PM                 filing start / end
//! 2024-08-15 6:00PM to 2024-08-15 8:00PM   filing ranges
//! 18:30                             rendered hours (24-hour clock)
//! ```
//!
//! Parsing never fails: when no candidate matches, the original text is kept.
//! The result is still distinguishable through [`Temporal::Unparsed`], so the
//! extractor can warn and count the cell instead of silently passing it on.
//!
//! Wall-clock values carry no zone on the portal and are read as UTC.

use chrono::{
    DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday,
};
use once_cell::sync::Lazy;
use regex::Regex;

/// Separator between the two endpoints of a duration range.
pub const RANGE_SEPARATOR: &str = " to ";

/// Output format for canonical timestamps (RFC 1123, always GMT).
const CANONICAL_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Outcome of a lenient parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Temporal {
    /// Converted to the canonical representation.
    Canonical(String),
    /// No candidate matched; holds the input unchanged.
    Unparsed(String),
}

impl Temporal {
    pub fn is_unparsed(&self) -> bool {
        matches!(self, Temporal::Unparsed(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Temporal::Canonical(s) | Temporal::Unparsed(s) => s,
        }
    }

    pub fn into_value(self) -> String {
        match self {
            Temporal::Canonical(s) | Temporal::Unparsed(s) => s,
        }
    }
}

/// Parse a portal date/time into a canonical UTC timestamp string.
///
/// Candidates, first match wins:
/// 1. `YYYY-MM-DD, Weekday, h:mm am` when the text contains a comma
/// 2. `YYYY-MM-DD h:mmPM` when the text contains `AM` or `PM`
/// 3. free-form: RFC 3339, RFC 2822, ISO-like date/time, bare dates
pub fn parse_date(text: &str) -> Temporal {
    match parse_timestamp(text) {
        Some(dt) => Temporal::Canonical(format_canonical(&dt)),
        None => Temporal::Unparsed(text.to_string()),
    }
}

/// Same candidates as [`parse_date`], returning the instant itself.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if text.contains(',') {
        if let Some(dt) = parse_weekday_form(text) {
            return Some(dt);
        }
    }
    if text.contains("AM") || text.contains("PM") {
        if let Some(dt) = parse_meridiem_form(text) {
            return Some(dt);
        }
    }
    parse_free_form(text)
}

/// Render an instant in the canonical fixed UTC form.
pub fn format_canonical(dt: &DateTime<Utc>) -> String {
    dt.format(CANONICAL_FORMAT).to_string()
}

/// Normalise a duration cell.
///
/// A range (`"<start> to <end>"`) has each endpoint passed through
/// [`parse_date`] and is rejoined with the same separator. Anything else is
/// read as a 24-hour `HH:MM[:SS]` clock value and rendered as `h:MM AM|PM`;
/// seconds are dropped.
pub fn format_duration(text: &str) -> Temporal {
    if text.contains(RANGE_SEPARATOR) {
        let mut unparsed = false;
        let parts: Vec<String> = text
            .split(RANGE_SEPARATOR)
            .map(|endpoint| {
                let t = parse_date(endpoint);
                unparsed |= t.is_unparsed();
                t.into_value()
            })
            .collect();
        let joined = parts.join(RANGE_SEPARATOR);
        return if unparsed {
            Temporal::Unparsed(joined)
        } else {
            Temporal::Canonical(joined)
        };
    }

    match format_clock(text) {
        Some(s) => Temporal::Canonical(s),
        None => Temporal::Unparsed(text.to_string()),
    }
}

// ── Candidate 1: "2024-08-27, Tue, 9:09 am" ──────────────────────────────────

static RE_WEEKDAY_FORM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(\d{4})-(\d{1,2})-(\d{1,2}),\s*([A-Za-z]+),\s*(\d{1,2}):(\d{2})\s*([AaPp][Mm])$",
    )
    .unwrap()
});

fn parse_weekday_form(text: &str) -> Option<DateTime<Utc>> {
    let caps = RE_WEEKDAY_FORM.captures(text)?;
    let date = ymd(&caps[1], &caps[2], &caps[3])?;

    // A weekday that contradicts the date means we are misreading the cell.
    let weekday: Weekday = caps[4].parse().ok()?;
    if weekday != date.weekday() {
        return None;
    }

    let time = hm12(&caps[5], &caps[6], &caps[7])?;
    Some(Utc.from_utc_datetime(&NaiveDateTime::new(date, time)))
}

// ── Candidate 2: "2024-08-15 6:00PM" ─────────────────────────────────────────

static RE_MERIDIEM_FORM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})\s+(\d{1,2}):(\d{2})\s*([AaPp][Mm])$").unwrap()
});

fn parse_meridiem_form(text: &str) -> Option<DateTime<Utc>> {
    let caps = RE_MERIDIEM_FORM.captures(text)?;
    let date = ymd(&caps[1], &caps[2], &caps[3])?;
    let time = hm12(&caps[4], &caps[5], &caps[6])?;
    Some(Utc.from_utc_datetime(&NaiveDateTime::new(date, time)))
}

// ── Candidate 3: free-form ───────────────────────────────────────────────────

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

const NAIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

fn parse_free_form(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    for fmt in NAIVE_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
        }
    }
    None
}

// ── Clock values ─────────────────────────────────────────────────────────────

/// `"18:30"` → `"6:30 PM"`; `"09:05:59"` → `"9:05 AM"`.
fn format_clock(text: &str) -> Option<String> {
    let parts: Vec<&str> = text.trim().split(':').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return None;
    }
    let hours: u32 = parts[0].trim().parse().ok()?;
    let minutes: u32 = parts[1].trim().parse().ok()?;
    if let Some(secs) = parts.get(2) {
        let secs: u32 = secs.trim().parse().ok()?;
        if secs > 59 {
            return None;
        }
    }
    if hours > 23 || minutes > 59 {
        return None;
    }

    let display_hour = match hours % 12 {
        0 => 12,
        h => h,
    };
    let period = if hours < 12 { "AM" } else { "PM" };
    Some(format!("{display_hour}:{minutes:02} {period}"))
}

// ── Shared helpers ───────────────────────────────────────────────────────────

fn ymd(y: &str, m: &str, d: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)
}

fn hm12(h: &str, m: &str, meridiem: &str) -> Option<NaiveTime> {
    let hour12: u32 = h.parse().ok()?;
    let minute: u32 = m.parse().ok()?;
    if !(1..=12).contains(&hour12) {
        return None;
    }
    let pm = meridiem.eq_ignore_ascii_case("pm");
    let hour24 = hour12 % 12 + if pm { 12 } else { 0 };
    NaiveTime::from_hms_opt(hour24, minute, 0)
}
