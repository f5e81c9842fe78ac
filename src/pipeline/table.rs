//! Table extraction: rendered HTML table → typed records.
//!
//! Extraction is split in two so the interesting part is a pure function:
//!
//! ```text
//! page HTML ──snapshot_table──▶ TableSnapshot ──extract_snapshot──▶ records
//!  (scraper)                     (header + cell text)   (normalize, classify, parse)
//! ```
//!
//! The snapshot is the only place that knows about HTML. Everything after it
//! works on plain strings, which keeps the column-mapping rules testable
//! without a browser.

use crate::output::{Record, ScrapeResult};
use crate::pipeline::normalize::{field_name, normalize};
use crate::pipeline::temporal::{format_duration, parse_date, Temporal};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Header text of the per-row action-buttons column, which carries no data.
pub const ACTION_HEADER: &str = "Action";

/// Class DataTables puts on the single cell of its "no data" placeholder row.
const EMPTY_PLACEHOLDER_CLASS: &str = "dataTables_empty";

/// How to find the table on a page.
///
/// The portal is inconsistent: some pages render a bare `<table>`, others
/// give it an id of the form `tbl_<table id>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableLocator {
    /// First `<table>` on the page.
    Generic,
    /// `table#tbl_<identifier>`.
    Identified(String),
}

impl TableLocator {
    /// CSS selector for this locator.
    pub fn selector(&self) -> String {
        match self {
            TableLocator::Generic => "table".to_string(),
            TableLocator::Identified(id) => format!("table#tbl_{id}"),
        }
    }
}

/// Content class of a column, decided from its field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Text,
    Date,
    Duration,
}

impl ColumnKind {
    /// `"date"` anywhere in the name wins over `"duration"`.
    pub fn classify(field_name: &str) -> Self {
        if field_name.contains("date") {
            ColumnKind::Date
        } else if field_name.contains("duration") {
            ColumnKind::Duration
        } else {
            ColumnKind::Text
        }
    }
}

/// One retained header column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Position of the source cell in each row.
    pub index: usize,
    pub raw_header_text: String,
    pub field_name: String,
    pub kind: ColumnKind,
}

/// Ordered retained columns of one table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableSchema {
    columns: Vec<ColumnSpec>,
}

impl TableSchema {
    /// Build the schema from raw header cell texts.
    ///
    /// The `Action` column is dropped. Headers that normalise to nothing are
    /// named `column_<n>` (1-based position), and repeated field names get a
    /// numeric suffix so every column keeps its own key.
    pub fn from_headers<S: AsRef<str>>(headers: &[S]) -> Self {
        let mut used: HashSet<String> = HashSet::new();
        let columns = headers
            .iter()
            .enumerate()
            .filter(|(_, raw)| normalize(raw.as_ref()) != ACTION_HEADER)
            .map(|(index, raw)| {
                let raw: &str = raw.as_ref();
                let mut name = field_name(raw);
                if name.is_empty() {
                    name = format!("column_{}", index + 1);
                }
                if used.contains(&name) {
                    let base = name;
                    name = (2..)
                        .map(|n| format!("{base}_{n}"))
                        .find(|candidate| !used.contains(candidate))
                        .unwrap_or_default();
                }
                used.insert(name.clone());
                ColumnSpec {
                    index,
                    raw_header_text: raw.to_string(),
                    kind: ColumnKind::classify(&name),
                    field_name: name,
                }
            })
            .collect();
        Self { columns }
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Plain-text view of a table: header cells and body cells.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableSnapshot {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Records extracted from one snapshot.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub records: Vec<Record>,
    /// Date/duration cells that kept their original text.
    pub unparsed_cells: usize,
}

/// Locate the table in `html` and read it into a [`TableSnapshot`].
///
/// Returns `None` when no element matches the locator.
pub fn snapshot_table(html: &str, locator: &TableLocator) -> Option<TableSnapshot> {
    let selector_text = locator.selector();
    let table_sel = match Selector::parse(&selector_text) {
        Ok(sel) => sel,
        Err(e) => {
            warn!("Invalid table selector '{}': {:?}", selector_text, e);
            return None;
        }
    };
    let (row_sel, th_sel, td_sel) = match (
        Selector::parse("tr"),
        Selector::parse("th"),
        Selector::parse("td"),
    ) {
        (Ok(tr), Ok(th), Ok(td)) => (tr, th, td),
        _ => return None,
    };

    let document = Html::parse_document(html);
    let table = document.select(&table_sel).next()?;
    let mut rows = table.select(&row_sel);

    let headers = match rows.next() {
        Some(header_row) => {
            let th: Vec<String> = header_row.select(&th_sel).map(cell_text).collect();
            if th.is_empty() {
                header_row.select(&td_sel).map(cell_text).collect()
            } else {
                th
            }
        }
        None => Vec::new(),
    };

    let body = rows
        .filter_map(|row| {
            let cells: Vec<ElementRef> = row.select(&td_sel).collect();
            if cells.is_empty() || is_empty_placeholder(&cells) {
                return None;
            }
            Some(cells.into_iter().map(cell_text).collect())
        })
        .collect();

    Some(TableSnapshot {
        headers,
        rows: body,
    })
}

/// Map every body row of `snapshot` onto its schema.
///
/// A row shorter than the header set gets empty strings for the missing
/// cells; extra cells are ignored.
pub fn extract_snapshot(snapshot: &TableSnapshot) -> Extraction {
    let schema = TableSchema::from_headers(&snapshot.headers);
    debug!(
        "Table schema: {} of {} header columns retained",
        schema.len(),
        snapshot.headers.len()
    );

    let mut extraction = Extraction::default();
    for (row_idx, row) in snapshot.rows.iter().enumerate() {
        if row.len() < snapshot.headers.len() {
            debug!(
                "Row {}: {} cells for {} headers, padding",
                row_idx + 1,
                row.len(),
                snapshot.headers.len()
            );
        }
        let mut record = Record::new();
        for column in schema.columns() {
            let raw = row.get(column.index).map(String::as_str).unwrap_or("");
            let value = convert_cell(column, raw, row_idx, &mut extraction.unparsed_cells);
            record.insert(column.field_name.clone(), value);
        }
        extraction.records.push(record);
    }
    extraction
}

/// Locate and extract in one step; `None` when the table is absent.
pub fn extract_table(html: &str, locator: &TableLocator) -> Option<Extraction> {
    snapshot_table(html, locator).map(|snapshot| extract_snapshot(&snapshot))
}

/// Extract the table as a [`ScrapeResult`]: `Found` or `NotFound`, never an
/// error.
pub fn extract(html: &str, locator: &TableLocator) -> ScrapeResult {
    match extract_table(html, locator) {
        Some(extraction) => ScrapeResult::Found(extraction.records),
        None => ScrapeResult::NotFound,
    }
}

// ── Internal helpers ─────────────────────────────────────────────────────────

fn cell_text(el: ElementRef) -> String {
    el.text().collect()
}

fn is_empty_placeholder(cells: &[ElementRef]) -> bool {
    cells.len() == 1
        && cells[0]
            .value()
            .classes()
            .any(|c| c == EMPTY_PLACEHOLDER_CLASS)
}

fn convert_cell(column: &ColumnSpec, raw: &str, row_idx: usize, unparsed: &mut usize) -> String {
    let cleaned = normalize(raw);
    let parsed = match column.kind {
        ColumnKind::Text => return cleaned,
        ColumnKind::Date => parse_date(&cleaned),
        ColumnKind::Duration => format_duration(&cleaned),
    };
    if let Temporal::Unparsed(ref original) = parsed {
        // Empty cells are common (no time-out yet) and not worth a warning.
        if !original.is_empty() {
            warn!(
                "Row {}: column '{}' value {:?} matched no {:?} format, kept as-is",
                row_idx + 1,
                column.field_name,
                original,
                column.kind
            );
        }
        *unparsed += 1;
    }
    parsed.into_value()
}
