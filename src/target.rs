//! Filing targets: which portal tables a run fetches.

use serde::{Deserialize, Serialize};

/// One filing category's table on the portal.
///
/// `key` is the URL path segment (`/filing/<key>`) and names fixed output
/// files. `label` is the short prefix of timestamped output names.
/// `table_id` is what the portal puts after `tbl_` in the table's id, used by
/// identifier-qualified lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilingTarget {
    pub key: String,
    pub label: String,
    pub table_id: String,
}

impl FilingTarget {
    /// A target whose table id equals its key.
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            table_id: key.clone(),
            key,
            label: label.into(),
        }
    }

    /// Override the `tbl_<id>` suffix when the portal names the table
    /// differently from the page.
    pub fn with_table_id(mut self, table_id: impl Into<String>) -> Self {
        self.table_id = table_id.into();
        self
    }

    /// The page URL for this target under `base_url`.
    ///
    /// Attendance lives at the portal root; every other filing sits under
    /// `/filing/`.
    pub fn url(&self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');
        if self.key == "attendance" {
            format!("{base}/{}", self.key)
        } else {
            format!("{base}/filing/{}", self.key)
        }
    }
}

/// The four filings the portal exposes.
pub fn default_filings() -> Vec<FilingTarget> {
    vec![
        FilingTarget::new("attendance", "attendance"),
        FilingTarget::new("overtime", "ot"),
        FilingTarget::new("officialbusiness", "ob").with_table_id("ob"),
        FilingTarget::new("leave", "lv").with_table_id("leaves"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attendance_url_is_at_root() {
        let t = FilingTarget::new("attendance", "attendance");
        assert_eq!(t.url("https://tams.example/"), "https://tams.example/attendance");
    }

    #[test]
    fn filing_url_is_nested() {
        let t = FilingTarget::new("officialbusiness", "ob");
        assert_eq!(
            t.url("https://tams.example"),
            "https://tams.example/filing/officialbusiness"
        );
    }

    #[test]
    fn table_id_defaults_to_key() {
        let t = FilingTarget::new("overtime", "ot");
        assert_eq!(t.table_id, "overtime");
        assert_eq!(t.with_table_id("ot_list").table_id, "ot_list");
    }

    #[test]
    fn default_filings_use_portal_table_ids() {
        let ids: Vec<_> = default_filings()
            .into_iter()
            .map(|f| (f.key, f.label, f.table_id))
            .collect();
        let expect = |k: &str, l: &str, t: &str| (k.to_string(), l.to_string(), t.to_string());
        assert_eq!(
            ids,
            vec![
                expect("attendance", "attendance", "attendance"),
                expect("overtime", "ot", "overtime"),
                expect("officialbusiness", "ob", "ob"),
                expect("leave", "lv", "leaves"),
            ]
        );
    }

    #[test]
    fn default_filings_are_unique() {
        let filings = default_filings();
        assert_eq!(filings.len(), 4);
        let mut keys: Vec<_> = filings.iter().map(|f| f.key.as_str()).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), 4);
    }
}
