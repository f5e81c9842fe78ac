//! Result types produced by a scrape run.

use crate::error::TargetError;
use crate::target::FilingTarget;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// One table row: field name → normalised value.
///
/// Key order carries no meaning; a `BTreeMap` keeps the JSON output stable
/// between runs so diffs stay readable.
pub type Record = BTreeMap<String, String>;

/// What fetching one target's table produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScrapeResult {
    /// The table was present; zero or more records were extracted.
    Found(Vec<Record>),
    /// The page loaded but contained no matching table.
    NotFound,
    /// Navigation, selector wait, content read or persistence failed.
    Failed(TargetError),
}

impl ScrapeResult {
    pub fn is_found(&self) -> bool {
        matches!(self, ScrapeResult::Found(_))
    }

    pub fn records(&self) -> Option<&[Record]> {
        match self {
            ScrapeResult::Found(records) => Some(records),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&TargetError> {
        match self {
            ScrapeResult::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Outcome of one target within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetOutcome {
    pub target: FilingTarget,
    pub result: ScrapeResult,
    /// Where the records were written, when they were.
    pub output_path: Option<PathBuf>,
    /// Date/duration cells that kept their original text because no parse
    /// candidate matched.
    pub unparsed_cells: usize,
    pub duration_ms: u64,
}

/// Aggregate counters for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub total_targets: usize,
    pub found: usize,
    pub not_found: usize,
    pub failed: usize,
    pub records_written: usize,
    pub unparsed_cells: usize,
    pub duration_ms: u64,
}

impl RunStats {
    /// Tally outcomes. `duration_ms` is left for the caller to fill.
    pub fn from_outcomes(outcomes: &[TargetOutcome]) -> Self {
        let mut stats = RunStats {
            total_targets: outcomes.len(),
            ..Default::default()
        };
        for o in outcomes {
            match &o.result {
                ScrapeResult::Found(records) => {
                    stats.found += 1;
                    if o.output_path.is_some() {
                        stats.records_written += records.len();
                    }
                }
                ScrapeResult::NotFound => stats.not_found += 1,
                ScrapeResult::Failed(_) => stats.failed += 1,
            }
            stats.unparsed_cells += o.unparsed_cells;
        }
        stats
    }
}

/// Everything a completed (authenticated) run reports.
///
/// Outcomes are in configured target order in both modes; look one up by
/// target key with [`RunReport::outcome`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub outcomes: Vec<TargetOutcome>,
    pub stats: RunStats,
}

impl RunReport {
    pub fn outcome(&self, key: &str) -> Option<&TargetOutcome> {
        self.outcomes.iter().find(|o| o.target.key == key)
    }

    /// True when no target failed. `NotFound` does not count as failure.
    pub fn all_succeeded(&self) -> bool {
        self.stats.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(key: &str, result: ScrapeResult, written: bool) -> TargetOutcome {
        TargetOutcome {
            target: FilingTarget::new(key, key),
            result,
            output_path: written.then(|| PathBuf::from(format!("results/{key}-data.json"))),
            unparsed_cells: 1,
            duration_ms: 10,
        }
    }

    #[test]
    fn stats_tally_each_result_kind() {
        let record: Record = [("name".to_string(), "x".to_string())].into();
        let outcomes = vec![
            outcome("attendance", ScrapeResult::Found(vec![record.clone(), record]), true),
            outcome("overtime", ScrapeResult::NotFound, false),
            outcome(
                "leave",
                ScrapeResult::Failed(TargetError::Extraction {
                    target: "leave".into(),
                    detail: "closed".into(),
                }),
                false,
            ),
        ];
        let stats = RunStats::from_outcomes(&outcomes);
        assert_eq!(stats.total_targets, 3);
        assert_eq!(stats.found, 1);
        assert_eq!(stats.not_found, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.records_written, 2);
        assert_eq!(stats.unparsed_cells, 3);
    }

    #[test]
    fn report_lookup_is_by_key() {
        let outcomes = vec![
            outcome("leave", ScrapeResult::NotFound, false),
            outcome("attendance", ScrapeResult::Found(vec![]), true),
        ];
        let report = RunReport {
            stats: RunStats::from_outcomes(&outcomes),
            outcomes,
        };
        assert!(report.outcome("attendance").unwrap().result.is_found());
        assert!(report.outcome("overtime").is_none());
        assert!(report.all_succeeded());
    }
}
