//! Run summary and per-file report lines.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use retitle_core::FileError;

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Renamed { to: String },
    /// The generated name equals the current name.
    Unchanged,
    /// Dry run.
    Planned { to: String },
    Skipped { reason: String },
    Failed { kind: String, message: String },
    /// The run was cancelled before this file was analysed.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOutcome {
    pub source: PathBuf,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

impl FileOutcome {
    pub fn new(source: impl Into<PathBuf>, status: OutcomeStatus) -> Self {
        Self {
            source: source.into(),
            status,
        }
    }

    pub fn failed(source: impl Into<PathBuf>, error: &FileError) -> Self {
        let status = match error {
            FileError::Cancelled => OutcomeStatus::Cancelled,
            e => OutcomeStatus::Failed {
                kind: e.kind(),
                message: e.to_string(),
            },
        };
        Self::new(source, status)
    }

    pub fn skipped(source: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::new(
            source,
            OutcomeStatus::Skipped {
                reason: reason.into(),
            },
        )
    }

    pub fn file_name(&self) -> String {
        display_name(&self.source)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl fmt::Display for FileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.file_name();
        match &self.status {
            OutcomeStatus::Renamed { to } => write!(f, "[RENAMED] {} -> {}", name, to),
            OutcomeStatus::Unchanged => write!(f, "[UNCHANGED] {}", name),
            OutcomeStatus::Planned { to } => write!(f, "[PLANNED] {} -> {}", name, to),
            OutcomeStatus::Skipped { reason } => write!(f, "[SKIPPED] {} ({})", name, reason),
            OutcomeStatus::Failed { kind, message } => {
                write!(f, "[FAILED] {}: {} ({})", name, kind, message)
            }
            OutcomeStatus::Cancelled => write!(f, "[CANCELLED] {}", name),
        }
    }
}

/// Everything one run did, in processing order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub directory: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
    pub outcomes: Vec<FileOutcome>,
}

impl RunSummary {
    pub fn new(directory: impl Into<PathBuf>, dry_run: bool) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            directory: directory.into(),
            started_at: Utc::now(),
            finished_at: None,
            dry_run,
            outcomes: Vec::new(),
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    fn count(&self, pred: impl Fn(&OutcomeStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }

    pub fn renamed(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Renamed { .. }))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Unchanged))
    }

    pub fn planned(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Planned { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Failed { .. }))
    }

    pub fn cancelled(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Cancelled))
    }

    /// Failure counts keyed by error kind, sorted by kind.
    pub fn failures_by_kind(&self) -> Vec<(String, usize)> {
        let mut counts = std::collections::BTreeMap::<String, usize>::new();
        for outcome in &self.outcomes {
            if let OutcomeStatus::Failed { kind, .. } = &outcome.status {
                *counts.entry(kind.clone()).or_default() += 1;
            }
        }
        counts.into_iter().collect()
    }

    pub fn outcome_for(&self, file_name: &str) -> Option<&FileOutcome> {
        self.outcomes.iter().find(|o| o.file_name() == file_name)
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }

    /// One line per file, in processing order.
    pub fn report_lines(&self) -> Vec<String> {
        self.outcomes.iter().map(|o| o.to_string()).collect()
    }

    /// Closing count line.
    pub fn totals_line(&self) -> String {
        let mut line = if self.dry_run {
            format!("{} planned", self.planned())
        } else {
            format!("{} renamed", self.renamed())
        };
        line.push_str(&format!(
            ", {} unchanged, {} skipped, {} failed",
            self.unchanged(),
            self.skipped(),
            self.failed()
        ));
        if self.cancelled() > 0 {
            line.push_str(&format!(", {} cancelled", self.cancelled()));
        }
        if self.dry_run {
            line.push_str(" (dry run)");
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retitle_core::ExtractionError;

    fn summary() -> RunSummary {
        let mut s = RunSummary::new("/data", false);
        s.outcomes = vec![
            FileOutcome::new(
                "/data/report.txt",
                OutcomeStatus::Renamed {
                    to: "Q3-Financial-Summary.txt".into(),
                },
            ),
            FileOutcome::skipped("/data/archive.zip", "unsupported format"),
            FileOutcome::failed(
                "/data/broken.docx",
                &FileError::from(ExtractionError::ConversionFailed("bad zip".into())),
            ),
            FileOutcome::failed("/data/late.txt", &FileError::Cancelled),
        ];
        s.finish();
        s
    }

    #[test]
    fn test_report_lines() {
        assert_eq!(
            summary().report_lines(),
            vec![
                "[RENAMED] report.txt -> Q3-Financial-Summary.txt",
                "[SKIPPED] archive.zip (unsupported format)",
                "[FAILED] broken.docx: ExtractionError::ConversionFailed (conversion failed: bad zip)",
                "[CANCELLED] late.txt",
            ]
        );
    }

    #[test]
    fn test_counts_and_totals() {
        let s = summary();
        assert_eq!(s.renamed(), 1);
        assert_eq!(s.skipped(), 1);
        assert_eq!(s.failed(), 1);
        assert_eq!(s.cancelled(), 1);
        assert_eq!(
            s.failures_by_kind(),
            vec![("ExtractionError::ConversionFailed".to_string(), 1)]
        );
        assert_eq!(
            s.totals_line(),
            "1 renamed, 0 unchanged, 1 skipped, 1 failed, 1 cancelled"
        );
        assert!(s.duration_ms().unwrap() >= 0);
    }

    #[test]
    fn test_summary_serializes_with_flat_status() {
        let json = serde_json::to_value(summary()).unwrap();
        assert_eq!(json["outcomes"][0]["status"], "renamed");
        assert_eq!(json["outcomes"][0]["to"], "Q3-Financial-Summary.txt");
        assert_eq!(json["outcomes"][2]["kind"], "ExtractionError::ConversionFailed");
        assert_eq!(json["dry_run"], false);
        assert_eq!(json["run_id"].as_str().unwrap().len(), 36);
    }

    #[test]
    fn test_dry_run_totals() {
        let mut s = RunSummary::new("/data", true);
        s.outcomes.push(FileOutcome::new(
            "/data/a.txt",
            OutcomeStatus::Planned { to: "Notes.txt".into() },
        ));
        assert_eq!(s.totals_line(), "1 planned, 0 unchanged, 0 skipped, 0 failed (dry run)");
    }
}
