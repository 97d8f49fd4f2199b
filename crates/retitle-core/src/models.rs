//! Data model for one rename run.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{ExtractionError, FileError};
use crate::format::Format;

// =============================================================================
// FILE RECORD
// =============================================================================

/// One discovered file and the outcome of extracting its text.
///
/// The extraction outcome is written exactly once; afterwards the record is
/// read-only.
#[derive(Debug, Clone)]
pub struct FileRecord {
    source_path: PathBuf,
    format: Format,
    extraction: Option<std::result::Result<String, ExtractionError>>,
}

impl FileRecord {
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        let source_path = source_path.into();
        let format = Format::from_path(&source_path);
        Self {
            source_path,
            format,
            extraction: None,
        }
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// Base name of the source file, lossily converted.
    pub fn file_name(&self) -> String {
        self.source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Original extension without the dot, case preserved.
    pub fn extension(&self) -> String {
        self.source_path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Original stem (base name without extension).
    pub fn stem(&self) -> String {
        self.source_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Read the raw bytes. Called lazily by the pipeline, once per file.
    pub async fn read_bytes(&self) -> std::result::Result<Vec<u8>, ExtractionError> {
        tokio::fs::read(&self.source_path)
            .await
            .map_err(ExtractionError::from)
    }

    /// Record the extraction outcome. Fails if one was already recorded.
    pub fn set_extraction(
        &mut self,
        outcome: std::result::Result<String, ExtractionError>,
    ) -> std::result::Result<(), FileError> {
        if self.extraction.is_some() {
            return Err(FileError::InvalidTransition {
                from: "extracted",
                to: "extracted",
            });
        }
        self.extraction = Some(outcome);
        Ok(())
    }

    pub fn extracted_text(&self) -> Option<&str> {
        match &self.extraction {
            Some(Ok(text)) => Some(text),
            _ => None,
        }
    }

    pub fn extraction_error(&self) -> Option<&ExtractionError> {
        match &self.extraction {
            Some(Err(e)) => Some(e),
            _ => None,
        }
    }
}

// =============================================================================
// EXTRACTION RESULT
// =============================================================================

/// What an extraction adapter produced for one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Raw extracted text (not yet normalized).
    pub text: String,
    /// Adapter-specific details (tool used, page count, fallbacks taken).
    pub metadata: JsonValue,
    /// True when the text is a description of the content rather than text
    /// found in it (image without readable text).
    pub is_description: bool,
}

impl ExtractionResult {
    pub fn text(text: impl Into<String>, metadata: JsonValue) -> Self {
        Self {
            text: text.into(),
            metadata,
            is_description: false,
        }
    }

    pub fn description(text: impl Into<String>, metadata: JsonValue) -> Self {
        Self {
            text: text.into(),
            metadata,
            is_description: true,
        }
    }
}

// =============================================================================
// NAMING
// =============================================================================

/// Input to the naming service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingRequest {
    pub normalized_text: String,
    /// Maximum characters the name should have.
    pub max_length: usize,
}

impl NamingRequest {
    pub fn new(normalized_text: impl Into<String>, max_length: usize) -> Self {
        Self {
            normalized_text: normalized_text.into(),
            max_length,
        }
    }
}

/// Output of the naming service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingResponse {
    pub candidate_name: String,
}

// =============================================================================
// RENAME PLAN
// =============================================================================

/// Lifecycle of a rename plan.
///
/// `Pending → Sanitized → Resolved → Applied | Failed`. `Failed` is reachable
/// from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Pending,
    Sanitized,
    Resolved,
    Applied,
    Failed,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sanitized => "sanitized",
            Self::Resolved => "resolved",
            Self::Applied => "applied",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Applied | Self::Failed)
    }
}

impl std::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The rename decided for one successfully extracted file.
#[derive(Debug, Clone)]
pub struct RenamePlan {
    source_path: PathBuf,
    candidate_name: String,
    sanitized_name: Option<String>,
    final_name: Option<String>,
    status: PlanStatus,
    error: Option<FileError>,
}

impl RenamePlan {
    /// Create a pending plan from the naming service's candidate.
    pub fn new(source_path: impl Into<PathBuf>, candidate_name: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            candidate_name: candidate_name.into(),
            sanitized_name: None,
            final_name: None,
            status: PlanStatus::Pending,
            error: None,
        }
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn candidate_name(&self) -> &str {
        &self.candidate_name
    }

    /// Sanitized file name including extension.
    pub fn sanitized_name(&self) -> Option<&str> {
        self.sanitized_name.as_deref()
    }

    /// Collision-free file name including extension.
    pub fn final_name(&self) -> Option<&str> {
        self.final_name.as_deref()
    }

    pub fn status(&self) -> PlanStatus {
        self.status
    }

    pub fn error(&self) -> Option<&FileError> {
        self.error.as_ref()
    }

    /// Path the file will have once applied.
    pub fn target_path(&self) -> Option<PathBuf> {
        let name = self.final_name.as_ref()?;
        Some(match self.source_path.parent() {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        })
    }

    fn transition(&mut self, expected: PlanStatus, to: PlanStatus) -> Result<(), FileError> {
        if self.status != expected {
            return Err(FileError::InvalidTransition {
                from: self.status.as_str(),
                to: to.as_str(),
            });
        }
        self.status = to;
        Ok(())
    }

    pub fn mark_sanitized(&mut self, sanitized_name: impl Into<String>) -> Result<(), FileError> {
        self.transition(PlanStatus::Pending, PlanStatus::Sanitized)?;
        self.sanitized_name = Some(sanitized_name.into());
        Ok(())
    }

    pub fn mark_resolved(&mut self, final_name: impl Into<String>) -> Result<(), FileError> {
        self.transition(PlanStatus::Sanitized, PlanStatus::Resolved)?;
        self.final_name = Some(final_name.into());
        Ok(())
    }

    /// Go back from `Resolved` to `Sanitized` so a new final name can be
    /// chosen after a rename lost a race for its target.
    pub fn reopen(&mut self) -> Result<(), FileError> {
        self.transition(PlanStatus::Resolved, PlanStatus::Sanitized)?;
        self.final_name = None;
        Ok(())
    }

    pub fn mark_applied(&mut self) -> Result<(), FileError> {
        self.transition(PlanStatus::Resolved, PlanStatus::Applied)
    }

    pub fn mark_failed(&mut self, error: FileError) -> Result<(), FileError> {
        if self.status.is_terminal() {
            return Err(FileError::InvalidTransition {
                from: self.status.as_str(),
                to: PlanStatus::Failed.as_str(),
            });
        }
        self.status = PlanStatus::Failed;
        self.error = Some(error);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NameGenerationFailure;

    #[test]
    fn test_file_record_derives_format_and_names() {
        let record = FileRecord::new("/data/Quarterly Report.PDF");
        assert_eq!(record.format(), Format::Pdf);
        assert_eq!(record.file_name(), "Quarterly Report.PDF");
        assert_eq!(record.extension(), "PDF");
        assert_eq!(record.stem(), "Quarterly Report");
    }

    #[test]
    fn test_file_record_extraction_set_once() {
        let mut record = FileRecord::new("a.txt");
        record.set_extraction(Ok("hello".into())).unwrap();
        assert_eq!(record.extracted_text(), Some("hello"));
        assert!(record.extraction_error().is_none());
        assert!(record.set_extraction(Err(ExtractionError::EmptyContent)).is_err());
        assert_eq!(record.extracted_text(), Some("hello"));
    }

    #[test]
    fn test_file_record_extraction_error() {
        let mut record = FileRecord::new("a.docx");
        record
            .set_extraction(Err(ExtractionError::ConversionFailed("bad zip".into())))
            .unwrap();
        assert!(record.extracted_text().is_none());
        assert!(matches!(
            record.extraction_error(),
            Some(ExtractionError::ConversionFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_read_bytes_missing_file_is_io_failure() {
        let record = FileRecord::new("/definitely/not/here.txt");
        let err = record.read_bytes().await.unwrap_err();
        assert!(matches!(err, ExtractionError::IoFailure(_)));
    }

    #[test]
    fn test_plan_happy_path() {
        let mut plan = RenamePlan::new("/d/report.txt", "Q3 Financial Summary");
        assert_eq!(plan.status(), PlanStatus::Pending);
        plan.mark_sanitized("Q3-Financial-Summary.txt").unwrap();
        plan.mark_resolved("Q3-Financial-Summary.txt").unwrap();
        assert_eq!(
            plan.target_path(),
            Some(PathBuf::from("/d/Q3-Financial-Summary.txt"))
        );
        plan.mark_applied().unwrap();
        assert_eq!(plan.status(), PlanStatus::Applied);
    }

    #[test]
    fn test_plan_rejects_out_of_order_transitions() {
        let mut plan = RenamePlan::new("a.txt", "x");
        assert!(plan.mark_resolved("x.txt").is_err());
        assert!(plan.mark_applied().is_err());
        plan.mark_sanitized("x.txt").unwrap();
        assert!(plan.mark_sanitized("y.txt").is_err());
    }

    #[test]
    fn test_plan_reopen_after_lost_race() {
        let mut plan = RenamePlan::new("a.txt", "x");
        plan.mark_sanitized("x.txt").unwrap();
        plan.mark_resolved("x.txt").unwrap();
        plan.reopen().unwrap();
        assert_eq!(plan.final_name(), None);
        plan.mark_resolved("x-1.txt").unwrap();
        assert_eq!(plan.final_name(), Some("x-1.txt"));
    }

    #[test]
    fn test_plan_failed_is_terminal() {
        let mut plan = RenamePlan::new("a.txt", "x");
        plan.mark_failed(FileError::NameGeneration(NameGenerationFailure::EmptyResult))
            .unwrap();
        assert_eq!(plan.status(), PlanStatus::Failed);
        assert!(plan.error().is_some());
        assert!(plan.mark_failed(FileError::Cancelled).is_err());
        assert!(plan.mark_sanitized("x.txt").is_err());
    }
}
