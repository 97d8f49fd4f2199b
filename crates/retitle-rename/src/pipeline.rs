//! Per-file analysis: read, detect, extract, normalize, name, sanitize.
//!
//! Analysis touches no shared state, so any number of files can be analysed
//! concurrently. Only the commit step that follows needs the namespace.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use tracing::{debug, instrument, warn};

use retitle_core::defaults::{EXTRACTION_CMD_TIMEOUT_SECS, GEN_TIMEOUT_SECS, NAME_MAX_CHARS, NAME_MAX_RETRIES};
use retitle_core::{
    sniff_format, signature_matches, ExtractionError, FileError, FileRecord, FilenameSanitizer,
    NameGenerationFailure, NameGenerator, NamingRequest, RenamePlan, TextNormalizer,
};
use retitle_extract::ExtractionRegistry;

/// Knobs for one analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyzerSettings {
    /// Longest name requested from the naming service, in characters.
    pub name_max_chars: usize,
    /// Bound on each naming attempt.
    pub gen_timeout: Duration,
    /// Extra naming attempts after a failure (0 or 1).
    pub name_retries: u32,
    /// Bound on each external extraction command, in seconds.
    pub extract_timeout_secs: u64,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            name_max_chars: NAME_MAX_CHARS,
            gen_timeout: Duration::from_secs(GEN_TIMEOUT_SECS),
            name_retries: NAME_MAX_RETRIES,
            extract_timeout_secs: EXTRACTION_CMD_TIMEOUT_SECS,
        }
    }
}

/// A file after analysis: its record and either a sanitized plan or the
/// error that stopped it.
#[derive(Debug)]
pub struct Analyzed {
    pub record: FileRecord,
    pub plan: Result<RenamePlan, FileError>,
}

pub struct FileAnalyzer {
    registry: Arc<ExtractionRegistry>,
    namer: Arc<dyn NameGenerator>,
    normalizer: TextNormalizer,
    sanitizer: FilenameSanitizer,
    settings: AnalyzerSettings,
}

impl FileAnalyzer {
    pub fn new(registry: Arc<ExtractionRegistry>, namer: Arc<dyn NameGenerator>) -> Self {
        let settings = AnalyzerSettings::default();
        Self {
            registry,
            namer,
            normalizer: TextNormalizer::default().with_default_token_budget(),
            sanitizer: FilenameSanitizer::new().with_max_stem_chars(settings.name_max_chars),
            settings,
        }
    }

    pub fn with_settings(mut self, settings: AnalyzerSettings) -> Self {
        self.settings = settings;
        self.sanitizer = self.sanitizer.with_max_stem_chars(settings.name_max_chars);
        self
    }

    pub fn with_normalizer(mut self, normalizer: TextNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_sanitizer(mut self, sanitizer: FilenameSanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    pub fn settings(&self) -> &AnalyzerSettings {
        &self.settings
    }

    pub fn sanitizer(&self) -> FilenameSanitizer {
        self.sanitizer
    }

    #[instrument(skip(self, record), fields(subsystem = "rename", component = "analyzer", op = "analyze", file = %record.file_name(), format = %record.format()))]
    pub async fn analyze(&self, mut record: FileRecord) -> Analyzed {
        let start = Instant::now();
        let plan = self.analyze_record(&mut record).await;
        match &plan {
            Ok(plan) => debug!(
                candidate = plan.candidate_name(),
                sanitized = plan.sanitized_name().unwrap_or_default(),
                duration_ms = start.elapsed().as_millis() as u64,
                "Analysis complete"
            ),
            Err(e) => warn!(
                error_kind = %e.kind(),
                error = %e,
                duration_ms = start.elapsed().as_millis() as u64,
                "Analysis failed"
            ),
        }
        Analyzed { record, plan }
    }

    async fn analyze_record(&self, record: &mut FileRecord) -> Result<RenamePlan, FileError> {
        let extracted = self.extract_text(record).await;
        record.set_extraction(extracted.clone())?;
        let text = extracted?;

        let candidate = self.request_name(&text).await?;
        let sanitized = self
            .sanitizer
            .sanitize(&candidate, &record.extension(), &record.stem());

        let mut plan = RenamePlan::new(record.source_path(), candidate);
        plan.mark_sanitized(sanitized)?;
        Ok(plan)
    }

    /// Read the file once and turn it into normalized, non-empty text.
    async fn extract_text(&self, record: &FileRecord) -> Result<String, ExtractionError> {
        let data = record.read_bytes().await?;
        let file_name = record.file_name();

        if let Some(sniffed) = sniff_format(&data) {
            if !signature_matches(record.format(), sniffed) {
                warn!(
                    file = %file_name,
                    declared = %record.format(),
                    detected = %sniffed,
                    "File signature does not match its extension, trusting the extension"
                );
            }
        }

        let config = json!({ "timeout_secs": self.settings.extract_timeout_secs });
        let result = self
            .registry
            .extract_format(record.format(), &data, &file_name, &config)
            .await?;

        let text = self.normalizer.normalize(&result.text);
        if text.is_empty() {
            return Err(ExtractionError::EmptyContent);
        }
        debug!(
            chars = text.chars().count(),
            is_description = result.is_description,
            "Normalized extracted text"
        );
        Ok(text)
    }

    /// Ask the naming service for a candidate, bounded in time, with at most
    /// `name_retries` extra attempts. Returns the trimmed candidate.
    pub async fn request_name(&self, text: &str) -> Result<String, NameGenerationFailure> {
        let request = NamingRequest::new(text, self.settings.name_max_chars);
        let mut attempt = 0;
        loop {
            let failure = match tokio::time::timeout(
                self.settings.gen_timeout,
                self.namer.generate_name(&request),
            )
            .await
            {
                Err(_) => NameGenerationFailure::Timeout(self.settings.gen_timeout),
                Ok(Err(e)) => NameGenerationFailure::Unavailable(e.to_string()),
                Ok(Ok(response)) => {
                    let candidate = response.candidate_name.trim();
                    if candidate.is_empty() {
                        NameGenerationFailure::EmptyResult
                    } else {
                        return Ok(candidate.to_string());
                    }
                }
            };

            if attempt >= self.settings.name_retries {
                return Err(failure);
            }
            attempt += 1;
            debug!(
                model = self.namer.model_name(),
                attempt,
                error = %failure,
                "Naming attempt failed, retrying"
            );
        }
    }
}
