//! PdfText extraction adapter: text layer via `pdftotext` (poppler-utils),
//! with an OCR fallback for scanned documents.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::process::Command;
use tracing::{debug, info, warn};

use retitle_core::defaults::{PDF_NAME_PAGES, PDF_OCR_MAX_PAGES};
use retitle_core::{ExtractionAdapter, ExtractionError, ExtractionResult, ExtractionStrategy, Result};

use crate::command::{command_available, run_cmd_with_timeout, timeout_secs, write_temp_file};
use crate::ocr::{ocr_dpi, ocr_language, ocr_pdf_pages, tesseract_available};

/// Adapter for extracting text from PDF files.
///
/// Only the first pages are converted (`max_pages` in the config, default
/// [`PDF_NAME_PAGES`]), in a single time-bounded `pdftotext` call, so the
/// cost per file does not grow with the page count.
///
/// If the text layer is blank and tesseract is installed, the first pages
/// are rendered and OCRed instead.
pub struct PdfTextAdapter;

/// Parse `pdfinfo` output into a JSON metadata object.
fn parse_pdfinfo(output: &str) -> JsonValue {
    let mut metadata = serde_json::Map::new();

    for line in output.lines() {
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim().to_lowercase().replace(' ', "_");
            let value = value.trim();
            if !value.is_empty() {
                if key == "pages" {
                    if let Ok(pages) = value.parse::<u64>() {
                        metadata.insert(key, JsonValue::Number(pages.into()));
                        continue;
                    }
                }
                metadata.insert(key, JsonValue::String(value.to_string()));
            }
        }
    }

    JsonValue::Object(metadata)
}

fn name_pages(config: &JsonValue) -> usize {
    config
        .get("max_pages")
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .filter(|&v| v > 0)
        .unwrap_or(PDF_NAME_PAGES)
}

/// `pdftotext` reading pages `1..=last_page` of `pdf` to stdout.
pub(crate) fn pdftotext_command(pdf: &std::path::Path, last_page: usize) -> Command {
    let mut cmd = Command::new("pdftotext");
    cmd.arg("-l").arg(last_page.to_string()).arg(pdf).arg("-");
    cmd
}

fn ocr_max_pages(config: &JsonValue) -> usize {
    config
        .get("ocr_max_pages")
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .filter(|&v| v > 0)
        .unwrap_or(PDF_OCR_MAX_PAGES)
}

#[async_trait]
impl ExtractionAdapter for PdfTextAdapter {
    fn strategy(&self) -> ExtractionStrategy {
        ExtractionStrategy::PdfText
    }

    async fn extract(
        &self,
        data: &[u8],
        filename: &str,
        config: &JsonValue,
    ) -> std::result::Result<ExtractionResult, ExtractionError> {
        if !data.starts_with(b"%PDF") {
            return Err(ExtractionError::ConversionFailed(format!(
                "File '{}' is not a valid PDF (missing %PDF header)",
                filename
            )));
        }
        let timeout = timeout_secs(config);

        let tmpfile = write_temp_file(data, ".pdf")?;
        let tmp_path = tmpfile.path();

        let mut metadata = match run_cmd_with_timeout(Command::new("pdfinfo").arg(tmp_path), timeout).await {
            Ok(output) => parse_pdfinfo(&output),
            Err(e) => {
                warn!(filename, error = %e, "pdfinfo failed, continuing without metadata");
                serde_json::json!({})
            }
        };

        let last_page = name_pages(config);
        debug!(filename, last_page, "Extracting leading pages");
        let text = run_cmd_with_timeout(&mut pdftotext_command(tmp_path, last_page), timeout).await?;

        let mut method = "text_layer";
        let text = if text.trim().is_empty() {
            if tesseract_available().await {
                info!(filename, "Empty text layer, falling back to OCR");
                method = "ocr";
                ocr_pdf_pages(
                    tmp_path,
                    ocr_max_pages(config),
                    ocr_dpi(config),
                    ocr_language(config),
                    timeout,
                )
                .await?
            } else {
                debug!(filename, "Empty text layer and tesseract not installed");
                text
            }
        } else {
            text
        };

        if text.trim().is_empty() {
            return Err(ExtractionError::EmptyContent);
        }

        let char_count = text.chars().count();
        let line_count = text.lines().count();
        if let Some(obj) = metadata.as_object_mut() {
            obj.insert("char_count".to_string(), JsonValue::Number(char_count.into()));
            obj.insert("line_count".to_string(), JsonValue::Number(line_count.into()));
            obj.insert("method".to_string(), JsonValue::String(method.to_string()));
        }

        Ok(ExtractionResult::text(text, metadata))
    }

    async fn health_check(&self) -> Result<bool> {
        // pdftotext -v exits 0 or 99 depending on the poppler version.
        Ok(command_available("pdftotext", "-v", &[99]).await)
    }

    fn name(&self) -> &str {
        "pdf_text"
    }
}
