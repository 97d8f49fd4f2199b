//! OCR helpers shared by the PDF and image adapters (tesseract, pdftoppm).

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, warn};

use serde_json::Value as JsonValue;

use retitle_core::defaults::{OCR_LANGUAGE, PDF_OCR_DPI};
use retitle_core::ExtractionError;

use crate::command::{command_available, run_cmd_status, run_cmd_with_timeout};

/// OCR language from the adapter config (`language`), else the default.
pub fn ocr_language(config: &JsonValue) -> &str {
    config
        .get("language")
        .and_then(|v| v.as_str())
        .filter(|l| !l.is_empty())
        .unwrap_or(OCR_LANGUAGE)
}

/// Render resolution from the adapter config (`dpi`), else the default.
pub fn ocr_dpi(config: &JsonValue) -> u32 {
    config
        .get("dpi")
        .and_then(|v| v.as_u64())
        .and_then(|v| u32::try_from(v).ok())
        .filter(|&v| v > 0)
        .unwrap_or(PDF_OCR_DPI)
}

/// Whether the `tesseract` binary is installed.
pub async fn tesseract_available() -> bool {
    command_available("tesseract", "--version", &[]).await
}

/// OCR one image file; tesseract writes the recognised text to stdout.
pub async fn ocr_image(
    path: &Path,
    language: &str,
    timeout_secs: u64,
) -> Result<String, ExtractionError> {
    run_cmd_with_timeout(
        Command::new("tesseract")
            .arg(path)
            .arg("stdout")
            .arg("-l")
            .arg(language),
        timeout_secs,
    )
    .await
}

/// Render the first `max_pages` pages of a PDF to PNG and OCR each one.
///
/// Page images live in a temp dir removed on return. Pages that fail OCR
/// are skipped.
pub async fn ocr_pdf_pages(
    pdf_path: &Path,
    max_pages: usize,
    dpi: u32,
    language: &str,
    timeout_secs: u64,
) -> Result<String, ExtractionError> {
    let img_dir = TempDir::new()
        .map_err(|e| ExtractionError::ConversionFailed(format!("Failed to create temp dir: {}", e)))?;
    let img_prefix = img_dir.path().join("page");

    run_cmd_status(
        Command::new("pdftoppm")
            .arg("-png")
            .arg("-r")
            .arg(dpi.to_string())
            .arg("-f")
            .arg("1")
            .arg("-l")
            .arg(max_pages.to_string())
            .arg(pdf_path)
            .arg(&img_prefix),
        timeout_secs * 3,
    )
    .await?;

    let page_images = rendered_pages(img_dir.path()).await?;
    debug!(pages = page_images.len(), "OCRing rendered pages");

    let mut page_texts = Vec::new();
    for (i, img_path) in page_images.iter().enumerate() {
        match ocr_image(img_path, language, timeout_secs).await {
            Ok(text) => page_texts.push(text),
            Err(e) => warn!(page = i + 1, error = %e, "OCR failed for page, skipping"),
        }
    }
    Ok(page_texts.join("\n\n"))
}

async fn rendered_pages(dir: &Path) -> Result<Vec<PathBuf>, ExtractionError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| ExtractionError::ConversionFailed(format!("Failed to read temp dir: {}", e)))?;
    let mut pages = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ExtractionError::ConversionFailed(format!("Failed to read dir entry: {}", e)))?
    {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("png") {
            pages.push(path);
        }
    }
    pages.sort();
    Ok(pages)
}

/// Number of alphanumeric characters, used to judge whether OCR found text.
pub fn alnum_count(text: &str) -> usize {
    text.chars().filter(|c| c.is_alphanumeric()).count()
}
