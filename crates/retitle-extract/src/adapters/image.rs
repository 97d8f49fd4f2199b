//! Image extraction adapter: OCR first, then a description of the picture.
//!
//! Order of attempts:
//! 1. tesseract OCR (skipped for HEIC, which tesseract cannot read)
//! 2. the vision model, when one is configured
//! 3. a description synthesised from EXIF and header dimensions
//!
//! Steps 2 and 3 produce a *description*, not document text. The last step
//! cannot fail, so any non-empty image yields something to name.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use tracing::{debug, warn};

use retitle_core::defaults::OCR_MIN_ALNUM_CHARS;
use retitle_core::{ExtractionAdapter, ExtractionError, ExtractionResult, ExtractionStrategy, Result};
use retitle_inference::VisionBackend;

use super::exif::{describe_from_metadata, detect_image_dimensions, extract_image_metadata};
use crate::command::{extension_of, timeout_secs, write_temp_file};
use crate::ocr::{alnum_count, ocr_image, ocr_language, tesseract_available};

pub struct ImageAdapter {
    vision: Option<Arc<dyn VisionBackend>>,
}

impl ImageAdapter {
    /// OCR with metadata fallback only.
    pub fn new() -> Self {
        Self { vision: None }
    }

    /// OCR, then the vision model, then metadata.
    pub fn with_vision(vision: Arc<dyn VisionBackend>) -> Self {
        Self {
            vision: Some(vision),
        }
    }

    pub fn has_vision(&self) -> bool {
        self.vision.is_some()
    }

    async fn run_ocr(&self, data: &[u8], ext: &str, config: &JsonValue) -> Option<String> {
        if ext == "heic" {
            return None;
        }
        if !tesseract_available().await {
            debug!("tesseract not installed, skipping OCR");
            return None;
        }
        let tmpfile = match write_temp_file(data, &format!(".{}", ext)) {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, "Could not stage image for OCR");
                return None;
            }
        };
        match ocr_image(tmpfile.path(), ocr_language(config), timeout_secs(config)).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(error = %e, "OCR failed");
                None
            }
        }
    }

    async fn describe_with_vision(&self, data: &[u8], mime: &str) -> Option<(String, String)> {
        let vision = self.vision.as_ref()?;
        match vision.describe_image(data, mime, None).await {
            Ok(description) if !description.trim().is_empty() => {
                Some((description.trim().to_string(), vision.model_name().to_string()))
            }
            Ok(_) => {
                warn!(model = vision.model_name(), "Vision model returned an empty description");
                None
            }
            Err(e) => {
                warn!(model = vision.model_name(), error = %e, "Vision description failed");
                None
            }
        }
    }
}

impl Default for ImageAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// (label, mime type) for an image extension.
fn image_kind(ext: &str) -> (&'static str, &'static str) {
    match ext {
        "png" => ("PNG", "image/png"),
        "heic" => ("HEIC", "image/heic"),
        _ => ("JPEG", "image/jpeg"),
    }
}

fn min_alnum(config: &JsonValue) -> usize {
    config
        .get("ocr_min_chars")
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .unwrap_or(OCR_MIN_ALNUM_CHARS)
}

#[async_trait]
impl ExtractionAdapter for ImageAdapter {
    fn strategy(&self) -> ExtractionStrategy {
        ExtractionStrategy::Image
    }

    async fn extract(
        &self,
        data: &[u8],
        filename: &str,
        config: &JsonValue,
    ) -> std::result::Result<ExtractionResult, ExtractionError> {
        if data.is_empty() {
            return Err(ExtractionError::EmptyContent);
        }
        let ext = extension_of(filename);
        let (label, mime) = image_kind(&ext);
        let dimensions = detect_image_dimensions(data);

        if let Some(text) = self.run_ocr(data, &ext, config).await {
            let chars = alnum_count(&text);
            if chars >= min_alnum(config) {
                return Ok(ExtractionResult::text(
                    text,
                    json!({
                        "method": "ocr",
                        "alnum_chars": chars,
                        "width": dimensions.map(|d| d.0),
                        "height": dimensions.map(|d| d.1),
                    }),
                ));
            }
            debug!(filename, chars, "OCR found too little text, describing image instead");
        }

        if let Some((description, model)) = self.describe_with_vision(data, mime).await {
            return Ok(ExtractionResult::description(
                description,
                json!({
                    "method": "vision",
                    "model": model,
                    "width": dimensions.map(|d| d.0),
                    "height": dimensions.map(|d| d.1),
                }),
            ));
        }

        let exif = extract_image_metadata(data);
        let description = describe_from_metadata(label, dimensions, exif.as_ref());
        Ok(ExtractionResult::description(
            description,
            json!({
                "method": "metadata",
                "exif": exif.as_ref().map(|m| m.to_json()),
                "width": dimensions.map(|d| d.0),
                "height": dimensions.map(|d| d.1),
            }),
        ))
    }

    async fn health_check(&self) -> Result<bool> {
        // The metadata fallback has no external dependencies.
        Ok(true)
    }

    fn name(&self) -> &str {
        "image"
    }
}
