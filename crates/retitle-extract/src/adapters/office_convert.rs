//! OfficeConvertAdapter: word processor, presentation, and ebook files.
//!
//! Zip-based and RTF formats go through pandoc. Legacy binary `doc` and
//! `ppt` go through LibreOffice in headless mode.

use std::path::Path;

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use tempfile::TempDir;
use tokio::process::Command;
use tracing::debug;

use retitle_core::defaults::PDF_NAME_PAGES;
use retitle_core::{ExtractionAdapter, ExtractionError, ExtractionResult, ExtractionStrategy, Result};

use super::pdf_text::pdftotext_command;
use super::text_native::decode_text;
use crate::command::{
    command_available, extension_of, run_cmd_status, run_cmd_with_timeout, timeout_secs,
    write_temp_file,
};

const ZIP_SIGNATURE: &[u8] = b"PK\x03\x04";

pub struct OfficeConvertAdapter;

/// Pandoc input format for an extension handled by pandoc.
fn pandoc_input_format(ext: &str) -> Option<&'static str> {
    match ext {
        "docx" => Some("docx"),
        "pptx" => Some("pptx"),
        "odt" => Some("odt"),
        "rtf" => Some("rtf"),
        "epub" => Some("epub"),
        _ => None,
    }
}

fn is_zip_container(ext: &str) -> bool {
    matches!(ext, "docx" | "pptx" | "odt" | "epub")
}

fn temp_dir() -> std::result::Result<TempDir, ExtractionError> {
    TempDir::new()
        .map_err(|e| ExtractionError::ConversionFailed(format!("Failed to create temp dir: {}", e)))
}

/// `soffice --convert-to` with a private profile so concurrent
/// conversions don't fight over the user profile lock.
async fn soffice_convert(
    input: &Path,
    target: &str,
    outdir: &Path,
    profile: &Path,
    timeout: u64,
) -> std::result::Result<(), ExtractionError> {
    run_cmd_status(
        Command::new("soffice")
            .arg(format!("-env:UserInstallation=file://{}", profile.display()))
            .arg("--headless")
            .arg("--convert-to")
            .arg(target)
            .arg("--outdir")
            .arg(outdir)
            .arg(input),
        timeout,
    )
    .await
}

/// Path LibreOffice writes its output to: the input stem with a new extension.
fn converted_path(input: &Path, outdir: &Path, ext: &str) -> std::result::Result<std::path::PathBuf, ExtractionError> {
    let stem = input
        .file_stem()
        .ok_or_else(|| ExtractionError::ConversionFailed("temp file has no name".to_string()))?;
    Ok(outdir.join(stem).with_extension(ext))
}

async fn read_converted(path: &Path) -> std::result::Result<Vec<u8>, ExtractionError> {
    tokio::fs::read(path).await.map_err(|e| {
        ExtractionError::ConversionFailed(format!(
            "converter produced no output at {}: {}",
            path.display(),
            e
        ))
    })
}

async fn convert_with_pandoc(
    data: &[u8],
    ext: &str,
    format: &str,
    timeout: u64,
) -> std::result::Result<String, ExtractionError> {
    let tmpfile = write_temp_file(data, &format!(".{}", ext))?;
    debug!(format, "Converting with pandoc");

    // pandoc -f FORMAT -t plain --wrap=none INPUT
    run_cmd_with_timeout(
        Command::new("pandoc")
            .arg("-f")
            .arg(format)
            .arg("-t")
            .arg("plain")
            .arg("--wrap=none")
            .arg(tmpfile.path()),
        timeout,
    )
    .await
}

async fn convert_doc(data: &[u8], timeout: u64) -> std::result::Result<String, ExtractionError> {
    let tmpfile = write_temp_file(data, ".doc")?;
    let outdir = temp_dir()?;
    let profile = temp_dir()?;
    debug!("Converting legacy doc with soffice");

    soffice_convert(tmpfile.path(), "txt:Text", outdir.path(), profile.path(), timeout).await?;
    let bytes = read_converted(&converted_path(tmpfile.path(), outdir.path(), "txt")?).await?;
    Ok(decode_text(&bytes).text)
}

async fn convert_ppt(data: &[u8], timeout: u64) -> std::result::Result<String, ExtractionError> {
    let tmpfile = write_temp_file(data, ".ppt")?;
    let outdir = temp_dir()?;
    let profile = temp_dir()?;
    debug!("Converting legacy ppt with soffice via pdf");

    soffice_convert(tmpfile.path(), "pdf", outdir.path(), profile.path(), timeout).await?;
    let pdf_path = converted_path(tmpfile.path(), outdir.path(), "pdf")?;
    if !tokio::fs::try_exists(&pdf_path).await.unwrap_or(false) {
        return Err(ExtractionError::ConversionFailed(
            "soffice did not produce a pdf".to_string(),
        ));
    }
    run_cmd_with_timeout(&mut pdftotext_command(&pdf_path, PDF_NAME_PAGES), timeout).await
}

#[async_trait]
impl ExtractionAdapter for OfficeConvertAdapter {
    fn strategy(&self) -> ExtractionStrategy {
        ExtractionStrategy::OfficeConvert
    }

    async fn extract(
        &self,
        data: &[u8],
        filename: &str,
        config: &JsonValue,
    ) -> std::result::Result<ExtractionResult, ExtractionError> {
        if data.is_empty() {
            return Err(ExtractionError::ConversionFailed(
                "cannot convert an empty document".to_string(),
            ));
        }

        let ext = extension_of(filename);
        if is_zip_container(&ext) && !data.starts_with(ZIP_SIGNATURE) {
            return Err(ExtractionError::ConversionFailed(format!(
                "'{}' is not a valid {} container (missing zip signature)",
                filename, ext
            )));
        }

        let timeout = timeout_secs(config);
        let (text, converter) = match (ext.as_str(), pandoc_input_format(&ext)) {
            (_, Some(format)) => (convert_with_pandoc(data, &ext, format, timeout).await?, "pandoc"),
            ("doc", None) => (convert_doc(data, timeout).await?, "soffice"),
            ("ppt", None) => (convert_ppt(data, timeout).await?, "soffice+pdftotext"),
            _ => {
                return Err(ExtractionError::ConversionFailed(format!(
                    "no converter for '.{}' files",
                    ext
                )))
            }
        };

        if text.trim().is_empty() {
            return Err(ExtractionError::EmptyContent);
        }
        let char_count = text.chars().count();
        let line_count = text.lines().count();

        Ok(ExtractionResult::text(
            text,
            json!({
                "format": ext,
                "char_count": char_count,
                "line_count": line_count,
                "converter": converter,
            }),
        ))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(command_available("pandoc", "--version", &[]).await)
    }

    fn name(&self) -> &str {
        "office_convert"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_office_convert_strategy() {
        let adapter = OfficeConvertAdapter;
        assert_eq!(adapter.strategy(), ExtractionStrategy::OfficeConvert);
        assert_eq!(adapter.name(), "office_convert");
    }

    #[test]
    fn test_pandoc_input_format() {
        assert_eq!(pandoc_input_format("docx"), Some("docx"));
        assert_eq!(pandoc_input_format("epub"), Some("epub"));
        assert_eq!(pandoc_input_format("rtf"), Some("rtf"));
        assert_eq!(pandoc_input_format("doc"), None);
        assert_eq!(pandoc_input_format("ppt"), None);
    }

    #[test]
    fn test_converted_path_swaps_extension() {
        let path = converted_path(Path::new("/tmp/retitle-abc.doc"), Path::new("/out"), "txt").unwrap();
        assert_eq!(path, Path::new("/out/retitle-abc.txt"));
    }

    #[tokio::test]
    async fn test_office_convert_health_check() {
        let result = OfficeConvertAdapter.health_check().await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_truncated_docx_rejected_before_conversion() {
        let err = OfficeConvertAdapter
            .extract(b"<w:document>", "report.docx", &serde_json::json!({}))
            .await
            .unwrap_err();
        match err {
            ExtractionError::ConversionFailed(msg) => assert!(msg.contains("zip signature")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_document_is_conversion_failed() {
        let err = OfficeConvertAdapter
            .extract(b"", "empty.rtf", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::ConversionFailed(_)));
    }

    #[tokio::test]
    async fn test_office_convert_rtf() {
        let adapter = OfficeConvertAdapter;
        if !adapter.health_check().await.unwrap_or(false) {
            eprintln!("Skipping: pandoc not installed");
            return;
        }
        let rtf = br"{\rtf1\ansi{\fonttbl\f0\fswiss Helvetica;}\f0\pard Quarterly planning memo\par}";
        let result = adapter
            .extract(rtf, "memo.rtf", &serde_json::json!({}))
            .await
            .unwrap();
        assert!(result.text.contains("Quarterly planning memo"));
        assert_eq!(result.metadata["converter"], "pandoc");
    }
}
