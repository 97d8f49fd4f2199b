//! Spreadsheet extraction adapter: header row plus the first data rows.
//!
//! `xlsx` is read with calamine; `csv`/`tsv` are decoded with the plain text
//! fallback chain and split with a quote-aware parser.

use std::io::Cursor;

use async_trait::async_trait;
use calamine::{Reader, Xlsx};
use serde_json::Value as JsonValue;
use tracing::debug;

use retitle_core::defaults::SPREADSHEET_MAX_ROWS;
use retitle_core::{ExtractionAdapter, ExtractionError, ExtractionResult, ExtractionStrategy, Result};

use super::text_native::decode_text;
use crate::command::extension_of;

const CELL_SEPARATOR: &str = " | ";

/// Adapter for `xlsx`, `csv`, and `tsv` files.
pub struct SpreadsheetAdapter;

/// Data rows to keep after the header (`max_rows` in the adapter config).
fn max_rows(config: &JsonValue) -> usize {
    config
        .get("max_rows")
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .unwrap_or(SPREADSHEET_MAX_ROWS)
}

/// Join the non-empty cells of each row, keeping the header and at most
/// `max_rows` further non-empty rows.
fn render_rows<I, R>(rows: I, max_rows: usize) -> Vec<String>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator<Item = String>,
{
    rows.into_iter()
        .map(|row| {
            row.into_iter()
                .map(|cell| cell.trim().to_string())
                .filter(|cell| !cell.is_empty())
                .collect::<Vec<_>>()
        })
        .filter(|cells| !cells.is_empty())
        .take(max_rows + 1)
        .map(|cells| cells.join(CELL_SEPARATOR))
        .collect()
}

/// Rows of the first worksheet that has any content.
fn extract_xlsx(data: &[u8], max_rows: usize) -> std::result::Result<(String, Vec<String>), ExtractionError> {
    let mut workbook = Xlsx::new(Cursor::new(data))
        .map_err(|e| ExtractionError::ConversionFailed(format!("Failed to open workbook: {}", e)))?;

    for sheet_name in workbook.sheet_names() {
        let range = match workbook.worksheet_range(&sheet_name) {
            Ok(range) => range,
            Err(e) => {
                debug!(sheet = %sheet_name, error = %e, "Skipping unreadable sheet");
                continue;
            }
        };
        let lines = render_rows(
            range
                .rows()
                .map(|row| row.iter().map(|cell| cell.to_string()).collect::<Vec<_>>()),
            max_rows,
        );
        if !lines.is_empty() {
            return Ok((sheet_name, lines));
        }
    }
    Err(ExtractionError::EmptyContent)
}

/// Split delimited text into records. Quoted fields may contain the
/// delimiter, newlines, and doubled quotes. Stops after `limit` records.
fn parse_delimited(text: &str, delimiter: char, limit: usize) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
            continue;
        }
        match c {
            '"' if field.trim().is_empty() => {
                field.clear();
                in_quotes = true;
            }
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
                if records.len() >= limit {
                    return records;
                }
            }
            c if c == delimiter => record.push(std::mem::take(&mut field)),
            c => field.push(c),
        }
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    records
}

#[async_trait]
impl ExtractionAdapter for SpreadsheetAdapter {
    fn strategy(&self) -> ExtractionStrategy {
        ExtractionStrategy::Spreadsheet
    }

    async fn extract(
        &self,
        data: &[u8],
        filename: &str,
        config: &JsonValue,
    ) -> std::result::Result<ExtractionResult, ExtractionError> {
        let max_rows = max_rows(config);
        let ext = extension_of(filename);

        let (lines, metadata) = match ext.as_str() {
            "xlsx" => {
                let (sheet, lines) = extract_xlsx(data, max_rows)?;
                let metadata = serde_json::json!({ "sheet": sheet, "rows": lines.len() });
                (lines, metadata)
            }
            _ => {
                let delimiter = if ext == "tsv" { '\t' } else { ',' };
                let decoded = decode_text(data);
                // Blank records don't count toward the budget; over-read a little.
                let records = parse_delimited(&decoded.text, delimiter, (max_rows + 1) * 4);
                let lines = render_rows(records, max_rows);
                let metadata = serde_json::json!({
                    "encoding": decoded.encoding,
                    "delimiter": delimiter.to_string(),
                    "rows": lines.len(),
                });
                (lines, metadata)
            }
        };

        if lines.is_empty() {
            return Err(ExtractionError::EmptyContent);
        }
        Ok(ExtractionResult::text(lines.join("\n"), metadata))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "spreadsheet"
    }
}
