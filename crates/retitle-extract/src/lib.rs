//! # retitle-extract
//!
//! Per-format text extraction for retitle.
//!
//! This crate provides:
//! - One [`ExtractionAdapter`](retitle_core::ExtractionAdapter) per extraction strategy
//! - [`ExtractionRegistry`], the static strategy → adapter table
//! - Time-bounded execution of external converters (pandoc, LibreOffice,
//!   poppler, tesseract) with scoped temp files
//!
//! ## Example
//!
//! ```ignore
//! use retitle_core::Format;
//! use retitle_extract::ExtractionRegistry;
//!
//! let registry = ExtractionRegistry::with_defaults(None);
//! let result = registry
//!     .extract_format(Format::PlainText, b"Meeting notes", "notes.txt", &serde_json::json!({}))
//!     .await?;
//! assert_eq!(result.text, "Meeting notes");
//! ```

pub mod adapters;
pub mod command;
pub mod ocr;
pub mod registry;

pub use adapters::{
    EmailAdapter, ImageAdapter, MarkupAdapter, OfficeConvertAdapter, PdfTextAdapter,
    SpreadsheetAdapter, TextNativeAdapter,
};
pub use adapters::text_native::{decode_text, DecodedText};
pub use registry::ExtractionRegistry;
