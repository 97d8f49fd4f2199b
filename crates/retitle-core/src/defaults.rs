//! Centralized default constants for retitle.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers. Environment variable names live here too so `from_env()`
//! constructors and the CLI agree on them.

// =============================================================================
// NORMALIZATION
// =============================================================================

/// Maximum characters of normalized text handed to the naming service.
///
/// A few pages of prose is plenty to name a document and keeps prompt size
/// bounded for huge inputs.
pub const NORMALIZE_MAX_CHARS: usize = 6000;

/// Token budget for normalized text when a tokenizer is attached.
pub const NORMALIZE_MAX_TOKENS: usize = 5000;

/// Fraction kept per trimming step when over the token budget.
pub const NORMALIZE_TRIM_RATIO: f64 = 0.90;

// =============================================================================
// FILENAMES
// =============================================================================

/// Maximum byte length of a final file name (stem + "." + extension).
///
/// 255 bytes is the per-component limit on ext4, APFS, and NTFS (UTF-16
/// units there, which is never stricter than UTF-8 bytes).
pub const FILENAME_MAX_BYTES: usize = 255;

/// Maximum characters of the generated stem (before any collision suffix).
pub const NAME_MAX_CHARS: usize = 80;

/// Separator used between words of a generated name.
pub const NAME_SEPARATOR: char = '-';

/// Stem used when a candidate and the original name both sanitize to nothing.
pub const FALLBACK_STEM: &str = "unnamed-file";

/// Upper bound on numeric suffixes tried by the collision resolver.
pub const COLLISION_MAX_ATTEMPTS: u32 = 1000;

// =============================================================================
// INFERENCE
// =============================================================================

/// Default Ollama base URL.
pub const OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default generation model name (Ollama).
pub const GEN_MODEL: &str = "qwen2.5:1.5b";

/// Timeout for one naming attempt in seconds.
pub const GEN_TIMEOUT_SECS: u64 = 60;

/// Timeout for one vision description request in seconds.
pub const VISION_TIMEOUT_SECS: u64 = 120;

/// Retries after a failed naming attempt (0 or 1).
pub const NAME_MAX_RETRIES: u32 = 1;

// =============================================================================
// EXTRACTION
// =============================================================================

/// Per-command timeout for external extraction tools (seconds).
pub const EXTRACTION_CMD_TIMEOUT_SECS: u64 = 60;

/// Leading pages converted to text for naming. The normalizer keeps only
/// the first few thousand characters, so later pages are never read.
pub const PDF_NAME_PAGES: usize = 5;

/// Pages rendered for OCR when a PDF has no text layer.
pub const PDF_OCR_MAX_PAGES: usize = 3;

/// Rendering resolution for PDF OCR.
pub const PDF_OCR_DPI: u32 = 200;

/// Data rows taken from a spreadsheet after the header row.
pub const SPREADSHEET_MAX_ROWS: usize = 20;

/// Minimum alphanumeric characters for OCR output to count as text.
pub const OCR_MIN_ALNUM_CHARS: usize = 8;

/// Default OCR language passed to tesseract.
pub const OCR_LANGUAGE: &str = "eng";

/// Shortest text run kept when scanning binary mail containers.
pub const BINARY_TEXT_MIN_RUN: usize = 4;

// =============================================================================
// RUN
// =============================================================================

/// Default number of files analysed concurrently.
pub const MAX_CONCURRENT: usize = 4;

// =============================================================================
// ENVIRONMENT VARIABLES
// =============================================================================

pub const ENV_OLLAMA_BASE: &str = "OLLAMA_BASE";
pub const ENV_OLLAMA_GEN_MODEL: &str = "OLLAMA_GEN_MODEL";
pub const ENV_OLLAMA_VISION_MODEL: &str = "OLLAMA_VISION_MODEL";
pub const ENV_GEN_TIMEOUT_SECS: &str = "RETITLE_GEN_TIMEOUT_SECS";
pub const ENV_NAME_RETRIES: &str = "RETITLE_NAME_RETRIES";
pub const ENV_NAME_MAX_CHARS: &str = "RETITLE_NAME_MAX_CHARS";
pub const ENV_MAX_CONCURRENT: &str = "RETITLE_MAX_CONCURRENT";
pub const ENV_EXTRACT_TIMEOUT_SECS: &str = "RETITLE_EXTRACT_TIMEOUT_SECS";
pub const ENV_DRY_RUN: &str = "RETITLE_DRY_RUN";
