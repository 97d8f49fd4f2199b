//! Structured logging field names for retitle.
//!
//! All crates use these names for consistent structured logging fields, so
//! JSON logs can be filtered by the same keys across every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Run-level failure (directory unreadable) |
//! | WARN  | Per-file failure or automatic fallback applied |
//! | INFO  | Run lifecycle, one line per renamed file |
//! | DEBUG | Decision points (strategy chosen, retries, suffixes tried) |
//! | TRACE | High-volume data (normalized text previews) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Identifier of one rename run. Format: UUIDv7 (time-ordered).
pub const RUN_ID: &str = "run_id";

/// Subsystem originating the log event.
/// Values: "extract", "inference", "rename", "cli"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "office_convert", "ollama", "resolver", "runner"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "extract", "generate", "resolve", "rename"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// File being processed (base name).
pub const FILE: &str = "file";

/// Detected format family.
pub const FORMAT: &str = "format";

/// Extraction strategy applied.
pub const STRATEGY: &str = "strategy";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Byte length of a prompt.
pub const PROMPT_LEN: &str = "prompt_len";

/// Byte length of a model response.
pub const RESPONSE_LEN: &str = "response_len";

/// Characters of extracted text.
pub const CHAR_COUNT: &str = "char_count";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Model name used for inference.
pub const MODEL: &str = "model";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Stable `Family::Variant` error kind.
pub const ERROR_KIND: &str = "error_kind";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Slow operation threshold exceeded.
pub const SLOW: &str = "slow";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names_are_snake_case() {
        for name in [
            RUN_ID,
            SUBSYSTEM,
            COMPONENT,
            OPERATION,
            FILE,
            FORMAT,
            STRATEGY,
            DURATION_MS,
            PROMPT_LEN,
            RESPONSE_LEN,
            CHAR_COUNT,
            MODEL,
            ERROR_KIND,
            ERROR_MSG,
            SLOW,
        ] {
            assert!(name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c == '_'));
        }
    }
}
