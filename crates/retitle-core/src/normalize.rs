//! Text normalisation between extraction and naming.
//!
//! Total and deterministic: any input string produces a (possibly empty)
//! normalised string, never an error.

use std::sync::Arc;

use tracing::trace;

use crate::defaults::{NORMALIZE_MAX_CHARS, NORMALIZE_MAX_TOKENS, NORMALIZE_TRIM_RATIO};
use crate::tokenizer::{default_tokenizer, Tokenizer};

/// Collapses whitespace, strips non-printable content, and bounds length.
#[derive(Clone)]
pub struct TextNormalizer {
    max_chars: usize,
    max_tokens: usize,
    tokenizer: Option<Arc<dyn Tokenizer>>,
}

impl std::fmt::Debug for TextNormalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextNormalizer")
            .field("max_chars", &self.max_chars)
            .field("max_tokens", &self.max_tokens)
            .field("tokenizer", &self.tokenizer.as_ref().map(|t| t.name().to_string()))
            .finish()
    }
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self {
            max_chars: NORMALIZE_MAX_CHARS,
            max_tokens: NORMALIZE_MAX_TOKENS,
            tokenizer: None,
        }
    }
}

impl TextNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the character budget.
    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    /// Attach a tokenizer and enforce a token budget as well.
    pub fn with_token_budget(mut self, tokenizer: Arc<dyn Tokenizer>, max_tokens: usize) -> Self {
        self.tokenizer = Some(tokenizer);
        self.max_tokens = max_tokens;
        self
    }

    /// Enforce [`NORMALIZE_MAX_TOKENS`] with the shared default tokenizer.
    pub fn with_default_token_budget(self) -> Self {
        self.with_token_budget(default_tokenizer(), NORMALIZE_MAX_TOKENS)
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Normalise raw extracted text.
    pub fn normalize(&self, raw: &str) -> String {
        let mut out = String::with_capacity(raw.len().min(self.max_chars * 4));
        let mut pending_space = false;
        let mut kept = 0usize;

        for c in raw.chars() {
            if c.is_whitespace() {
                pending_space = true;
                continue;
            }
            if c.is_control() || is_invisible(c) {
                continue;
            }
            if pending_space && !out.is_empty() {
                if kept + 1 >= self.max_chars {
                    break;
                }
                out.push(' ');
                kept += 1;
            }
            pending_space = false;
            if kept >= self.max_chars {
                break;
            }
            out.push(c);
            kept += 1;
        }

        if let Some(tokenizer) = &self.tokenizer {
            out = self.trim_to_token_budget(out, tokenizer.as_ref());
        }

        trace!(
            input_chars = raw.chars().count(),
            output_chars = out.chars().count(),
            "Normalized text"
        );
        out
    }

    /// Cut the text by a fixed ratio per step until it fits the budget.
    fn trim_to_token_budget(&self, mut text: String, tokenizer: &dyn Tokenizer) -> String {
        while !text.is_empty() && tokenizer.count_tokens(&text) > self.max_tokens {
            let chars = text.chars().count();
            let keep = ((chars as f64) * NORMALIZE_TRIM_RATIO) as usize;
            let keep = keep.min(chars.saturating_sub(1));
            let cut = text
                .char_indices()
                .nth(keep)
                .map(|(i, _)| i)
                .unwrap_or(text.len());
            text.truncate(cut);
            let trimmed_len = text.trim_end().len();
            text.truncate(trimmed_len);
        }
        text
    }
}

/// Zero-width and formatting characters that render as nothing, plus the
/// replacement character left behind by lossy decoding.
fn is_invisible(c: char) -> bool {
    matches!(
        c,
        '\u{00AD}'
            | '\u{200B}'..='\u{200F}'
            | '\u{202A}'..='\u{202E}'
            | '\u{2060}'..='\u{2064}'
            | '\u{FEFF}'
            | '\u{FFFD}'
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::EstimatingTokenizer;

    #[test]
    fn test_collapses_whitespace_runs() {
        let n = TextNormalizer::new();
        assert_eq!(
            n.normalize("  Q3\tFinancial \n\n Summary  "),
            "Q3 Financial Summary"
        );
    }

    #[test]
    fn test_strips_control_and_invisible_characters() {
        let n = TextNormalizer::new();
        assert_eq!(n.normalize("\u{FEFF}Hel\u{0007}lo\u{200B} wor\u{FFFD}ld\u{0000}"), "Hello world");
    }

    #[test]
    fn test_empty_and_blank_inputs() {
        let n = TextNormalizer::new();
        assert_eq!(n.normalize(""), "");
        assert_eq!(n.normalize(" \n\t \u{200B} "), "");
    }

    #[test]
    fn test_truncates_to_char_budget_on_boundary() {
        let n = TextNormalizer::new().with_max_chars(5);
        assert_eq!(n.normalize("ééééééééé"), "ééééé");
        let n = TextNormalizer::new().with_max_chars(4);
        let out = n.normalize("ab cd ef");
        assert!(out.chars().count() <= 4);
        assert_eq!(out, "ab c");
    }

    #[test]
    fn test_default_budget_bounds_huge_input() {
        let n = TextNormalizer::new();
        let huge = "word ".repeat(10_000);
        let out = n.normalize(&huge);
        assert!(out.chars().count() <= NORMALIZE_MAX_CHARS);
        assert!(!out.ends_with(' '));
    }

    #[test]
    fn test_token_budget_trims_text() {
        let n = TextNormalizer::new()
            .with_max_chars(100_000)
            .with_token_budget(Arc::new(EstimatingTokenizer), 50);
        let text = "alpha beta gamma delta ".repeat(100);
        let out = n.normalize(&text);
        assert!(EstimatingTokenizer.count_tokens(&out) <= 50);
        assert!(!out.is_empty());
        assert!(text.starts_with(&out));
    }

    #[test]
    fn test_deterministic() {
        let n = TextNormalizer::new();
        let input = "Some\u{00AD} text\r\nwith  noise";
        assert_eq!(n.normalize(input), n.normalize(input));
    }
}
