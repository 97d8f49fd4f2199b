//! Token counting for prompt budgeting.
//!
//! The normalizer can cap text by tokens as well as characters. Counting uses
//! tiktoken's `cl100k_base` encoding, which is close enough to the tokenizers
//! of small local models for budgeting purposes.

use std::sync::Arc;

use once_cell::sync::Lazy;
use tracing::warn;

use crate::error::{Error, Result};

/// Shared `cl100k_base` tokenizer. Building the BPE tables is expensive, so
/// it happens once per process.
static CL100K: Lazy<Option<Arc<dyn Tokenizer>>> = Lazy::new(|| match TiktokenTokenizer::cl100k() {
    Ok(t) => Some(Arc::new(t) as Arc<dyn Tokenizer>),
    Err(e) => {
        warn!(error = %e, "cl100k_base unavailable, estimating tokens instead");
        None
    }
});

/// Process-wide tokenizer for prompt budgeting: `cl100k_base`, or the
/// estimator if its tables fail to load.
pub fn default_tokenizer() -> Arc<dyn Tokenizer> {
    CL100K
        .clone()
        .unwrap_or_else(|| Arc::new(EstimatingTokenizer))
}

/// Counts tokens in text. Implementations must be thread-safe.
pub trait Tokenizer: Send + Sync {
    /// Number of tokens in `text`.
    fn count_tokens(&self, text: &str) -> usize;

    /// Identifier of the encoding.
    fn name(&self) -> &str;
}

/// Tiktoken-based tokenizer.
pub struct TiktokenTokenizer {
    bpe: tiktoken_rs::CoreBPE,
    name: String,
}

impl TiktokenTokenizer {
    /// Tokenizer for the `cl100k_base` encoding.
    pub fn cl100k() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| Error::Internal(format!("Failed to initialize cl100k_base: {}", e)))?;

        Ok(Self {
            bpe,
            name: "cl100k_base".to_string(),
        })
    }
}

impl std::fmt::Debug for TiktokenTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiktokenTokenizer")
            .field("name", &self.name)
            .finish()
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Quickly estimate token count without full tokenization.
///
/// Uses a heuristic ratio of ~3.7 characters per token for English text.
pub fn estimate_tokens(text: &str) -> usize {
    (text.len() as f32 / 3.7).ceil() as usize
}

/// Estimation-based tokenizer for when the BPE tables are unavailable.
#[derive(Debug, Default, Clone, Copy)]
pub struct EstimatingTokenizer;

impl Tokenizer for EstimatingTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        estimate_tokens(text)
    }

    fn name(&self) -> &str {
        "estimate"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE_ENGLISH: &str = "The quick brown fox jumps over the lazy dog.";

    #[test]
    fn test_cl100k_initialization() {
        let tokenizer = TiktokenTokenizer::cl100k().unwrap();
        assert_eq!(tokenizer.name(), "cl100k_base");
    }

    #[test]
    fn test_count_tokens_simple_english() {
        let tokenizer = TiktokenTokenizer::cl100k().unwrap();
        let count = tokenizer.count_tokens(SIMPLE_ENGLISH);
        assert!((8..=12).contains(&count), "Expected ~10 tokens, got {}", count);
    }

    #[test]
    fn test_count_tokens_empty_string() {
        let tokenizer = TiktokenTokenizer::cl100k().unwrap();
        assert_eq!(tokenizer.count_tokens(""), 0);
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        let estimate = estimate_tokens(SIMPLE_ENGLISH);
        assert!((10..=14).contains(&estimate), "got {}", estimate);
        assert_eq!(EstimatingTokenizer.count_tokens(SIMPLE_ENGLISH), estimate);
    }

    #[test]
    fn test_default_tokenizer_is_shared() {
        let a = default_tokenizer();
        let b = default_tokenizer();
        assert_eq!(a.name(), "cl100k_base");
        assert!(Arc::ptr_eq(&a, &b));
    }
}
