//! # retitle-core
//!
//! Core types, traits, and filename rules for retitle.
//!
//! This crate provides the data model, error taxonomy, and pure pipeline
//! stages (format detection, text normalisation, filename sanitisation)
//! that the other retitle crates build on.

pub mod defaults;
pub mod error;
pub mod format;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod sanitize;
pub mod tokenizer;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{
    Error, ExtractionError, FileError, NameGenerationFailure, RenameIoError, Result,
};
pub use format::{sniff_format, signature_matches, ExtractionStrategy, Format, SUPPORTED_EXTENSIONS};
pub use models::*;
pub use normalize::TextNormalizer;
pub use sanitize::{compose, FilenameSanitizer};
pub use tokenizer::*;
pub use traits::*;
