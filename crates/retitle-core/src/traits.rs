//! Core traits for retitle abstractions.
//!
//! These traits are the seams between the pipeline and its collaborators
//! (document converters, language models), so each can be replaced or mocked
//! without touching pipeline logic.

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::{ExtractionError, Result};
use crate::format::ExtractionStrategy;
use crate::models::{ExtractionResult, NamingRequest, NamingResponse};

// =============================================================================
// INFERENCE TRAITS
// =============================================================================

/// Backend for text generation (LLM).
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate text given a prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate text with system context.
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// The naming service: normalized text in, candidate name out.
///
/// Implementations are not required to enforce timeouts or reject blank
/// names; the pipeline guards every call.
#[async_trait]
pub trait NameGenerator: Send + Sync {
    async fn generate_name(&self, request: &NamingRequest) -> Result<NamingResponse>;

    /// Identifier of the underlying model, for logs.
    fn model_name(&self) -> &str;
}

// =============================================================================
// EXTRACTION TRAITS
// =============================================================================

/// Adapter for extracting text from one family of file formats.
///
/// Each adapter handles one extraction strategy. Adapters are registered in
/// an `ExtractionRegistry` and dispatched on the file's format.
#[async_trait]
pub trait ExtractionAdapter: Send + Sync {
    /// The extraction strategy this adapter handles.
    fn strategy(&self) -> ExtractionStrategy;

    /// Extract text from raw file data. `filename` carries the extension
    /// used to pick a sub-format within the strategy.
    async fn extract(
        &self,
        data: &[u8],
        filename: &str,
        config: &JsonValue,
    ) -> std::result::Result<ExtractionResult, ExtractionError>;

    /// Check if the adapter's external dependencies are available.
    async fn health_check(&self) -> Result<bool>;

    /// Human-readable name of this adapter.
    fn name(&self) -> &str;
}
