//! Mock naming, generation, and vision backends for deterministic testing.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use retitle_inference::mock::MockNameGenerator;
//! use retitle_core::{NameGenerator, NamingRequest};
//!
//! # async fn demo() {
//! let namer = MockNameGenerator::new()
//!     .with_fixed_response("Invoice")
//!     .with_response_mapping("Q3 Financial", "Q3 Financial Summary");
//!
//! let response = namer
//!     .generate_name(&NamingRequest::new("Q3 Financial Summary", 80))
//!     .await
//!     .unwrap();
//! assert_eq!(response.candidate_name, "Q3 Financial Summary");
//! # }
//! ```

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use retitle_core::{
    Error, GenerationBackend, NameGenerator, NamingRequest, NamingResponse, Result,
};

use crate::vision::VisionBackend;

#[derive(Debug, Clone)]
pub struct MockCall {
    pub operation: String,
    pub input: String,
    pub timestamp: std::time::Instant,
}

#[derive(Debug, Clone)]
struct MockConfig {
    /// (needle, response): first needle contained in the input wins.
    mappings: Vec<(String, String)>,
    default_response: String,
    echo_words: Option<usize>,
    latency_ms: u64,
    fail_first: u32,
    always_fail: bool,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            mappings: Vec::new(),
            default_response: "Mock response".to_string(),
            echo_words: None,
            latency_ms: 0,
            fail_first: 0,
            always_fail: false,
        }
    }
}

/// Shared state behind every mock flavour.
#[derive(Clone, Default)]
struct MockCore {
    config: Arc<MockConfig>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
    attempts: Arc<AtomicU32>,
}

impl MockCore {
    fn log(&self) -> MutexGuard<'_, Vec<MockCall>> {
        self.call_log.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn log_call(&self, operation: &str, input: &str) {
        self.log().push(MockCall {
            operation: operation.to_string(),
            input: input.to_string(),
            timestamp: std::time::Instant::now(),
        });
    }

    async fn respond(&self, operation: &str, input: &str) -> Result<String> {
        self.log_call(operation, input);
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);

        if self.config.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.config.latency_ms)).await;
        }

        if self.config.always_fail || attempt < self.config.fail_first {
            return Err(Error::Inference("Simulated failure".to_string()));
        }

        if let Some((_, response)) = self
            .config
            .mappings
            .iter()
            .find(|(needle, _)| input.contains(needle.as_str()))
        {
            return Ok(response.clone());
        }

        if let Some(words) = self.config.echo_words {
            return Ok(input.split_whitespace().take(words).collect::<Vec<_>>().join(" "));
        }

        Ok(self.config.default_response.clone())
    }
}

macro_rules! mock_builder {
    ($ty:ident) => {
        impl $ty {
            pub fn new() -> Self {
                Self {
                    core: MockCore::default(),
                }
            }

            /// Set the response returned when no mapping matches.
            pub fn with_fixed_response(mut self, response: impl Into<String>) -> Self {
                Arc::make_mut(&mut self.core.config).default_response = response.into();
                self
            }

            /// Return `output` whenever the input contains `needle`.
            pub fn with_response_mapping(
                mut self,
                needle: impl Into<String>,
                output: impl Into<String>,
            ) -> Self {
                Arc::make_mut(&mut self.core.config)
                    .mappings
                    .push((needle.into(), output.into()));
                self
            }

            /// Answer with the first `words` words of the input.
            pub fn with_echo(mut self, words: usize) -> Self {
                Arc::make_mut(&mut self.core.config).echo_words = Some(words);
                self
            }

            /// Set simulated latency for every call.
            pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
                Arc::make_mut(&mut self.core.config).latency_ms = latency_ms;
                self
            }

            /// Fail the first `n` calls, then answer normally.
            pub fn with_fail_first(mut self, n: u32) -> Self {
                Arc::make_mut(&mut self.core.config).fail_first = n;
                self
            }

            /// Fail every call.
            pub fn failing(mut self) -> Self {
                Arc::make_mut(&mut self.core.config).always_fail = true;
                self
            }

            /// Get all logged calls for assertion.
            pub fn get_calls(&self) -> Vec<MockCall> {
                self.core.log().clone()
            }

            pub fn call_count(&self) -> usize {
                self.core.log().len()
            }
        }

        impl Default for $ty {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

/// Mock naming service.
#[derive(Clone)]
pub struct MockNameGenerator {
    core: MockCore,
}

mock_builder!(MockNameGenerator);

#[async_trait]
impl NameGenerator for MockNameGenerator {
    async fn generate_name(&self, request: &NamingRequest) -> Result<NamingResponse> {
        let candidate_name = self
            .core
            .respond("generate_name", &request.normalized_text)
            .await?;
        Ok(NamingResponse { candidate_name })
    }

    fn model_name(&self) -> &str {
        "mock-namer"
    }
}

/// Mock text generation backend.
#[derive(Clone)]
pub struct MockGenerationBackend {
    core: MockCore,
}

mock_builder!(MockGenerationBackend);

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.core.respond("generate", prompt).await
    }

    async fn generate_with_system(&self, _system: &str, prompt: &str) -> Result<String> {
        self.core.respond("generate", prompt).await
    }

    fn model_name(&self) -> &str {
        "mock-gen"
    }
}

/// Mock vision backend. The input logged for each call is the MIME type.
#[derive(Clone)]
pub struct MockVisionBackend {
    core: MockCore,
}

mock_builder!(MockVisionBackend);

#[async_trait]
impl VisionBackend for MockVisionBackend {
    async fn describe_image(
        &self,
        _image_data: &[u8],
        mime_type: &str,
        _prompt: Option<&str>,
    ) -> Result<String> {
        self.core.respond("describe_image", mime_type).await
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(!self.core.config.always_fail)
    }

    fn model_name(&self) -> &str {
        "mock-vision"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_response() {
        let namer = MockNameGenerator::new().with_fixed_response("Invoice");
        let response = namer
            .generate_name(&NamingRequest::new("anything", 80))
            .await
            .unwrap();
        assert_eq!(response.candidate_name, "Invoice");
        assert_eq!(namer.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mapping_wins_over_default() {
        let namer = MockNameGenerator::new()
            .with_fixed_response("Default")
            .with_response_mapping("Q3", "Q3 Financial Summary");
        let mapped = namer
            .generate_name(&NamingRequest::new("Q3 numbers", 80))
            .await
            .unwrap();
        let default = namer
            .generate_name(&NamingRequest::new("other", 80))
            .await
            .unwrap();
        assert_eq!(mapped.candidate_name, "Q3 Financial Summary");
        assert_eq!(default.candidate_name, "Default");
    }

    #[tokio::test]
    async fn test_echo() {
        let namer = MockNameGenerator::new().with_echo(3);
        let response = namer
            .generate_name(&NamingRequest::new("one two three four five", 80))
            .await
            .unwrap();
        assert_eq!(response.candidate_name, "one two three");
    }

    #[tokio::test]
    async fn test_fail_first_then_succeed() {
        let backend = MockGenerationBackend::new()
            .with_fixed_response("ok")
            .with_fail_first(1);
        assert!(backend.generate("x").await.is_err());
        assert_eq!(backend.generate("x").await.unwrap(), "ok");
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_clones_share_call_log() {
        let vision = MockVisionBackend::new().with_fixed_response("A red bicycle");
        let clone = vision.clone();
        let description = clone.describe_image(b"bytes", "image/png", None).await.unwrap();
        assert_eq!(description, "A red bicycle");
        assert_eq!(vision.get_calls()[0].input, "image/png");
    }

    #[tokio::test]
    async fn test_failing_vision_reports_unhealthy() {
        let vision = MockVisionBackend::new().failing();
        assert!(!vision.health_check().await.unwrap());
        assert!(vision.describe_image(b"", "image/png", None).await.is_err());
    }
}
