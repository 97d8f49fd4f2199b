//! Vision backend for describing images that carry no readable text.

use async_trait::async_trait;
use retitle_core::defaults;
use retitle_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Prompt used when the caller does not supply one. Asks for a description
/// that is useful as naming input rather than an exhaustive caption.
pub const DEFAULT_VISION_PROMPT: &str = "Describe the main subject of this image in one or two \
sentences. Mention any text visible in the image.";

/// Backend for describing images using vision LLMs.
#[async_trait]
pub trait VisionBackend: Send + Sync {
    /// Describe an image, optionally with a custom prompt.
    async fn describe_image(
        &self,
        image_data: &[u8],
        mime_type: &str,
        prompt: Option<&str>,
    ) -> Result<String>;

    /// Check if the vision backend is available.
    async fn health_check(&self) -> Result<bool>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// Ollama-based vision backend (e.g. llava, qwen2.5vl).
pub struct OllamaVisionBackend {
    base_url: String,
    model: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl OllamaVisionBackend {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            client: reqwest::Client::new(),
            timeout_secs: defaults::VISION_TIMEOUT_SECS,
        }
    }

    /// Create from environment variables.
    /// Returns None if OLLAMA_VISION_MODEL is not set.
    pub fn from_env() -> Option<Self> {
        let model = std::env::var(defaults::ENV_OLLAMA_VISION_MODEL).ok()?;
        if model.is_empty() {
            return None;
        }
        let base_url = std::env::var(defaults::ENV_OLLAMA_BASE)
            .unwrap_or_else(|_| defaults::OLLAMA_URL.to_string());
        Some(Self::new(base_url, model))
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

#[derive(Serialize)]
struct OllamaGenerateRequest {
    model: String,
    prompt: String,
    images: Vec<String>, // base64 encoded
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

#[async_trait]
impl VisionBackend for OllamaVisionBackend {
    #[instrument(skip(self, image_data, prompt), fields(subsystem = "inference", component = "ollama_vision", op = "describe_image", model = %self.model, image_bytes = image_data.len()))]
    async fn describe_image(
        &self,
        image_data: &[u8],
        _mime_type: &str,
        prompt: Option<&str>,
    ) -> Result<String> {
        use base64::Engine;
        let image_b64 = base64::engine::general_purpose::STANDARD.encode(image_data);

        let request = OllamaGenerateRequest {
            model: self.model.clone(),
            prompt: prompt.unwrap_or(DEFAULT_VISION_PROMPT).to_string(),
            images: vec![image_b64],
            stream: false,
        };

        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .timeout(std::time::Duration::from_secs(self.timeout_secs))
            .send()
            .await
            .map_err(|e| Error::Inference(format!("Vision request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!(
                "Vision API returned {}: {}",
                status, body
            )));
        }

        let result: OllamaGenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse vision response: {}", e)))?;

        Ok(result.response)
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);
        match self
            .client
            .get(&url)
            .timeout(std::time::Duration::from_secs(5))
            .send()
            .await
        {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
