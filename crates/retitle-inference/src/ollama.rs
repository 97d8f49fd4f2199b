//! Ollama generation backend.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use retitle_core::defaults;
use retitle_core::{Error, GenerationBackend, Result};

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = defaults::OLLAMA_URL;

/// Default generation model.
pub const DEFAULT_GEN_MODEL: &str = defaults::GEN_MODEL;

/// Generation calls slower than this are logged as slow.
const SLOW_GENERATION_MS: u64 = 30_000;

/// Ollama generation backend using the `/api/chat` endpoint.
pub struct OllamaBackend {
    client: Client,
    base_url: String,
    gen_model: String,
    gen_timeout_secs: u64,
}

impl OllamaBackend {
    /// Create a new Ollama backend with default settings.
    pub fn new() -> Self {
        Self::with_config(DEFAULT_OLLAMA_URL.to_string(), DEFAULT_GEN_MODEL.to_string())
    }

    /// Create a new Ollama backend with custom configuration.
    pub fn with_config(base_url: String, gen_model: String) -> Self {
        let gen_timeout_secs = std::env::var(defaults::ENV_GEN_TIMEOUT_SECS)
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::GEN_TIMEOUT_SECS);

        info!(
            subsystem = "inference",
            component = "ollama",
            "Initializing Ollama backend: url={}, gen={}",
            base_url,
            gen_model
        );

        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            gen_model,
            gen_timeout_secs,
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> Self {
        let base_url = std::env::var(defaults::ENV_OLLAMA_BASE)
            .unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string());
        let gen_model = std::env::var(defaults::ENV_OLLAMA_GEN_MODEL)
            .ok()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_GEN_MODEL.to_string());

        Self::with_config(base_url, gen_model)
    }

    /// Override the HTTP timeout of a single generation request.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.gen_timeout_secs = secs;
        self
    }

    /// Set the generation model to use.
    pub fn set_gen_model(&mut self, model_name: String) {
        info!(
            "Switching generation model from {} to {}",
            self.gen_model, model_name
        );
        self.gen_model = model_name;
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if the Ollama server is reachable.
    pub async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await;

        match response {
            Ok(resp) => {
                if resp.status().is_success() {
                    info!("Ollama health check passed");
                    Ok(true)
                } else {
                    warn!("Ollama health check failed: {}", resp.status());
                    Ok(false)
                }
            }
            Err(e) => {
                warn!("Ollama health check error: {}", e);
                Ok(false)
            }
        }
    }

    async fn chat(&self, system: &str, prompt: &str) -> Result<String> {
        let start = Instant::now();

        let mut messages = Vec::new();
        if !system.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        // Naming needs a short answer, not a reasoning trace.
        let request = ChatRequest {
            model: self.gen_model.clone(),
            messages,
            stream: false,
            think: Some(false),
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .timeout(Duration::from_secs(self.gen_timeout_secs))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response: {}", e)))?;

        let content = result.message.content;
        let elapsed = start.elapsed().as_millis() as u64;
        debug!(
            response_len = content.len(),
            duration_ms = elapsed,
            "Generation complete"
        );
        if elapsed > SLOW_GENERATION_MS {
            warn!(
                duration_ms = elapsed,
                prompt_len = prompt.len(),
                slow = true,
                "Slow generation operation"
            );
        }
        Ok(content)
    }
}

impl Default for OllamaBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Chat API message for `/api/chat`.
#[derive(Serialize, Deserialize, Clone)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Request payload for the Ollama `/api/chat` endpoint.
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    /// Disable thinking for models that support it (e.g. qwen3).
    #[serde(skip_serializing_if = "Option::is_none")]
    think: Option<bool>,
}

/// Response from the Ollama `/api/chat` endpoint.
#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with_system("", prompt).await
    }

    #[instrument(skip(self, system, prompt), fields(subsystem = "inference", component = "ollama", op = "generate", model = %self.gen_model, prompt_len = prompt.len()))]
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.chat(system, prompt).await
    }

    fn model_name(&self) -> &str {
        &self.gen_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_constants() {
        assert_eq!(DEFAULT_OLLAMA_URL, "http://127.0.0.1:11434");
        assert_eq!(DEFAULT_GEN_MODEL, "qwen2.5:1.5b");
    }

    #[test]
    fn test_custom_config_trims_trailing_slash() {
        let backend =
            OllamaBackend::with_config("http://custom:1234/".to_string(), "llama3".to_string());
        assert_eq!(backend.base_url(), "http://custom:1234");
        assert_eq!(backend.model_name(), "llama3");
    }

    #[test]
    fn test_with_timeout_secs() {
        let backend = OllamaBackend::new().with_timeout_secs(7);
        assert_eq!(backend.gen_timeout_secs, 7);
    }

    #[test]
    fn test_set_gen_model() {
        let mut backend = OllamaBackend::new();
        backend.set_gen_model("phi3".to_string());
        assert_eq!(backend.model_name(), "phi3");
    }

    #[test]
    fn test_chat_request_serialization() {
        let request = ChatRequest {
            model: "m".to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: "hi".to_string(),
            }],
            stream: false,
            think: Some(false),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "m");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["stream"], false);
        assert_eq!(json["think"], false);
    }

    #[test]
    fn test_chat_response_deserialization() {
        let json = r#"{"model":"m","message":{"role":"assistant","content":"Invoice"},"done":true}"#;
        let response: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.message.content, "Invoice");
    }
}
