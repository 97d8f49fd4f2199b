//! Integration tests for the Ollama backends against a mock HTTP server.
//!
//! Verifies request shape for `/api/chat` and `/api/generate`, response
//! cleanup into a candidate name, and error surfacing on non-2xx replies.

#![cfg(feature = "ollama")]

use std::sync::Arc;

use retitle_core::{GenerationBackend, NameGenerator, NamingRequest};
use retitle_inference::{LlmNameGenerator, OllamaBackend, OllamaVisionBackend, VisionBackend};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn chat_reply(content: &str) -> serde_json::Value {
    serde_json::json!({
        "model": "test-gen",
        "created_at": "2026-01-01T00:00:00Z",
        "message": { "role": "assistant", "content": content },
        "done": true
    })
}

#[tokio::test]
async fn test_name_generator_cleans_chat_reply() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(serde_json::json!({
            "model": "test-gen",
            "stream": false
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_reply("Filename: \"Q3 Financial Summary.txt\"\nThis name fits.")),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let backend = OllamaBackend::with_config(mock_server.uri(), "test-gen".to_string());
    let namer = LlmNameGenerator::new(Arc::new(backend));

    let response = namer
        .generate_name(&NamingRequest::new("Revenue for Q3 was strong.", 80))
        .await
        .expect("naming should succeed");

    assert_eq!(response.candidate_name, "Q3 Financial Summary");
    assert_eq!(namer.model_name(), "test-gen");
}

#[tokio::test]
async fn test_chat_request_carries_system_prompt_and_content() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply("Invoice")))
        .mount(&mock_server)
        .await;

    let backend = OllamaBackend::with_config(mock_server.uri(), "test-gen".to_string());
    let namer = LlmNameGenerator::new(Arc::new(backend));
    namer
        .generate_name(&NamingRequest::new("Invoice #42 from ACME", 20))
        .await
        .unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages[0]["role"], "system");
    assert!(messages[0]["content"]
        .as_str()
        .unwrap()
        .contains("no longer than 20 characters"));
    assert_eq!(messages[1]["role"], "user");
    assert!(messages[1]["content"]
        .as_str()
        .unwrap()
        .contains("Invoice #42 from ACME"));
}

#[tokio::test]
async fn test_server_error_is_inference_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
        .mount(&mock_server)
        .await;

    let backend = OllamaBackend::with_config(mock_server.uri(), "test-gen".to_string());
    let err = backend.generate("hello").await.unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("500"), "unexpected error: {}", msg);
    assert!(msg.contains("model not loaded"));
}

#[tokio::test]
async fn test_health_check_against_tags_endpoint() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"models": []})))
        .mount(&mock_server)
        .await;

    let backend = OllamaBackend::with_config(mock_server.uri(), "test-gen".to_string());
    assert!(backend.health_check().await.unwrap());
}

#[tokio::test]
async fn test_vision_backend_sends_base64_image() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(serde_json::json!({
            "model": "llava",
            "images": ["AQID"]
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"response": "A sunset over the sea"})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let vision = OllamaVisionBackend::new(mock_server.uri(), "llava".to_string());
    let description = vision
        .describe_image(&[1, 2, 3], "image/png", None)
        .await
        .unwrap();
    assert_eq!(description, "A sunset over the sea");
}
