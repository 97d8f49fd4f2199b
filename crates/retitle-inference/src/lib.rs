//! # retitle-inference
//!
//! Naming service backends for retitle.
//!
//! This crate provides:
//! - Ollama text generation backend (feature `ollama`, default)
//! - Ollama vision backend for describing images without text
//! - `LlmNameGenerator`: naming prompt and response cleanup over any
//!   generation backend
//! - Deterministic test doubles (feature `mock`)
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use retitle_inference::{LlmNameGenerator, OllamaBackend};
//! use retitle_core::{NameGenerator, NamingRequest};
//!
//! #[tokio::main]
//! async fn main() {
//!     let namer = LlmNameGenerator::new(Arc::new(OllamaBackend::from_env()));
//!     let response = namer
//!         .generate_name(&NamingRequest::new("Q3 revenue grew 12%...", 80))
//!         .await
//!         .unwrap();
//!     println!("{}", response.candidate_name);
//! }
//! ```

pub mod naming;
pub mod vision;

#[cfg(feature = "ollama")]
pub mod ollama;

// Mock backends for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(feature = "ollama")]
pub use ollama::OllamaBackend;

pub use naming::{clean_candidate, system_prompt, LlmNameGenerator};
pub use vision::{OllamaVisionBackend, VisionBackend, DEFAULT_VISION_PROMPT};
