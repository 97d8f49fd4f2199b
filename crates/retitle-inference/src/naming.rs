//! LLM-backed naming service.
//!
//! Wraps any [`GenerationBackend`] with the naming prompt and turns the
//! model's free-form reply into a bare candidate name.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use retitle_core::{GenerationBackend, NameGenerator, NamingRequest, NamingResponse, Result};

/// Labels small models like to prefix their answer with.
const ANSWER_LABELS: &[&str] = &[
    "suggested file name",
    "suggested filename",
    "suggested name",
    "file name",
    "filename",
    "name",
    "title",
];

/// Build the system prompt for a name of at most `max_length` characters.
pub fn system_prompt(max_length: usize) -> String {
    format!(
        "You are an expert in generating file names based on the content provided. \
         Read the content and respond with a concise and descriptive file name that \
         is no longer than {} characters. Do not include any personal or sensitive \
         information. Do not include the file extension; provide only the file name.",
        max_length
    )
}

fn user_prompt(text: &str) -> String {
    format!("Content:\n{}\n\nFile name:", text)
}

/// Naming service backed by a text generation model.
#[derive(Clone)]
pub struct LlmNameGenerator {
    backend: Arc<dyn GenerationBackend>,
}

impl LlmNameGenerator {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl NameGenerator for LlmNameGenerator {
    #[instrument(skip(self, request), fields(subsystem = "inference", component = "namer", op = "generate_name", model = %self.backend.model_name(), prompt_len = request.normalized_text.len()))]
    async fn generate_name(&self, request: &NamingRequest) -> Result<NamingResponse> {
        let raw = self
            .backend
            .generate_with_system(
                &system_prompt(request.max_length),
                &user_prompt(&request.normalized_text),
            )
            .await?;
        let candidate_name = clean_candidate(&raw, request.max_length);
        debug!(
            response_len = raw.len(),
            candidate = %candidate_name,
            "Cleaned model response"
        );
        Ok(NamingResponse { candidate_name })
    }

    fn model_name(&self) -> &str {
        self.backend.model_name()
    }
}

/// Reduce a model reply to a bare name.
///
/// Drops `<think>` blocks, takes the first non-empty line, strips answer
/// labels, quotes, and emphasis, cuts at the first period (which also drops
/// any extension the model added), and bounds the length. May return an
/// empty string; callers treat that as an empty result.
pub fn clean_candidate(raw: &str, max_length: usize) -> String {
    let answer = strip_thinking(raw);
    let line = answer
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("");

    let line = strip_decoration(line);
    let line = strip_label(line);
    let line = strip_decoration(line);

    let line = match line.find('.') {
        Some(idx) => &line[..idx],
        None => line,
    };
    let line = strip_decoration(line.trim());

    truncate_at_word(line, max_length)
}

/// Remove `<think>...</think>` blocks. An unclosed block swallows the rest.
fn strip_thinking(response: &str) -> String {
    let mut answer = String::new();
    let mut rest = response;
    while let Some(start) = rest.find("<think>") {
        answer.push_str(&rest[..start]);
        let after = &rest[start + "<think>".len()..];
        match after.find("</think>") {
            Some(end) => rest = &after[end + "</think>".len()..],
            None => {
                rest = "";
                break;
            }
        }
    }
    answer.push_str(rest);
    answer
}

fn strip_decoration(s: &str) -> &str {
    s.trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '*' | '_' | '#') || c.is_whitespace())
}

fn strip_label(line: &str) -> &str {
    for label in ANSWER_LABELS {
        let matches = line
            .get(..label.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(label));
        if matches {
            let rest = line[label.len()..].trim_start();
            if let Some(value) = rest.strip_prefix(':') {
                return value.trim_start();
            }
        }
    }
    line
}

fn truncate_at_word(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let cut: String = s.chars().take(max_chars).collect();
    match cut.rfind(char::is_whitespace) {
        Some(idx) if idx > 0 => cut[..idx].trim_end().to_string(),
        _ => cut,
    }
}
