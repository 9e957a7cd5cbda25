//! Self-hosted Ollama provider
//!
//! Never fails hard: an unreachable, misconfigured, or erroring server yields
//! empty text with a warning so the caller can fall back to the cloud backend.

use super::types::{ChatMessage, Completion, CompletionRequest, Provider};
use super::{LlmError, LlmService};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2:3b";
const DEFAULT_TEMPERATURE: f32 = 0.4;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

const WARN_NOT_CONFIGURED: &str = "Ollama not configured on this deployment. Fallback to OpenAI.";
const WARN_UNREACHABLE: &str = "Ollama unreachable. Fallback to OpenAI.";

/// Ollama chat service
pub struct OllamaService {
    client: Client,
    /// `None` when no base URL is configured
    endpoint: Option<String>,
    model: String,
}

impl OllamaService {
    pub fn new(base_url: Option<&str>, model: impl Into<String>) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LlmError::transport(format!("Failed to create HTTP client: {e}")))?;

        let endpoint = base_url
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(|url| format!("{}/api/chat", url.trim_end_matches('/')));

        Ok(Self {
            client,
            endpoint,
            model: model.into(),
        })
    }
}

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[async_trait]
impl LlmService for OllamaService {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        let model = request.model.as_deref().unwrap_or(&self.model);

        let Some(endpoint) = &self.endpoint else {
            tracing::warn!("Ollama not configured (missing OLLAMA_BASE_URL), returning empty text");
            return Ok(Completion::soft_fail(model, WARN_NOT_CONFIGURED));
        };

        let body = OllamaRequest {
            model,
            messages: &request.messages,
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            },
        };

        let response = match self.client.post(endpoint).json(&body).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, url = %endpoint, "Ollama fetch failed, returning empty text");
                return Ok(Completion::soft_fail(model, WARN_UNREACHABLE));
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Ollama HTTP error, returning empty text");
            return Ok(Completion::soft_fail(
                model,
                format!("Ollama HTTP {}. Fallback to OpenAI.", status.as_u16()),
            ));
        }

        let raw = match response.text().await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read Ollama body, returning empty text");
                return Ok(Completion::soft_fail(model, WARN_UNREACHABLE));
            }
        };

        Ok(Completion::text(model, decode_body(&raw)))
    }

    fn provider(&self) -> Provider {
        Provider::Ollama
    }

    fn default_model(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Body decoding
// ============================================================================

/// A line of a multi-fragment body that is not a JSON value
#[derive(Debug, Error)]
#[error("malformed fragment: {0}")]
pub struct MalformedFragment(String);

/// Decode a response body into trimmed text.
///
/// The body is either one JSON object or newline-delimited JSON fragments
/// whose texts are concatenated.
pub fn decode_body(raw: &str) -> String {
    let text = match serde_json::from_str::<Value>(raw) {
        Ok(value) => extract_text(&value).to_string(),
        Err(_) => decode_fragments(raw),
    };
    text.trim().to_string()
}

/// Concatenate the text of every well-formed fragment, skipping the rest
pub fn decode_fragments(raw: &str) -> String {
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_fragment)
        .filter_map(|fragment| match fragment {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping malformed Ollama fragment");
                None
            }
        })
        .collect()
}

fn parse_fragment(line: &str) -> Result<String, MalformedFragment> {
    let value: Value =
        serde_json::from_str(line).map_err(|e| MalformedFragment(e.to_string()))?;
    Ok(extract_text(&value).to_string())
}

/// Text field of a chat payload: `message.content`, then `response`, then `text`
fn extract_text(value: &Value) -> &str {
    value
        .pointer("/message/content")
        .and_then(Value::as_str)
        .or_else(|| value.get("response").and_then(Value::as_str))
        .or_else(|| value.get("text").and_then(Value::as_str))
        .unwrap_or("")
}
