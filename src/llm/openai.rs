//! `OpenAI` chat completions provider
//!
//! Unlike the self-hosted backend, every failure here is a hard error.

use super::types::{ChatMessage, Completion, CompletionRequest, Provider};
use super::{LlmError, LlmErrorKind, LlmService};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_TEMPERATURE: f32 = 0.4;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// `OpenAI` chat service
pub struct OpenAIService {
    client: Client,
    api_key: String,
    url: String,
    model: String,
}

impl OpenAIService {
    /// Fails when the credential is missing; the adapter is then unavailable.
    pub fn new(api_key: Option<&str>, model: impl Into<String>) -> Result<Self, LlmError> {
        Self::with_url(api_key, model, CHAT_COMPLETIONS_URL)
    }

    pub(crate) fn with_url(
        api_key: Option<&str>,
        model: impl Into<String>,
        url: impl Into<String>,
    ) -> Result<Self, LlmError> {
        let api_key = api_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| LlmError::auth("Missing OPENAI_API_KEY"))?;

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LlmError::transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            url: url.into(),
            model: model.into(),
        })
    }

    fn normalize_response(resp: OpenAIResponse) -> String {
        resp.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default()
            .trim()
            .to_string()
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIErrorBody,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorBody {
    message: String,
}

#[async_trait]
impl LlmService for OpenAIService {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        let model = request.model.as_deref().unwrap_or(&self.model);
        let body = OpenAIRequest {
            model,
            messages: &request.messages,
            temperature: request.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        };

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::transport(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    LlmError::transport(format!("Connection failed: {e}"))
                } else {
                    LlmError::transport(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::transport(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let code = status.as_u16();
            let message = serde_json::from_str::<OpenAIErrorResponse>(&body)
                .map_or(body, |resp| resp.error.message);
            return Err(match LlmErrorKind::from_status(code) {
                LlmErrorKind::Auth => LlmError::auth(format!("Authentication failed: {message}")),
                LlmErrorKind::RateLimit => {
                    LlmError::rate_limit(format!("Rate limit exceeded: {message}"))
                }
                LlmErrorKind::ServerError => {
                    LlmError::server_error(format!("Server error: {message}"))
                }
                _ => LlmError::http(code, format!("HTTP {code}: {message}")),
            });
        }

        let parsed: OpenAIResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::decode(format!("Failed to parse response: {e}")))?;

        Ok(Completion::text(model, Self::normalize_response(parsed)))
    }

    fn provider(&self) -> Provider {
        Provider::OpenAI
    }

    fn default_model(&self) -> &str {
        &self.model
    }
}
