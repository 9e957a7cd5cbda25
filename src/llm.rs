//! LLM provider abstraction
//!
//! Both backends sit behind one `complete(messages, model, temperature) -> text`
//! contract. The self-hosted adapter soft-fails with empty text; the cloud
//! adapter fails hard.

mod error;
mod ollama;
mod openai;
mod registry;
mod types;


pub use error::{LlmError, LlmErrorKind};
pub use ollama::OllamaService;
pub use openai::OpenAIService;
pub use registry::{LlmConfig, ProviderRegistry};
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;

/// Common interface for LLM providers
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Make a completion request
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError>;

    /// Backend this service talks to
    fn provider(&self) -> Provider;

    /// Model used when the request does not name one
    fn default_model(&self) -> &str;
}

/// Logging wrapper for LLM services
pub struct LoggingService {
    inner: Arc<dyn LlmService>,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn LlmService>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl LlmService for LoggingService {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        let trace = trace_id();
        let provider = self.inner.provider();
        let model = request
            .model
            .as_deref()
            .unwrap_or_else(|| self.inner.default_model());
        let last = request.messages.last().map_or("", |m| m.content.as_str());

        tracing::info!(
            trace = %trace,
            provider = %provider,
            model = %model,
            temperature = ?request.temperature,
            msgs = request.messages.len(),
            last = %safe_preview(last, 120),
            "LLM request"
        );

        let start = std::time::Instant::now();
        let result = self.inner.complete(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(completion) => {
                tracing::info!(
                    trace = %trace,
                    provider = %provider,
                    model = %completion.model,
                    duration_ms = %duration.as_millis(),
                    chars = completion.text.chars().count(),
                    warning = ?completion.warning,
                    "LLM request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    trace = %trace,
                    provider = %provider,
                    duration_ms = %duration.as_millis(),
                    kind = e.kind.label(),
                    error = %e.message,
                    "LLM request failed"
                );
            }
        }

        result
    }

    fn provider(&self) -> Provider {
        self.inner.provider()
    }

    fn default_model(&self) -> &str {
        self.inner.default_model()
    }
}

/// Short request id for correlating log lines
pub fn trace_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

/// Collapse whitespace and cut to `max` characters, marking the cut with `…`
pub fn safe_preview(s: &str, max: usize) -> String {
    let one_line = s.split_whitespace().collect::<Vec<_>>().join(" ");
    if one_line.chars().count() > max {
        let mut cut: String = one_line.chars().take(max).collect();
        cut.push('…');
        cut
    } else {
        one_line
    }
}
