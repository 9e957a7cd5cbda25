//! API request and response types

use crate::llm::{ChatMessage, Provider};
use crate::state_machine::SessionStatus;
use serde::{Deserialize, Serialize};

/// Request at the adapter boundary
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// Parsed by the handler so an unknown name is a 400, not a rejection
    pub provider: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
}

/// Plain-text completion
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub trace: String,
    pub provider: Provider,
    pub model: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Response for session commands
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: SessionStatus,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            trace: None,
            error: error.into(),
        }
    }

    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }
}
