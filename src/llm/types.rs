//! Common types for LLM interactions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Backend that produces a turn
///
/// `Ollama` is the self-hosted model server, `OpenAI` the cloud completion API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Ollama,
    OpenAI,
}

impl Provider {
    /// Provider that opens every conversation
    pub fn first() -> Self {
        Provider::Ollama
    }

    /// Provider that speaks after this one
    pub fn alternate(self) -> Self {
        match self {
            Provider::Ollama => Provider::OpenAI,
            Provider::OpenAI => Provider::Ollama,
        }
    }

    /// One-shot fallback used when this provider returns empty text
    pub fn fallback(self) -> Option<Self> {
        match self {
            Provider::Ollama => Some(Provider::OpenAI),
            Provider::OpenAI => None,
        }
    }

    /// Sampling temperature derived from the tone level
    pub fn temperature(self, tone: f32) -> f32 {
        let t = tone.clamp(0.0, 1.0);
        match self {
            Provider::Ollama => 0.30 + t * 0.45,
            Provider::OpenAI => 0.15 + t * 0.35,
        }
    }

    /// Wire name
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Ollama => "ollama",
            Provider::OpenAI => "openai",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Provider::Ollama),
            "openai" => Ok(Provider::OpenAI),
            other => Err(format!("Invalid provider: {other}")),
        }
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// Role-tagged message sent to a backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Completion request
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    /// Backend default when `None`
    pub model: Option<String>,
    /// Backend default when `None`
    pub temperature: Option<f32>,
}

/// Plain-text completion result
///
/// An empty `text` is the soft-fail signal; `warning` says why.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub text: String,
    pub model: String,
    pub warning: Option<String>,
}

impl Completion {
    pub fn text(model: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: model.into(),
            warning: None,
        }
    }

    pub fn soft_fail(model: impl Into<String>, warning: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            model: model.into(),
            warning: Some(warning.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}
