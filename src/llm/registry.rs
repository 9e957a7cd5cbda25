//! Registry of the two provider adapters

use super::ollama::DEFAULT_OLLAMA_MODEL;
use super::openai::DEFAULT_OPENAI_MODEL;
use super::{LlmError, LlmService, LoggingService, OllamaService, OpenAIService, Provider};
use std::collections::HashMap;
use std::sync::Arc;

/// Configuration for LLM providers
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    /// Ollama server base URL (e.g., `http://127.0.0.1:11434`)
    pub ollama_base_url: Option<String>,
    pub ollama_model: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_model: Option<String>,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        Self {
            ollama_base_url: std::env::var("OLLAMA_BASE_URL")
                .or_else(|_| std::env::var("OLLAMA_URL"))
                .ok()
                .filter(|url| !url.trim().is_empty()),
            ollama_model: std::env::var("OLLAMA_MODEL").ok(),
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
            openai_model: std::env::var("OPENAI_MODEL").ok(),
        }
    }
}

/// Adapters keyed by provider.
///
/// A provider whose adapter failed to start stays registered as unavailable;
/// every request to it fails with the startup error.
pub struct ProviderRegistry {
    services: HashMap<Provider, Arc<dyn LlmService>>,
    unavailable: HashMap<Provider, LlmError>,
}

impl ProviderRegistry {
    pub fn new(config: &LlmConfig) -> Self {
        let mut registry = Self::new_empty();

        registry.register_result(
            Provider::Ollama,
            OllamaService::new(
                config.ollama_base_url.as_deref(),
                config
                    .ollama_model
                    .clone()
                    .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
            )
            .map(|s| Arc::new(s) as Arc<dyn LlmService>),
        );

        registry.register_result(
            Provider::OpenAI,
            OpenAIService::new(
                config.openai_api_key.as_deref(),
                config
                    .openai_model
                    .clone()
                    .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            )
            .map(|s| Arc::new(s) as Arc<dyn LlmService>),
        );

        registry
    }

    /// Create an empty registry for testing purposes
    pub fn new_empty() -> Self {
        Self {
            services: HashMap::new(),
            unavailable: HashMap::new(),
        }
    }

    fn register_result(
        &mut self,
        provider: Provider,
        result: Result<Arc<dyn LlmService>, LlmError>,
    ) {
        match result {
            Ok(service) => self.register(service),
            Err(e) => {
                tracing::warn!(provider = %provider, error = %e, "Provider adapter unavailable");
                self.services.remove(&provider);
                self.unavailable.insert(provider, e);
            }
        }
    }

    /// Register a service, wrapped with logging
    pub fn register(&mut self, service: Arc<dyn LlmService>) {
        let provider = service.provider();
        self.unavailable.remove(&provider);
        self.services
            .insert(provider, Arc::new(LoggingService::new(service)));
    }

    /// Get the adapter for a provider
    pub fn get(&self, provider: Provider) -> Result<Arc<dyn LlmService>, LlmError> {
        if let Some(service) = self.services.get(&provider) {
            return Ok(service.clone());
        }
        Err(self.unavailable.get(&provider).cloned().unwrap_or_else(|| {
            LlmError::transport(format!("No adapter registered for {provider}"))
        }))
    }

    pub fn is_available(&self, provider: Provider) -> bool {
        self.services.contains_key(&provider)
    }

    /// Default model for each available provider
    pub fn available_models(&self) -> Vec<(Provider, String)> {
        let mut models: Vec<_> = self
            .services
            .iter()
            .map(|(p, s)| (*p, s.default_model().to_string()))
            .collect();
        models.sort_by_key(|(p, _)| p.as_str());
        models
    }
}
