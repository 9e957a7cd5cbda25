//! HTTP API: session control, settings, the adapter boundary and the page

mod assets;
mod handlers;
mod sse;
mod types;

pub use handlers::create_router;

use crate::llm::ProviderRegistry;
use crate::runtime::ProductionManager;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<ProductionManager>,
    pub registry: Arc<ProviderRegistry>,
}

impl AppState {
    pub fn new(sessions: Arc<ProductionManager>, registry: Arc<ProviderRegistry>) -> Self {
        Self { sessions, registry }
    }
}
