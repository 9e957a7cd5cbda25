//! crosstalk - two language models in a scripted back-and-forth
//!
//! Serves a chat page that renders the exchange with a typewriter reveal,
//! and runs the turn-taking loop between a self-hosted Ollama server and the
//! OpenAI API.

mod api;
mod llm;
mod reveal;
mod runtime;
mod session;
mod settings;
mod state_machine;
mod turn_builder;

use api::{create_router, AppState};
use llm::{LlmConfig, Provider, ProviderRegistry};
use runtime::ProductionManager;
use settings::StyleParams;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use turn_builder::TurnBuilder;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crosstalk=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let port: u16 = std::env::var("CROSSTALK_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);

    let builder = TurnBuilder::from_env();
    tracing::info!(
        scenario_chars = builder.scenario().chars().count(),
        "Scenario loaded"
    );

    // Initialize provider registry
    let llm_config = LlmConfig::from_env();
    let registry = Arc::new(ProviderRegistry::new(&llm_config));

    tracing::info!(
        models = ?registry.available_models(),
        ollama = registry.is_available(Provider::Ollama),
        openai = registry.is_available(Provider::OpenAI),
        "Provider registry initialized"
    );
    if !registry.is_available(Provider::OpenAI) {
        tracing::warn!("OPENAI_API_KEY not set. OpenAI turns and the Ollama fallback will fail.");
    }

    let sessions = Arc::new(ProductionManager::production(
        registry.clone(),
        builder,
        StyleParams::default(),
    ));

    // Create application state
    let state = AppState::new(sessions.clone(), registry);

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(compression);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("crosstalk server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Open event streams never end on their own, so the server is dropped
    // rather than drained
    tokio::select! {
        result = axum::serve(listener, app).into_future() => result?,
        () = shutdown_signal() => {
            sessions.shutdown().await;
            tracing::info!("Server stopped");
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
