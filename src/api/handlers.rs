//! HTTP request handlers

use super::assets::{serve_page, serve_static};
use super::sse::sse_stream;
use super::types::{ChatRequest, ChatResponse, ErrorResponse, StatusResponse};
use super::AppState;
use crate::llm::{trace_id, CompletionRequest, Provider};
use crate::runtime::SseEvent;
use crate::session::SessionSnapshot;
use crate::settings::{SettingsUpdate, StyleParams};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Chat page and its assets
        .route("/", get(serve_page))
        .route("/assets/*path", get(serve_static))
        // Session
        .route("/api/session", get(get_session))
        .route("/api/session/stream", get(stream_session))
        .route("/api/session/start", post(start_session))
        .route("/api/session/stop", post(stop_session))
        .route("/api/session/clear", post(clear_session))
        // Style parameters
        .route("/api/settings", get(get_settings).post(update_settings))
        // Adapter boundary
        .route("/api/chat", post(chat))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Session
// ============================================================

async fn get_session(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.sessions.snapshot().await)
}

async fn stream_session(State(state): State<AppState>) -> impl IntoResponse {
    // Subscribe before the snapshot so nothing falls between the two
    let broadcast_rx = state.sessions.subscribe();
    let snapshot = state.sessions.snapshot().await;
    sse_stream(SseEvent::Init { snapshot }, broadcast_rx)
}

async fn start_session(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: state.sessions.start().await,
    })
}

async fn stop_session(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: state.sessions.stop().await,
    })
}

async fn clear_session(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: state.sessions.clear().await,
    })
}

// ============================================================
// Settings
// ============================================================

async fn get_settings(State(state): State<AppState>) -> Json<StyleParams> {
    Json(state.sessions.settings().await)
}

async fn update_settings(
    State(state): State<AppState>,
    Json(update): Json<SettingsUpdate>,
) -> Json<StyleParams> {
    Json(state.sessions.update_settings(&update).await)
}

// ============================================================
// Adapter boundary
// ============================================================

async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let trace = trace_id();

    let Json(req) = body.map_err(|e| {
        tracing::debug!(trace = %trace, error = %e, "Malformed chat request");
        AppError::BadRequest(ErrorResponse::new(e.body_text()).with_trace(&trace))
    })?;

    let provider: Provider = req
        .provider
        .parse()
        .map_err(|e: String| AppError::BadRequest(ErrorResponse::new(e).with_trace(&trace)))?;

    let service = state
        .registry
        .get(provider)
        .map_err(|e| AppError::Internal(ErrorResponse::new(e.message).with_trace(&trace)))?;

    let request = CompletionRequest {
        messages: req.messages,
        model: req.model,
        temperature: req.temperature,
    };

    let completion = service.complete(&request).await.map_err(|e| {
        tracing::error!(trace = %trace, provider = %provider, error = %e, "Chat request failed");
        AppError::Internal(ErrorResponse::new(e.message).with_trace(&trace))
    })?;

    Ok(Json(ChatResponse {
        trace,
        provider,
        model: completion.model,
        text: completion.text,
        warning: completion.warning,
    }))
}

async fn get_version() -> &'static str {
    concat!("crosstalk ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

enum AppError {
    BadRequest(ErrorResponse),
    Internal(ErrorResponse),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::BadRequest(body) => (StatusCode::BAD_REQUEST, body),
            AppError::Internal(body) => (StatusCode::INTERNAL_SERVER_ERROR, body),
        };

        (status, Json(body)).into_response()
    }
}
