//! Trait abstractions for runtime I/O
//!
//! These traits let the orchestration loop and reveal engine run against
//! mock backends and a logical clock in tests.

use super::SseEvent;
use crate::llm::{Completion, CompletionRequest, LlmError, Provider, ProviderRegistry};
use crate::session::TurnId;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Client for making completion requests to either backend
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        provider: Provider,
        request: &CompletionRequest,
    ) -> Result<Completion, LlmError>;
}

/// Time source for reveal ticks, cue throttling and the inter-turn delay
#[async_trait]
pub trait Clock: Send + Sync {
    /// Monotonic time since the clock was created
    fn now(&self) -> Duration;

    async fn sleep(&self, duration: Duration);
}

/// Receiver of audio cues
pub trait CueSink: Send + Sync {
    fn cue(&self, volume: f32);
}

/// Destination of revealed text
#[async_trait]
pub trait RevealSink: Send + Sync {
    /// Append `chunk` to the revealed text of `turn_id`.
    ///
    /// Returns `false` when the chunk was not accepted; the reveal must stop.
    async fn append(&self, turn_id: TurnId, chunk: &str) -> bool;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: LlmClient + ?Sized> LlmClient for Arc<T> {
    async fn complete(
        &self,
        provider: Provider,
        request: &CompletionRequest,
    ) -> Result<Completion, LlmError> {
        (**self).complete(provider, request).await
    }
}

#[async_trait]
impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now(&self) -> Duration {
        (**self).now()
    }

    async fn sleep(&self, duration: Duration) {
        (**self).sleep(duration).await;
    }
}

impl<T: CueSink + ?Sized> CueSink for Arc<T> {
    fn cue(&self, volume: f32) {
        (**self).cue(volume);
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use `ProviderRegistry` as `LlmClient`
pub struct RegistryLlmClient {
    registry: Arc<ProviderRegistry>,
}

impl RegistryLlmClient {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl LlmClient for RegistryLlmClient {
    async fn complete(
        &self,
        provider: Provider,
        request: &CompletionRequest,
    ) -> Result<Completion, LlmError> {
        let service = self.registry.get(provider)?;
        service.complete(request).await
    }
}

/// Wall clock backed by tokio timers
pub struct TokioClock {
    started: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            started: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.started.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Forwards cues to SSE clients, which play the tick
pub struct BroadcastCueSink {
    broadcast_tx: broadcast::Sender<SseEvent>,
}

impl BroadcastCueSink {
    pub fn new(broadcast_tx: broadcast::Sender<SseEvent>) -> Self {
        Self { broadcast_tx }
    }
}

impl CueSink for BroadcastCueSink {
    fn cue(&self, volume: f32) {
        // No subscribers is fine
        let _ = self.broadcast_tx.send(SseEvent::Cue { volume });
    }
}
