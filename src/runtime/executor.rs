//! Orchestration loop
//!
//! One loop instance per run. The loop owns its running flag; every session
//! mutation re-checks that flag under the session lock, so a stopped or
//! cleared session never sees a late turn from a loop that has been
//! cancelled.

use super::traits::{Clock, CueSink, LlmClient, RevealSink};
use super::{SessionHub, SseEvent};

use crate::llm::{ChatMessage, Completion, CompletionRequest, LlmError, Provider};
use crate::reveal::{RevealEngine, RevealParams};
use crate::session::{Turn, TurnId};
use crate::settings::StyleParams;
use crate::state_machine::Event;
use crate::turn_builder::{TurnBuilder, STOP_SENTINEL};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Maximum characters kept from a reply
pub const MAX_TURN_CHARS: usize = 9000;

/// Longest pause between turns, whatever the settings say
pub const MAX_COOLDOWN: Duration = Duration::from_millis(5000);

/// Notice shown when a model returns the stop sentinel
pub const SAFETY_NOTICE: &str = "The session was stopped by content safety limits.";

/// Why a turn could not be produced
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TurnError {
    #[error("Empty response")]
    EmptyResponse,
    #[error("Stopped by content safety limits")]
    SafetyStop,
    #[error(transparent)]
    Provider(#[from] LlmError),
}

impl TurnError {
    /// Text of the terminal notice turn
    pub fn notice(&self) -> String {
        match self {
            TurnError::SafetyStop => SAFETY_NOTICE.to_string(),
            other => format!("ERROR: {other}"),
        }
    }
}

/// Validate and bound raw reply text
pub fn finalize_text(raw: &str) -> Result<String, TurnError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(TurnError::EmptyResponse);
    }
    if text.contains(STOP_SENTINEL) {
        return Err(TurnError::SafetyStop);
    }
    Ok(match text.char_indices().nth(MAX_TURN_CHARS) {
        Some((cut, _)) => text.get(..cut).unwrap_or(text).to_string(),
        None => text.to_string(),
    })
}

enum Step {
    Continue,
    Halt,
}

/// Orchestration loop, generic over its I/O seams
pub struct TurnLoop<L, C, K>
where
    L: LlmClient + 'static,
    C: Clock + 'static,
    K: CueSink + 'static,
{
    hub: Arc<SessionHub>,
    llm: Arc<L>,
    clock: Arc<C>,
    reveal: RevealEngine<C, K>,
    builder: Arc<TurnBuilder>,
    token: CancellationToken,
}

impl<L, C, K> TurnLoop<L, C, K>
where
    L: LlmClient + 'static,
    C: Clock + 'static,
    K: CueSink + 'static,
{
    pub fn new(
        hub: Arc<SessionHub>,
        llm: Arc<L>,
        clock: Arc<C>,
        cue: Arc<K>,
        builder: Arc<TurnBuilder>,
        token: CancellationToken,
    ) -> Self {
        Self {
            hub,
            llm,
            reveal: RevealEngine::new(clock.clone(), cue),
            clock,
            builder,
            token,
        }
    }

    pub async fn run(self) {
        tracing::info!("Orchestration loop started");

        while let Step::Continue = self.step().await {}

        tracing::info!(
            cancelled = self.token.is_cancelled(),
            "Orchestration loop stopped"
        );
    }

    async fn step(&self) -> Step {
        let settings = self.hub.settings().await;

        let (provider, history) = {
            let mut slot = self.hub.lock().await;
            if self.token.is_cancelled() {
                return Step::Halt;
            }
            if slot.session.turn_count() >= settings.max_turns {
                tracing::info!(
                    turn_count = slot.session.turn_count(),
                    max_turns = settings.max_turns,
                    "Turn limit reached"
                );
                self.apply(&mut slot, Event::TurnLimitReached);
                return Step::Halt;
            }
            (slot.session.next_provider(), slot.session.history())
        };

        let text = match self.produce(provider, &history, &settings).await {
            Ok(text) => text,
            Err(e) => {
                self.fail(provider, &e).await;
                return Step::Halt;
            }
        };

        let Some(turn_id) = self.append(provider, &text).await else {
            return Step::Halt;
        };

        let sink = SessionRevealSink {
            hub: &self.hub,
            token: &self.token,
        };
        let report = self
            .reveal
            .reveal(
                turn_id,
                &text,
                RevealParams::from(&settings),
                &sink,
                &self.token,
            )
            .await;
        tracing::debug!(
            provider = %provider,
            ticks = report.ticks,
            cues = report.cues,
            cancelled = report.is_cancelled(),
            "Turn revealed"
        );

        // Once cancelled, the stop or clear has already counted this turn
        {
            let mut slot = self.hub.lock().await;
            if !self.token.is_cancelled() {
                self.hub.count_in_flight(&mut slot, report.is_cancelled());
            }
        }

        if report.is_cancelled() {
            return Step::Halt;
        }

        let delay = Duration::from_millis(settings.cooldown_ms).min(MAX_COOLDOWN);
        tokio::select! {
            () = self.token.cancelled() => Step::Halt,
            () = self.clock.sleep(delay) => Step::Continue,
        }
    }

    /// Build messages, request a reply, fall back once on empty text
    async fn produce(
        &self,
        provider: Provider,
        history: &[Turn],
        settings: &StyleParams,
    ) -> Result<String, TurnError> {
        let messages = self.builder.build(provider, history, settings.aggression);
        let mut completion = self.request(provider, &messages, settings.tone).await?;

        if completion.is_empty() {
            if let Some(fallback) = provider.fallback() {
                if self.token.is_cancelled() {
                    tracing::debug!(
                        from = %provider,
                        to = %fallback,
                        "Stopped before fallback"
                    );
                    return Err(TurnError::EmptyResponse);
                }
                tracing::info!(
                    from = %provider,
                    to = %fallback,
                    warning = ?completion.warning,
                    "Empty reply, falling back"
                );
                completion = self.request(fallback, &messages, settings.tone).await?;
            }
        }

        finalize_text(&completion.text)
    }

    async fn request(
        &self,
        provider: Provider,
        messages: &[ChatMessage],
        tone: f32,
    ) -> Result<Completion, LlmError> {
        let request = CompletionRequest {
            messages: messages.to_vec(),
            model: None,
            temperature: Some(provider.temperature(tone)),
        };
        self.llm.complete(provider, &request).await
    }

    /// Append the reply unless the run was cancelled while it was in flight
    async fn append(&self, provider: Provider, text: &str) -> Option<TurnId> {
        let mut slot = self.hub.lock().await;
        if self.token.is_cancelled() {
            tracing::debug!(provider = %provider, "Discarding reply that arrived after stop");
            return None;
        }

        let turn = Turn::reply(provider, text);
        match slot.session.push_reply(turn.clone()) {
            Ok(id) => {
                slot.in_flight = Some(id);
                self.hub.broadcast(SseEvent::Turn { turn });
                Some(id)
            }
            Err(e) => {
                tracing::error!(error = %e, "Reply rejected by session");
                None
            }
        }
    }

    async fn fail(&self, provider: Provider, error: &TurnError) {
        let mut slot = self.hub.lock().await;
        if self.token.is_cancelled() {
            tracing::warn!(provider = %provider, error = %error, "Turn failed after stop; not recorded");
            return;
        }

        tracing::warn!(provider = %provider, error = %error, "Turn failed, stopping session");
        self.apply(
            &mut slot,
            Event::TurnFailed {
                notice: error.notice(),
            },
        );
    }

    fn apply(&self, slot: &mut super::SessionSlot, event: Event) {
        if let Err(e) = self.hub.apply(slot, event) {
            tracing::error!(error = %e, "Loop event rejected");
        }
    }
}

/// Reveals into the shared session while the run is live
struct SessionRevealSink<'a> {
    hub: &'a SessionHub,
    token: &'a CancellationToken,
}

#[async_trait]
impl RevealSink for SessionRevealSink<'_> {
    async fn append(&self, turn_id: TurnId, chunk: &str) -> bool {
        let mut slot = self.hub.lock().await;
        if self.token.is_cancelled() {
            return false;
        }
        match slot.session.reveal(turn_id, chunk) {
            Ok(()) => {
                self.hub.broadcast(SseEvent::Reveal {
                    turn_id,
                    chunk: chunk.to_string(),
                });
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Reveal rejected");
                false
            }
        }
    }
}
