//! Runtime for the single conversation session
//!
//! `SessionManager` is the command surface: start, stop, clear and settings
//! changes become state machine events, and the resulting effects are
//! applied here. The orchestration loop itself lives in `executor`.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

use executor::TurnLoop;
pub use traits::*;

use crate::llm::ProviderRegistry;
use crate::session::{Session, SessionSnapshot, Turn, TurnId};
use crate::settings::{SettingsUpdate, StyleParams};
use crate::state_machine::{transition, Effect, Event, SessionStatus, TransitionError};
use crate::turn_builder::TurnBuilder;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex, MutexGuard, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Type alias for the production manager with concrete implementations
pub type ProductionManager = SessionManager<RegistryLlmClient, TokioClock, BroadcastCueSink>;

/// Events sent to SSE clients
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SseEvent {
    Init {
        snapshot: SessionSnapshot,
    },
    /// A turn was appended (reply or notice)
    Turn {
        turn: Turn,
    },
    Reveal {
        turn_id: TurnId,
        chunk: String,
    },
    /// A reply turn was counted
    TurnDone {
        turn_id: TurnId,
        turn_count: u32,
        cancelled: bool,
    },
    StateChange {
        status: SessionStatus,
    },
    Cue {
        volume: f32,
    },
    Settings {
        settings: StyleParams,
    },
    Cleared,
}

/// Session plus the running flag of the loop that currently owns it
#[derive(Debug, Default)]
pub struct SessionSlot {
    pub session: Session,
    run: Option<CancellationToken>,
    /// Reply appended by the live loop and not yet counted
    in_flight: Option<TurnId>,
}

/// State shared between the command surface and the loop
pub struct SessionHub {
    slot: Mutex<SessionSlot>,
    settings: RwLock<StyleParams>,
    broadcast_tx: broadcast::Sender<SseEvent>,
    status_tx: watch::Sender<SessionStatus>,
}

impl SessionHub {
    pub fn new(settings: StyleParams) -> Self {
        let (broadcast_tx, _) = broadcast::channel(512);
        let (status_tx, _) = watch::channel(SessionStatus::Stopped);
        Self {
            slot: Mutex::new(SessionSlot::default()),
            settings: RwLock::new(settings),
            broadcast_tx,
            status_tx,
        }
    }

    pub fn sender(&self) -> broadcast::Sender<SseEvent> {
        self.broadcast_tx.clone()
    }

    pub async fn lock(&self) -> MutexGuard<'_, SessionSlot> {
        self.slot.lock().await
    }

    pub async fn settings(&self) -> StyleParams {
        *self.settings.read().await
    }

    pub fn broadcast(&self, event: SseEvent) {
        // No subscribers is fine
        let _ = self.broadcast_tx.send(event);
    }

    /// Count the reply the live loop is revealing, at most once
    pub fn count_in_flight(&self, slot: &mut SessionSlot, cancelled: bool) {
        let Some(turn_id) = slot.in_flight.take() else {
            return;
        };
        match slot.session.complete_turn(turn_id) {
            Ok(turn_count) => self.broadcast(SseEvent::TurnDone {
                turn_id,
                turn_count,
                cancelled,
            }),
            Err(e) => tracing::debug!(error = %e, "Turn not counted"),
        }
    }

    /// Run `event` through the state machine and apply its effects.
    ///
    /// Returns the running flag for a new loop when one must be spawned.
    pub fn apply(
        &self,
        slot: &mut SessionSlot,
        event: Event,
    ) -> Result<Option<CancellationToken>, TransitionError> {
        let result = transition(slot.session.status(), event)?;
        let mut spawned = None;

        for effect in result.effects {
            match effect {
                Effect::SpawnLoop => {
                    let token = CancellationToken::new();
                    slot.run = Some(token.clone());
                    spawned = Some(token);
                }
                Effect::CancelLoop => {
                    if let Some(token) = slot.run.take() {
                        token.cancel();
                    }
                    // The cancelled loop never counts; a restarted loop sees the
                    // interrupted turn in its limit check
                    self.count_in_flight(slot, true);
                }
                Effect::ResetSession => {
                    slot.session.reset();
                    self.broadcast(SseEvent::Cleared);
                }
                Effect::AppendNotice { text } => {
                    // The failed turn was never appended, so it is still due
                    let provider = slot.session.next_provider();
                    let turn = Turn::notice(provider, text);
                    slot.session.push_notice(turn.clone());
                    self.broadcast(SseEvent::Turn { turn });
                }
                Effect::NotifyStatus { status } => {
                    slot.session.set_status(status);
                    self.status_tx.send_replace(status);
                    self.broadcast(SseEvent::StateChange { status });
                }
            }
        }

        Ok(spawned)
    }
}

/// Command surface for the session
pub struct SessionManager<L, C, K>
where
    L: LlmClient + 'static,
    C: Clock + 'static,
    K: CueSink + 'static,
{
    hub: Arc<SessionHub>,
    llm: Arc<L>,
    clock: Arc<C>,
    cue: Arc<K>,
    builder: Arc<TurnBuilder>,
    loops: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl ProductionManager {
    pub fn production(
        registry: Arc<ProviderRegistry>,
        builder: TurnBuilder,
        settings: StyleParams,
    ) -> Self {
        let hub = Arc::new(SessionHub::new(settings));
        let cue = BroadcastCueSink::new(hub.sender());
        Self::new(
            hub,
            RegistryLlmClient::new(registry),
            TokioClock::new(),
            cue,
            builder,
        )
    }
}

impl<L, C, K> SessionManager<L, C, K>
where
    L: LlmClient + 'static,
    C: Clock + 'static,
    K: CueSink + 'static,
{
    pub fn new(hub: Arc<SessionHub>, llm: L, clock: C, cue: K, builder: TurnBuilder) -> Self {
        Self {
            hub,
            llm: Arc::new(llm),
            clock: Arc::new(clock),
            cue: Arc::new(cue),
            builder: Arc::new(builder),
            loops: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Begin taking turns; no-op while running or finished
    pub async fn start(&self) -> SessionStatus {
        self.command(Event::Start).await
    }

    /// Halt the loop, keeping the conversation
    pub async fn stop(&self) -> SessionStatus {
        self.command(Event::Stop).await
    }

    /// Halt the loop and empty the session
    pub async fn clear(&self) -> SessionStatus {
        self.command(Event::Clear).await
    }

    async fn command(&self, event: Event) -> SessionStatus {
        let name = format!("{event:?}");
        let mut slot = self.hub.lock().await;
        let before = slot.session.status();

        match self.hub.apply(&mut slot, event) {
            Ok(Some(token)) => self.spawn_loop(token),
            Ok(None) => {}
            // Commands are valid in every status
            Err(e) => tracing::warn!(error = %e, "Command rejected"),
        }

        let after = slot.session.status();
        tracing::info!(command = %name, from = %before, to = %after, "Session command");
        after
    }

    fn spawn_loop(&self, token: CancellationToken) {
        let turn_loop = TurnLoop::new(
            self.hub.clone(),
            self.llm.clone(),
            self.clock.clone(),
            self.cue.clone(),
            self.builder.clone(),
            token,
        );
        let handle = tokio::spawn(turn_loop.run());

        // Earlier loops are already cancelled and exit on their own
        if let Ok(mut loops) = self.loops.lock() {
            loops.retain(|h| !h.is_finished());
            loops.push(handle);
        }
    }

    /// Wait for every started loop to exit, cancelled ones included
    pub async fn join_loops(&self) {
        let handles = self
            .loops
            .lock()
            .map(|mut loops| std::mem::take(&mut *loops))
            .unwrap_or_default();
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Orchestration loop panicked");
            }
        }
    }

    /// Stop the session and wait for the loop to wind down
    pub async fn shutdown(&self) {
        self.stop().await;
        self.join_loops().await;
    }

    pub async fn settings(&self) -> StyleParams {
        self.hub.settings().await
    }

    /// Apply a partial settings update, returning the clamped result
    pub async fn update_settings(&self, update: &SettingsUpdate) -> StyleParams {
        let settings = {
            let mut settings = self.hub.settings.write().await;
            settings.apply(update);
            *settings
        };
        tracing::debug!(settings = ?settings, "Settings updated");
        self.hub.broadcast(SseEvent::Settings { settings });
        settings
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let settings = self.hub.settings().await;
        self.hub.lock().await.session.snapshot(&settings)
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SseEvent> {
        self.hub.broadcast_tx.subscribe()
    }

    /// Watch the session status
    #[cfg(test)]
    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.hub.status_tx.subscribe()
    }
}
