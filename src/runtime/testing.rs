//! Mock implementations for testing
//!
//! These mocks enable integration testing of the orchestration loop without
//! real backends or real time.

use super::traits::*;
use super::{SessionHub, SessionManager};
use crate::llm::{Completion, CompletionRequest, LlmError, LlmService, Provider};
use crate::session::TurnId;
use crate::settings::StyleParams;
use crate::turn_builder::TurnBuilder;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Gate
// ============================================================================

/// Rendezvous point that parks a mock until the test releases it
#[derive(Clone, Default)]
pub struct Gate {
    reached: Arc<Notify>,
    release: Arc<Notify>,
}

impl Gate {
    /// Wait until the mock is parked at the gate
    pub async fn reached(&self) {
        self.reached.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }

    async fn pass(&self) {
        self.reached.notify_one();
        self.release.notified().await;
    }
}

// ============================================================================
// Mock LLM Client
// ============================================================================

/// Mock LLM client that returns queued responses per provider
#[derive(Default)]
pub struct MockLlmClient {
    responses: Mutex<HashMap<Provider, VecDeque<Result<Completion, LlmError>>>>,
    defaults: HashMap<Provider, String>,
    gate: Mutex<Option<Gate>>,
    /// Record of all requests made
    pub requests: Mutex<Vec<(Provider, CompletionRequest)>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply with `text` whenever nothing is queued for `provider`
    pub fn with_default(mut self, provider: Provider, text: impl Into<String>) -> Self {
        self.defaults.insert(provider, text.into());
        self
    }

    pub fn queue_text(&self, provider: Provider, text: impl Into<String>) {
        self.push(provider, Ok(Completion::text("mock", text)));
    }

    /// Queue an empty result with a warning, as a soft-failing adapter returns
    pub fn queue_soft_fail(&self, provider: Provider, warning: impl Into<String>) {
        self.push(provider, Ok(Completion::soft_fail("mock", warning)));
    }

    pub fn queue_error(&self, provider: Provider, error: LlmError) {
        self.push(provider, Err(error));
    }

    /// Park the next request until the returned gate is released
    pub fn hold_next(&self) -> Gate {
        let gate = Gate::default();
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<(Provider, CompletionRequest)> {
        self.requests.lock().unwrap().clone()
    }

    fn push(&self, provider: Provider, result: Result<Completion, LlmError>) {
        self.responses
            .lock()
            .unwrap()
            .entry(provider)
            .or_default()
            .push_back(result);
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(
        &self,
        provider: Provider,
        request: &CompletionRequest,
    ) -> Result<Completion, LlmError> {
        self.requests.lock().unwrap().push((provider, request.clone()));

        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.pass().await;
        }

        let queued = self
            .responses
            .lock()
            .unwrap()
            .get_mut(&provider)
            .and_then(VecDeque::pop_front);
        queued.unwrap_or_else(|| match self.defaults.get(&provider) {
            Some(text) => Ok(Completion::text("mock", text.clone())),
            None => Err(LlmError::transport("No mock response queued")),
        })
    }
}

// ============================================================================
// Static LLM Service
// ============================================================================

/// Adapter stand-in that always answers with the same completion
pub struct StaticService {
    provider: Provider,
    result: Result<Completion, LlmError>,
}

impl StaticService {
    pub fn text(provider: Provider, text: &str) -> Self {
        Self {
            provider,
            result: Ok(Completion::text("static-model", text)),
        }
    }

    pub fn failing(provider: Provider, error: LlmError) -> Self {
        Self {
            provider,
            result: Err(error),
        }
    }
}

#[async_trait]
impl LlmService for StaticService {
    async fn complete(&self, _request: &CompletionRequest) -> Result<Completion, LlmError> {
        self.result.clone()
    }

    fn provider(&self) -> Provider {
        self.provider
    }

    fn default_model(&self) -> &str {
        "static-model"
    }
}

// ============================================================================
// Logical Clock
// ============================================================================

/// Clock that advances only when slept on
#[derive(Default)]
pub struct LogicalClock {
    now: Mutex<Duration>,
    sleeps: AtomicU32,
    cancel_at: Mutex<Option<(u32, CancellationToken)>>,
    hold_at: Mutex<Option<(u32, Gate)>>,
}

impl LogicalClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel `token` when the `n`th sleep begins
    pub fn cancel_after(&self, n: u32, token: CancellationToken) {
        *self.cancel_at.lock().unwrap() = Some((n, token));
    }

    /// Park the `n`th sleep until the returned gate is released
    pub fn hold_at(&self, n: u32) -> Gate {
        let gate = Gate::default();
        *self.hold_at.lock().unwrap() = Some((n, gate.clone()));
        gate
    }

    pub fn sleeps(&self) -> u32 {
        self.sleeps.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Clock for LogicalClock {
    fn now(&self) -> Duration {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        let n = self.sleeps.fetch_add(1, Ordering::SeqCst) + 1;

        let cancel = {
            let mut slot = self.cancel_at.lock().unwrap();
            let due = matches!(slot.as_ref(), Some((at, _)) if *at == n);
            if due {
                slot.take()
            } else {
                None
            }
        };
        if let Some((_, token)) = cancel {
            token.cancel();
        }

        let hold = {
            let mut slot = self.hold_at.lock().unwrap();
            let due = matches!(slot.as_ref(), Some((at, _)) if *at == n);
            if due {
                slot.take()
            } else {
                None
            }
        };
        if let Some((_, gate)) = hold {
            gate.pass().await;
        }

        *self.now.lock().unwrap() += duration;
        tokio::task::yield_now().await;
    }
}

// ============================================================================
// Recording Sinks
// ============================================================================

/// Cue sink that records every cue
#[derive(Default)]
pub struct RecordingCueSink {
    volumes: Mutex<Vec<f32>>,
}

impl RecordingCueSink {
    pub fn count(&self) -> usize {
        self.volumes.lock().unwrap().len()
    }

    pub fn volumes(&self) -> Vec<f32> {
        self.volumes.lock().unwrap().clone()
    }
}

impl CueSink for RecordingCueSink {
    fn cue(&self, volume: f32) {
        self.volumes.lock().unwrap().push(volume);
    }
}

/// Reveal sink that records chunks, optionally refusing after a limit
#[derive(Default)]
pub struct RecordingRevealSink {
    chunks: Mutex<Vec<String>>,
    limit: Option<usize>,
}

impl RecordingRevealSink {
    /// Accept the first `n` chunks, refuse the rest
    pub fn accepting(n: usize) -> Self {
        Self {
            chunks: Mutex::new(Vec::new()),
            limit: Some(n),
        }
    }

    pub fn text(&self) -> String {
        self.chunks.lock().unwrap().concat()
    }
}

#[async_trait]
impl RevealSink for RecordingRevealSink {
    async fn append(&self, _turn_id: TurnId, chunk: &str) -> bool {
        let mut chunks = self.chunks.lock().unwrap();
        if self.limit.is_some_and(|limit| chunks.len() >= limit) {
            return false;
        }
        chunks.push(chunk.to_string());
        true
    }
}

// ============================================================================
// Harness
// ============================================================================

pub type TestManager = SessionManager<Arc<MockLlmClient>, Arc<LogicalClock>, Arc<RecordingCueSink>>;

/// Manager wired to mocks, with handles to inspect them
pub struct TestSession {
    pub manager: TestManager,
    pub llm: Arc<MockLlmClient>,
    pub clock: Arc<LogicalClock>,
    pub cues: Arc<RecordingCueSink>,
}

pub fn harness(llm: MockLlmClient, settings: StyleParams) -> TestSession {
    let llm = Arc::new(llm);
    let clock = Arc::new(LogicalClock::new());
    let cues = Arc::new(RecordingCueSink::default());
    let manager = SessionManager::new(
        Arc::new(SessionHub::new(settings)),
        llm.clone(),
        clock.clone(),
        cues.clone(),
        TurnBuilder::new("test scenario"),
    );
    TestSession {
        manager,
        llm,
        clock,
        cues,
    }
}

pub fn manager_with(llm: MockLlmClient) -> TestManager {
    harness(llm, StyleParams::default()).manager
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatRole;
    use crate::runtime::executor::{MAX_TURN_CHARS, SAFETY_NOTICE};
    use crate::runtime::SseEvent;
    use crate::session::TurnKind;
    use crate::state_machine::SessionStatus;

    fn fast() -> StyleParams {
        StyleParams {
            speed_cps: 220,
            cooldown_ms: 0,
            ..StyleParams::default()
        }
    }

    async fn wait_for_status(t: &TestSession, status: SessionStatus) {
        let mut rx = t.manager.watch_status();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| *s == status))
            .await
            .expect("timed out waiting for status")
            .unwrap();
    }

    #[tokio::test]
    async fn test_empty_ollama_reply_falls_back_to_openai() {
        let llm = MockLlmClient::new();
        llm.queue_soft_fail(Provider::Ollama, "Ollama unreachable. Fallback to OpenAI.");
        llm.queue_text(Provider::OpenAI, "hello");
        let t = harness(llm, fast());

        t.manager.start().await;
        t.manager.join_loops().await;

        let snap = t.manager.snapshot().await;
        let turn = &snap.turns[0];
        assert_eq!(turn.full_text(), "hello");
        assert_eq!(turn.revealed_text(), "hello");
        // The turn belongs to the provider whose slot it filled
        assert_eq!(turn.provider(), Provider::Ollama);
        assert_eq!(snap.turn_count, 1);

        let requests = t.llm.recorded_requests();
        assert_eq!(requests[0].0, Provider::Ollama);
        assert_eq!(requests[1].0, Provider::OpenAI);
        assert_eq!(requests[0].1.messages, requests[1].1.messages);
        let expected = Provider::OpenAI.temperature(fast().tone);
        assert!(requests[1]
            .1
            .temperature
            .is_some_and(|t| (t - expected).abs() < 1e-6));
    }

    #[tokio::test]
    async fn test_fallback_is_one_shot() {
        let llm = MockLlmClient::new();
        llm.queue_soft_fail(Provider::Ollama, "Ollama HTTP 500. Fallback to OpenAI.");
        llm.queue_text(Provider::OpenAI, "   ");
        let t = harness(llm, fast());

        t.manager.start().await;
        t.manager.join_loops().await;

        let snap = t.manager.snapshot().await;
        assert_eq!(t.llm.recorded_requests().len(), 2);
        assert_eq!(snap.turns.len(), 1);
        assert_eq!(snap.turns[0].kind(), TurnKind::Notice);
        assert_eq!(snap.turns[0].full_text(), "ERROR: Empty response");
        assert_eq!(snap.status, SessionStatus::Stopped);
    }

    #[tokio::test]
    async fn test_sentinel_stops_session() {
        let llm = MockLlmClient::new();
        llm.queue_text(Provider::Ollama, "STOP_SESSION");
        let t = harness(llm, fast());

        t.manager.start().await;
        t.manager.join_loops().await;

        let snap = t.manager.snapshot().await;
        assert_eq!(snap.turns.len(), 1);
        assert_eq!(snap.turns[0].kind(), TurnKind::Notice);
        assert_eq!(snap.turns[0].full_text(), SAFETY_NOTICE);
        assert!(!snap.running);
        assert_eq!(snap.turn_count, 0);
    }

    #[tokio::test]
    async fn test_long_reply_truncated() {
        let llm = MockLlmClient::new();
        llm.queue_text(Provider::Ollama, "z".repeat(10_000));
        let t = harness(llm, fast());

        t.manager.start().await;
        t.manager.join_loops().await;

        let snap = t.manager.snapshot().await;
        let turn = &snap.turns[0];
        assert_eq!(turn.full_text().chars().count(), MAX_TURN_CHARS);
        assert!(turn.full_text().ends_with('z'));
        assert_eq!(turn.revealed_text(), turn.full_text());
    }

    #[tokio::test]
    async fn test_turn_limit_finishes_and_blocks_start() {
        let llm = MockLlmClient::new()
            .with_default(Provider::Ollama, "from ollama")
            .with_default(Provider::OpenAI, "from openai");
        let t = harness(
            llm,
            StyleParams {
                max_turns: 5,
                ..fast()
            },
        );

        t.manager.start().await;
        wait_for_status(&t, SessionStatus::Finished).await;
        t.manager.join_loops().await;

        let snap = t.manager.snapshot().await;
        assert!(snap.finished);
        assert!(!snap.running);
        assert_eq!(snap.turn_count, 5);

        let providers: Vec<_> = snap.turns.iter().map(|t| t.provider()).collect();
        assert_eq!(
            providers,
            vec![
                Provider::Ollama,
                Provider::OpenAI,
                Provider::Ollama,
                Provider::OpenAI,
                Provider::Ollama,
            ]
        );

        // Finished until cleared
        assert_eq!(t.manager.start().await, SessionStatus::Finished);
        assert_eq!(t.llm.recorded_requests().len(), 5);

        assert_eq!(t.manager.clear().await, SessionStatus::Stopped);
        let snap = t.manager.snapshot().await;
        assert!(snap.turns.is_empty());
        assert_eq!(snap.turn_count, 0);
        assert!(!snap.finished);
    }

    #[tokio::test]
    async fn test_alternation_survives_failure_and_restart() {
        let llm = MockLlmClient::new();
        llm.queue_text(Provider::Ollama, "first");
        llm.queue_error(Provider::OpenAI, LlmError::auth("Missing OPENAI_API_KEY"));
        let t = harness(llm, fast());

        t.manager.start().await;
        t.manager.join_loops().await;

        let snap = t.manager.snapshot().await;
        assert_eq!(snap.turns.len(), 2);
        assert_eq!(snap.turns[1].kind(), TurnKind::Notice);
        assert_eq!(snap.turns[1].full_text(), "ERROR: Missing OPENAI_API_KEY");
        assert_eq!(snap.turns[1].provider(), Provider::OpenAI);
        assert_eq!(snap.turn_count, 1);

        // Restart picks up with the provider that failed
        t.llm.queue_text(Provider::OpenAI, "second");
        t.manager.start().await;
        t.manager.join_loops().await;

        let snap = t.manager.snapshot().await;
        let replies: Vec<_> = snap
            .turns
            .iter()
            .filter(|t| t.kind() == TurnKind::Reply)
            .map(|t| (t.provider(), t.full_text().to_string()))
            .collect();
        assert_eq!(
            replies,
            vec![
                (Provider::Ollama, "first".to_string()),
                (Provider::OpenAI, "second".to_string()),
            ]
        );
        assert_eq!(snap.turn_count, 2);

        // Notices are not fed back to the models
        let requests = t.llm.recorded_requests();
        let (provider, request) = &requests[2];
        assert_eq!(*provider, Provider::OpenAI);
        let assistant: Vec<_> = request
            .messages
            .iter()
            .filter(|m| m.role == ChatRole::Assistant)
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(assistant, vec!["first"]);
    }

    #[tokio::test]
    async fn test_stop_mid_reveal_keeps_prefix_and_counts() {
        let llm = MockLlmClient::new();
        llm.queue_text(Provider::Ollama, "abcdefghij");
        let t = harness(
            llm,
            StyleParams {
                speed_cps: 20,
                ..fast()
            },
        );
        let gate = t.clock.hold_at(3);
        let mut events = t.manager.subscribe();

        t.manager.start().await;
        gate.reached().await;
        assert_eq!(t.manager.stop().await, SessionStatus::Stopped);
        gate.release();
        t.manager.join_loops().await;

        let snap = t.manager.snapshot().await;
        assert_eq!(snap.turns.len(), 1);
        assert_eq!(snap.turns[0].revealed_text(), "ab");
        assert_eq!(snap.turn_count, 1);
        assert_eq!(snap.status, SessionStatus::Stopped);
        assert_eq!(t.llm.recorded_requests().len(), 1);

        let mut done = None;
        while let Ok(event) = events.try_recv() {
            if let SseEvent::TurnDone { cancelled, .. } = event {
                done = Some(cancelled);
            }
        }
        assert_eq!(done, Some(true));
    }

    #[tokio::test]
    async fn test_clear_mid_reveal_leaves_empty_session() {
        let llm = MockLlmClient::new();
        llm.queue_text(Provider::Ollama, "abcdefghij");
        let t = harness(
            llm,
            StyleParams {
                speed_cps: 20,
                ..fast()
            },
        );
        let gate = t.clock.hold_at(2);

        t.manager.start().await;
        gate.reached().await;
        t.manager.clear().await;
        gate.release();
        t.manager.join_loops().await;

        let snap = t.manager.snapshot().await;
        assert!(snap.turns.is_empty());
        assert_eq!(snap.turn_count, 0);
        assert_eq!(snap.status, SessionStatus::Stopped);
    }

    #[tokio::test]
    async fn test_quick_restart_never_exceeds_turn_limit() {
        let llm = MockLlmClient::new()
            .with_default(Provider::Ollama, "xy")
            .with_default(Provider::OpenAI, "xy");
        let t = harness(
            llm,
            StyleParams {
                speed_cps: 20,
                max_turns: 5,
                ..fast()
            },
        );
        // Two reveal ticks and one cooldown per turn: sleep 13 is the first
        // tick of the fifth turn
        let gate = t.clock.hold_at(13);
        let mut events = t.manager.subscribe();

        t.manager.start().await;
        gate.reached().await;
        assert_eq!(t.manager.stop().await, SessionStatus::Stopped);
        assert_eq!(t.manager.snapshot().await.turn_count, 5);

        // The interrupted turn already counts, so the new loop finishes at once
        t.manager.start().await;
        wait_for_status(&t, SessionStatus::Finished).await;
        gate.release();
        t.manager.join_loops().await;

        let snap = t.manager.snapshot().await;
        assert_eq!(snap.turn_count, 5);
        assert_eq!(snap.turns.len(), 5);
        assert_eq!(snap.status, SessionStatus::Finished);
        assert_eq!(t.llm.recorded_requests().len(), 5);

        let mut done = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let SseEvent::TurnDone {
                turn_count,
                cancelled,
                ..
            } = event
            {
                done.push((turn_count, cancelled));
            }
        }
        assert_eq!(
            done,
            vec![(1, false), (2, false), (3, false), (4, false), (5, true)]
        );
    }

    #[tokio::test]
    async fn test_stop_skips_fallback_request() {
        let llm = MockLlmClient::new();
        llm.queue_soft_fail(Provider::Ollama, "Ollama unreachable. Fallback to OpenAI.");
        llm.queue_text(Provider::OpenAI, "never asked");
        let gate = llm.hold_next();
        let t = harness(llm, fast());

        t.manager.start().await;
        gate.reached().await;
        t.manager.stop().await;
        gate.release();
        t.manager.join_loops().await;

        let requests = t.llm.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, Provider::Ollama);

        let snap = t.manager.snapshot().await;
        assert!(snap.turns.is_empty());
        assert_eq!(snap.status, SessionStatus::Stopped);
    }

    #[tokio::test]
    async fn test_reply_after_stop_is_discarded() {
        let llm = MockLlmClient::new();
        llm.queue_text(Provider::Ollama, "too late");
        let gate = llm.hold_next();
        let t = harness(llm, fast());

        t.manager.start().await;
        gate.reached().await;
        t.manager.stop().await;
        gate.release();
        t.manager.join_loops().await;

        let snap = t.manager.snapshot().await;
        assert!(snap.turns.is_empty());
        assert_eq!(snap.turn_count, 0);
    }

    #[tokio::test]
    async fn test_failure_after_stop_is_not_recorded() {
        let llm = MockLlmClient::new();
        llm.queue_error(Provider::Ollama, LlmError::transport("connection reset"));
        let gate = llm.hold_next();
        let t = harness(llm, fast());

        t.manager.start().await;
        gate.reached().await;
        t.manager.stop().await;
        gate.release();
        t.manager.join_loops().await;

        let snap = t.manager.snapshot().await;
        assert!(snap.turns.is_empty());
        assert_eq!(snap.status, SessionStatus::Stopped);
    }

    #[tokio::test]
    async fn test_start_while_running_is_noop() {
        let llm = MockLlmClient::new();
        llm.queue_text(Provider::Ollama, "only");
        let gate = llm.hold_next();
        let t = harness(llm, fast());

        assert_eq!(t.manager.start().await, SessionStatus::Running);
        gate.reached().await;
        assert_eq!(t.manager.start().await, SessionStatus::Running);
        gate.release();
        t.manager.join_loops().await;

        // One loop, one request for the first turn
        let ollama_requests = t
            .llm
            .recorded_requests()
            .iter()
            .filter(|(p, _)| *p == Provider::Ollama)
            .count();
        assert_eq!(ollama_requests, 1);
    }

    #[tokio::test]
    async fn test_reveal_fires_cues_and_streams_chunks() {
        let llm = MockLlmClient::new();
        llm.queue_text(Provider::Ollama, "tick tock");
        let t = harness(
            llm,
            StyleParams {
                speed_cps: 50,
                ..fast()
            },
        );
        let mut events = t.manager.subscribe();

        t.manager.start().await;
        t.manager.join_loops().await;

        // 20ms ticks clear the 18ms cue gap every time
        assert_eq!(t.cues.count(), 9);
        assert!(t.clock.sleeps() >= 9);

        let mut revealed = String::new();
        while let Ok(event) = events.try_recv() {
            if let SseEvent::Reveal { chunk, .. } = event {
                revealed.push_str(&chunk);
            }
        }
        assert_eq!(revealed, "tick tock");
    }
}
