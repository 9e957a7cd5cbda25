//! Reveal engine: exposes a finished turn a few characters at a time
//!
//! The cadence is derived from the reveal rate. Each tick appends a batch of
//! one to three characters through a `RevealSink`; non-empty ticks may fire a
//! throttled audio cue. The running flag is checked at every tick, and a
//! cancelled reveal leaves whatever prefix was reached.

use crate::runtime::traits::{Clock, CueSink, RevealSink};
use crate::session::TurnId;
use crate::settings::StyleParams;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Fastest tick the engine will run at
pub const MIN_TICK: Duration = Duration::from_millis(10);

/// Cues closer together than this are dropped
pub const CUE_MIN_GAP: Duration = Duration::from_millis(18);

/// Tick interval and batch size for a reveal rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealPlan {
    pub interval: Duration,
    pub batch: usize,
}

impl RevealPlan {
    /// Plan for `cps` characters per second
    pub fn for_rate(cps: u32) -> Self {
        let cps = cps.max(1);
        let interval = Duration::from_millis(u64::from(1000 / cps)).max(MIN_TICK);
        let batch = match cps {
            0..=79 => 1,
            80..=119 => 2,
            _ => 3,
        };
        Self { interval, batch }
    }

    /// Ticks needed to reveal `chars` characters
    pub fn ticks_for(&self, chars: usize) -> usize {
        chars.div_ceil(self.batch)
    }
}

/// Position within the text being revealed, on character boundaries
#[derive(Debug, Clone)]
pub struct RevealCursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> RevealCursor<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    pub fn is_done(&self) -> bool {
        self.pos >= self.text.len()
    }

    /// Text revealed so far
    pub fn revealed(&self) -> &'a str {
        self.text.get(..self.pos).unwrap_or(self.text)
    }

    /// Next chunk of at most `batch` characters, or `None` at the end
    pub fn advance(&mut self, batch: usize) -> Option<&'a str> {
        let rest = self.text.get(self.pos..).filter(|r| !r.is_empty())?;
        let end = rest
            .char_indices()
            .nth(batch.max(1))
            .map_or(rest.len(), |(i, _)| i);
        let chunk = rest.get(..end)?;
        self.pos += end;
        Some(chunk)
    }
}

/// Drops cues that come too soon after the previous one
#[derive(Debug, Clone)]
pub struct CueThrottle {
    min_gap: Duration,
    last: Option<Duration>,
}

impl Default for CueThrottle {
    fn default() -> Self {
        Self::new(CUE_MIN_GAP)
    }
}

impl CueThrottle {
    pub fn new(min_gap: Duration) -> Self {
        Self { min_gap, last: None }
    }

    /// Whether a cue may fire at `now`; records it if so
    pub fn try_fire(&mut self, now: Duration) -> bool {
        let allowed = self
            .last
            .map_or(true, |last| now.saturating_sub(last) >= self.min_gap);
        if allowed {
            self.last = Some(now);
        }
        allowed
    }
}

/// Parameters captured when a reveal starts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RevealParams {
    pub speed_cps: u32,
    pub sound_enabled: bool,
    pub volume: f32,
}

impl From<&StyleParams> for RevealParams {
    fn from(style: &StyleParams) -> Self {
        Self {
            speed_cps: style.speed_cps,
            sound_enabled: style.sound_enabled,
            volume: style.volume,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealOutcome {
    Completed,
    Cancelled,
}

/// What a single reveal did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealReport {
    pub outcome: RevealOutcome,
    pub ticks: usize,
    pub cues: usize,
}

impl RevealReport {
    pub fn is_cancelled(&self) -> bool {
        self.outcome == RevealOutcome::Cancelled
    }
}

/// Drives reveals on an injected clock
pub struct RevealEngine<C, K> {
    clock: Arc<C>,
    cue: Arc<K>,
}

impl<C: Clock, K: CueSink> RevealEngine<C, K> {
    pub fn new(clock: Arc<C>, cue: Arc<K>) -> Self {
        Self { clock, cue }
    }

    /// Reveal `full_text` into `sink`, resolving once when the whole text is
    /// out or the reveal is cancelled.
    pub async fn reveal<S: RevealSink + ?Sized>(
        &self,
        turn_id: TurnId,
        full_text: &str,
        params: RevealParams,
        sink: &S,
        cancel: &CancellationToken,
    ) -> RevealReport {
        let plan = RevealPlan::for_rate(params.speed_cps);
        let mut cursor = RevealCursor::new(full_text);
        let mut throttle = CueThrottle::default();
        let mut ticks = 0;
        let mut cues = 0;

        let outcome = loop {
            if cursor.is_done() {
                break RevealOutcome::Completed;
            }

            self.clock.sleep(plan.interval).await;
            if cancel.is_cancelled() {
                break RevealOutcome::Cancelled;
            }

            let Some(chunk) = cursor.advance(plan.batch) else {
                break RevealOutcome::Completed;
            };
            ticks += 1;

            if !sink.append(turn_id, chunk).await {
                break RevealOutcome::Cancelled;
            }

            if params.sound_enabled && throttle.try_fire(self.clock.now()) {
                self.cue.cue(params.volume);
                cues += 1;
            }
        };

        tracing::debug!(
            turn_id = %turn_id,
            ticks,
            cues,
            planned = plan.ticks_for(full_text.chars().count()),
            revealed = cursor.revealed().chars().count(),
            outcome = ?outcome,
            "Reveal finished"
        );

        RevealReport {
            outcome,
            ticks,
            cues,
        }
    }
}
