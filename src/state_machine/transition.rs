//! Pure status transition function

use super::{Effect, Event, SessionStatus};
use thiserror::Error;

/// Result of a status transition
#[derive(Debug, PartialEq, Eq)]
pub struct TransitionResult {
    pub new_status: SessionStatus,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(status: SessionStatus) -> Self {
        Self {
            new_status: status,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    /// Status unchanged, nothing to do
    pub fn unchanged(status: SessionStatus) -> Self {
        Self::new(status)
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Invalid transition: {event:?} while {status}")]
    InvalidTransition {
        status: SessionStatus,
        event: Event,
    },
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs, with no I/O.
pub fn transition(
    status: SessionStatus,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    use SessionStatus::{Finished, Running, Stopped};

    match (status, event) {
        // ============================================================
        // Control surface
        // ============================================================
        (Stopped, Event::Start) => Ok(TransitionResult::new(Running)
            .with_effect(Effect::SpawnLoop)
            .with_effect(Effect::notify(Running))),

        // Already running, or finished until cleared
        (Running | Finished, Event::Start) => Ok(TransitionResult::unchanged(status)),

        (Running, Event::Stop) => Ok(TransitionResult::new(Stopped)
            .with_effect(Effect::CancelLoop)
            .with_effect(Effect::notify(Stopped))),

        (Stopped | Finished, Event::Stop) => Ok(TransitionResult::unchanged(status)),

        // Clear is a stop followed by a full reset, from any status
        (Running, Event::Clear) => Ok(TransitionResult::new(Stopped)
            .with_effect(Effect::CancelLoop)
            .with_effect(Effect::ResetSession)
            .with_effect(Effect::notify(Stopped))),

        (Stopped | Finished, Event::Clear) => Ok(TransitionResult::new(Stopped)
            .with_effect(Effect::ResetSession)
            .with_effect(Effect::notify(Stopped))),

        // ============================================================
        // Loop outcomes
        // ============================================================
        (Running, Event::TurnLimitReached) => Ok(TransitionResult::new(Finished)
            .with_effect(Effect::CancelLoop)
            .with_effect(Effect::notify(Finished))),

        (Running, Event::TurnFailed { notice }) => Ok(TransitionResult::new(Stopped)
            .with_effect(Effect::AppendNotice { text: notice })
            .with_effect(Effect::CancelLoop)
            .with_effect(Effect::notify(Stopped))),

        (status @ (Stopped | Finished), event @ (Event::TurnLimitReached | Event::TurnFailed { .. })) => {
            Err(TransitionError::InvalidTransition { status, event })
        }
    }
}
