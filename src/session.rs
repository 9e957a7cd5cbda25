//! Session state: the ordered turns and the counters the loop maintains
//!
//! Only the orchestration loop and the control surface mutate a `Session`,
//! and both do so through the methods here so the invariants hold:
//! - `revealed_text` is always a prefix of `full_text`
//! - `turn_count` counts reply turns only
//! - reply turns alternate providers strictly

use crate::llm::Provider;
use crate::settings::StyleParams;
use crate::state_machine::SessionStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

pub type TurnId = Uuid;

/// What a turn represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnKind {
    /// Model output; counts toward the turn limit
    Reply,
    /// Terminal failure message; never counted
    Notice,
}

/// One message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turn {
    id: TurnId,
    provider: Provider,
    kind: TurnKind,
    full_text: String,
    revealed_text: String,
    created_at: DateTime<Utc>,
}

impl Turn {
    /// Reply turn with nothing revealed yet
    pub fn reply(provider: Provider, full_text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider,
            kind: TurnKind::Reply,
            full_text: full_text.into(),
            revealed_text: String::new(),
            created_at: Utc::now(),
        }
    }

    /// Notice turn, shown in full immediately
    pub fn notice(provider: Provider, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            id: Uuid::new_v4(),
            provider,
            kind: TurnKind::Notice,
            revealed_text: text.clone(),
            full_text: text,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> TurnId {
        self.id
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn kind(&self) -> TurnKind {
        self.kind
    }

    pub fn full_text(&self) -> &str {
        &self.full_text
    }

    pub fn revealed_text(&self) -> &str {
        &self.revealed_text
    }

    pub fn is_reply(&self) -> bool {
        self.kind() == TurnKind::Reply
    }
}

/// Errors from mutating the session
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Unknown turn {0}")]
    UnknownTurn(TurnId),
    #[error("Chunk does not continue the text of turn {0}")]
    RevealOverrun(TurnId),
    #[error("Turn from {got} breaks alternation, expected {expected}")]
    OutOfTurn { expected: Provider, got: Provider },
}

/// The single conversation
#[derive(Debug, Clone, Default)]
pub struct Session {
    turns: Vec<Turn>,
    turn_count: u32,
    status: SessionStatus,
}

impl Session {
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn turn_count(&self) -> u32 {
        self.turn_count
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status.is_running()
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_finished()
    }

    pub(crate) fn set_status(&mut self, status: SessionStatus) {
        self.status = status;
    }

    /// Reply turns in order, as fed back to the models
    pub fn history(&self) -> Vec<Turn> {
        self.turns.iter().filter(|t| t.is_reply()).cloned().collect()
    }

    /// Provider due for the next reply
    pub fn next_provider(&self) -> Provider {
        self.turns
            .iter()
            .rev()
            .find(|t| t.is_reply())
            .map_or_else(Provider::first, |t| t.provider.alternate())
    }

    /// Append a reply turn; its provider must be the one due next
    pub fn push_reply(&mut self, turn: Turn) -> Result<TurnId, SessionError> {
        let expected = self.next_provider();
        if turn.provider != expected {
            return Err(SessionError::OutOfTurn {
                expected,
                got: turn.provider,
            });
        }
        let id = turn.id;
        self.turns.push(turn);
        Ok(id)
    }

    /// Append a notice turn; never counted
    pub fn push_notice(&mut self, turn: Turn) -> TurnId {
        let id = turn.id;
        self.turns.push(turn);
        id
    }

    /// Extend a turn's revealed prefix by `chunk`
    pub fn reveal(&mut self, id: TurnId, chunk: &str) -> Result<(), SessionError> {
        let turn = self
            .turns
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(SessionError::UnknownTurn(id))?;

        let revealed = turn.revealed_text.len();
        let continues = turn
            .full_text
            .get(revealed..)
            .is_some_and(|rest| rest.starts_with(chunk));
        if !continues {
            return Err(SessionError::RevealOverrun(id));
        }

        turn.revealed_text.push_str(chunk);
        Ok(())
    }

    /// Count a finished reply turn, returning the new count.
    ///
    /// Fails if the turn is gone, which happens when the session was cleared
    /// while the turn was being revealed.
    pub fn complete_turn(&mut self, id: TurnId) -> Result<u32, SessionError> {
        if !self.turns.iter().any(|t| t.id == id && t.is_reply()) {
            return Err(SessionError::UnknownTurn(id));
        }
        self.turn_count += 1;
        Ok(self.turn_count)
    }

    /// Empty the session: no turns, zero count, stopped
    pub fn reset(&mut self) {
        self.turns.clear();
        self.turn_count = 0;
        self.status = SessionStatus::Stopped;
    }

    pub fn snapshot(&self, settings: &StyleParams) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            running: self.is_running(),
            finished: self.is_finished(),
            turn_count: self.turn_count,
            max_turns: settings.max_turns,
            next_provider: self.next_provider(),
            turns: self.turns().to_vec(),
            settings: *settings,
        }
    }
}

/// Read-only view handed to the presentation layer
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub running: bool,
    pub finished: bool,
    pub turn_count: u32,
    pub max_turns: u32,
    pub next_provider: Provider,
    pub turns: Vec<Turn>,
    pub settings: StyleParams,
}
