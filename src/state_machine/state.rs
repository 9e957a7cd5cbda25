//! Session status

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of the single conversation
///
/// One enum instead of separate running/finished flags, so both being true
/// cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No loop running; `start` begins one
    #[default]
    Stopped,
    /// Loop is taking turns
    Running,
    /// Turn limit reached; only `clear` leaves this state
    Finished,
}

impl SessionStatus {
    pub fn is_running(self) -> bool {
        matches!(self, SessionStatus::Running)
    }

    pub fn is_finished(self) -> bool {
        matches!(self, SessionStatus::Finished)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Stopped => "stopped",
            SessionStatus::Running => "running",
            SessionStatus::Finished => "finished",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
