//! Effects produced by status transitions

use super::SessionStatus;

/// Effects to be executed after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Spawn the orchestration loop with a fresh running flag
    SpawnLoop,

    /// Lower the running flag of the current loop
    CancelLoop,

    /// Empty the turn list and reset the counter
    ResetSession,

    /// Append a terminal, non-counted notice turn
    AppendNotice { text: String },

    /// Tell connected clients about the new status
    NotifyStatus { status: SessionStatus },
}

impl Effect {
    pub fn notify(status: SessionStatus) -> Self {
        Effect::NotifyStatus { status }
    }
}
