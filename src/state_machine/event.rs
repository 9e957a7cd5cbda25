//! Events that can occur in a session

/// Events that trigger status transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // Control surface
    Start,
    Stop,
    Clear,

    // Orchestration loop
    /// Checked before each new turn
    TurnLimitReached,
    /// A turn could not be produced; `notice` is shown to the user
    TurnFailed { notice: String },
}
