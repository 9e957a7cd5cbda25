//! Session status state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions:
//! commands and loop outcomes become events, the transition function returns
//! the new status plus the effects the runtime must carry out.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;


pub use effect::Effect;
pub use event::Event;
pub use state::SessionStatus;
pub use transition::{transition, TransitionError};
