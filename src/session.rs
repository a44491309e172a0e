//! Streaming session controller
//!
//! Implements the Elm Architecture pattern with pure state transitions: the
//! runtime feeds events in, applies the new state and executes the effects.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{SessionSnapshot, SessionState};
pub use transition::transition;
