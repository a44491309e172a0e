//! Effects produced by state transitions

use crate::flow::ConversationTurn;

/// Effects to be executed after a state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Invoke the flow and forward its chunks back as events
    OpenStream {
        request_id: u64,
        prompt: String,
        /// Turns preceding the prompt; the transport truncates them
        history: Vec<ConversationTurn>,
    },

    /// Publish a fresh snapshot to observers
    Publish,
}
