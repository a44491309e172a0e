//! Session state types

use crate::flow::{ConversationTurn, Event as FlowEvent, Role};
use serde::Serialize;

/// Number of most recent turns kept when the server sends a history snapshot
pub const DISPLAY_HISTORY_LIMIT: usize = 10;

/// Assistant turn appended when a request fails
pub const FALLBACK_REPLY: &str =
    "Sorry, there was an error processing your request. Please try again.";

/// The submission currently being streamed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveRequest {
    pub id: u64,
    /// Whether any chunk of this request carried a history snapshot
    pub snapshot_received: bool,
}

/// Live conversation state, owned by a single session runtime
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub turns: Vec<ConversationTurn>,
    /// `Some` while a submission is in flight
    pub active: Option<ActiveRequest>,
    pub partial_reply: String,
    pub suggested_queries: Vec<String>,
    pub current_events: Vec<FlowEvent>,
    /// Id of the most recently issued request
    pub last_request_id: u64,
}

impl SessionState {
    pub fn in_flight(&self) -> bool {
        self.active.is_some()
    }

    /// Whether `request_id` belongs to the submission in flight
    pub fn is_current(&self, request_id: u64) -> bool {
        self.active.is_some_and(|active| active.id == request_id)
    }

    /// Text of the most recent user turn
    pub fn latest_prompt(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|turn| turn.role == Role::User)
            .map(|turn| turn.text.as_str())
    }
}

/// Read-only view of a session, published to observers
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub turns: Vec<ConversationTurn>,
    pub in_flight: bool,
    pub partial_reply: String,
    pub suggested_queries: Vec<String>,
    pub current_events: Vec<FlowEvent>,
    pub latest_prompt: Option<String>,
}

impl From<&SessionState> for SessionSnapshot {
    fn from(state: &SessionState) -> Self {
        Self {
            turns: state.turns.clone(),
            in_flight: state.in_flight(),
            partial_reply: state.partial_reply.clone(),
            suggested_queries: state.suggested_queries.clone(),
            current_events: state.current_events.clone(),
            latest_prompt: state.latest_prompt().map(str::to_string),
        }
    }
}
