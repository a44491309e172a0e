//! Pure state transition function
//!
//! Given the same state and event it always produces the same new state and
//! effects, with no I/O.

use super::state::{ActiveRequest, DISPLAY_HISTORY_LIMIT, FALLBACK_REPLY};
use super::{Effect, Event, SessionState};
use crate::flow::{ConversationTurn, PartialResult};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: SessionState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: SessionState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Reasons an event is not applied. None of these reach the user.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Query is empty")]
    EmptyQuery,
    #[error("A request is already in flight")]
    RequestInFlight,
    #[error("Event for request {0} does not match the request in flight")]
    StaleRequest(u64),
}

pub fn transition(state: &SessionState, event: Event) -> Result<TransitionResult, TransitionError> {
    match event {
        Event::Submit { query } => submit(state, &query),

        Event::Chunk { request_id, result } => {
            let mut next = current(state, request_id)?;
            apply_chunk(&mut next, result);
            Ok(TransitionResult::new(next).with_effect(Effect::Publish))
        }

        Event::StreamCompleted { request_id } => {
            let mut next = current(state, request_id)?;
            let snapshot_received = next.active.is_some_and(|a| a.snapshot_received);
            let reply = std::mem::take(&mut next.partial_reply);

            // Without a snapshot the streamed reply would otherwise vanish
            if !snapshot_received && !reply.trim().is_empty() {
                next.turns.push(ConversationTurn::assistant(reply));
            }
            next.active = None;
            Ok(TransitionResult::new(next).with_effect(Effect::Publish))
        }

        Event::StreamFailed { request_id, .. } => {
            let mut next = current(state, request_id)?;
            next.turns.push(ConversationTurn::assistant(FALLBACK_REPLY));
            next.partial_reply.clear();
            next.active = None;
            Ok(TransitionResult::new(next).with_effect(Effect::Publish))
        }
    }
}

/// Queries are trimmed before they are stored and sent, whether typed or
/// picked from the suggestions.
fn submit(state: &SessionState, query: &str) -> Result<TransitionResult, TransitionError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(TransitionError::EmptyQuery);
    }
    if state.in_flight() {
        return Err(TransitionError::RequestInFlight);
    }

    let request_id = state.last_request_id + 1;
    let history = state.turns.clone();

    let mut next = state.clone();
    next.turns.push(ConversationTurn::user(query));
    next.active = Some(ActiveRequest {
        id: request_id,
        snapshot_received: false,
    });
    next.last_request_id = request_id;
    next.partial_reply.clear();
    next.suggested_queries.clear();
    next.current_events.clear();

    Ok(TransitionResult::new(next)
        .with_effect(Effect::Publish)
        .with_effect(Effect::OpenStream {
            request_id,
            prompt: query.to_string(),
            history,
        }))
}

/// Clone of `state` if `request_id` is the request in flight
fn current(state: &SessionState, request_id: u64) -> Result<SessionState, TransitionError> {
    if state.is_current(request_id) {
        Ok(state.clone())
    } else {
        Err(TransitionError::StaleRequest(request_id))
    }
}

/// Last value wins per field; absent fields keep their value
fn apply_chunk(state: &mut SessionState, result: PartialResult) {
    if let Some(reply) = result.reply {
        state.partial_reply = reply;
    }
    if let Some(queries) = result.suggested_queries {
        state.suggested_queries = queries;
    }
    if let Some(events) = result.events {
        state.current_events = events;
    }
    if let Some(mut history) = result.history {
        let skip = history.len().saturating_sub(DISPLAY_HISTORY_LIMIT);
        history.drain(..skip);
        state.turns = history;
        if let Some(active) = state.active.as_mut() {
            active.snapshot_received = true;
        }
    }
}
