//! Property-based tests for the session controller
//!
//! These tests verify key invariants hold across arbitrary event sequences.

use super::state::{DISPLAY_HISTORY_LIMIT, FALLBACK_REPLY};
use super::transition::TransitionError;
use super::*;
use crate::flow::{ConversationTurn, Event as FlowEvent, FlowErrorKind, PartialResult};
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_turn() -> impl Strategy<Value = ConversationTurn> {
    (any::<bool>(), "[a-z ]{0,12}").prop_map(|(user, text)| {
        if user {
            ConversationTurn::user(text)
        } else {
            ConversationTurn::assistant(text)
        }
    })
}

fn arb_flow_event() -> impl Strategy<Value = FlowEvent> {
    "[a-z0-9]{1,6}".prop_map(|id| {
        serde_json::from_value(serde_json::json!({ "id": id })).expect("event with id")
    })
}

fn arb_partial_result() -> impl Strategy<Value = PartialResult> {
    (
        proptest::option::of("[a-zA-Z ]{0,20}"),
        proptest::option::of(proptest::collection::vec("[a-z ]{1,10}", 0..4)),
        proptest::option::of(proptest::collection::vec(arb_flow_event(), 0..4)),
        proptest::option::of(proptest::collection::vec(arb_turn(), 0..16)),
    )
        .prop_map(|(reply, suggested_queries, events, history)| PartialResult {
            reply,
            suggested_queries,
            events,
            history,
        })
}

/// Idle state with some accumulated turns and leftovers from an older request
fn arb_idle_state() -> impl Strategy<Value = SessionState> {
    (
        proptest::collection::vec(arb_turn(), 0..30),
        proptest::collection::vec("[a-z]{1,8}", 0..3),
        0u64..50,
    )
        .prop_map(|(turns, suggested_queries, last_request_id)| SessionState {
            turns,
            suggested_queries,
            last_request_id,
            ..SessionState::default()
        })
}

fn in_flight(state: &SessionState) -> (SessionState, u64) {
    let next = transition(state, Event::submit("query"))
        .expect("idle state accepts a submission")
        .new_state;
    let id = next.last_request_id;
    (next, id)
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_submit_appends_exactly_one_turn(state in arb_idle_state(), query in "[a-z]{1,10}") {
        let next = transition(&state, Event::submit(query.clone())).unwrap().new_state;

        prop_assert!(next.in_flight());
        prop_assert_eq!(next.turns.len(), state.turns.len() + 1);
        prop_assert_eq!(next.turns.last().unwrap(), &ConversationTurn::user(query));
        prop_assert_eq!(next.last_request_id, state.last_request_id + 1);
    }

    #[test]
    fn prop_submit_while_in_flight_is_rejected(
        state in arb_idle_state(),
        chunks in proptest::collection::vec(arb_partial_result(), 0..5),
        query in "[a-z]{1,10}",
    ) {
        let (mut current, id) = in_flight(&state);
        for result in chunks {
            current = transition(&current, Event::Chunk { request_id: id, result }).unwrap().new_state;
        }

        let err = transition(&current, Event::submit(query)).unwrap_err();
        prop_assert_eq!(err, TransitionError::RequestInFlight);
    }

    #[test]
    fn prop_fields_track_latest_chunk_that_carries_them(
        state in arb_idle_state(),
        chunks in proptest::collection::vec(arb_partial_result(), 1..8),
    ) {
        let (mut current, id) = in_flight(&state);
        for result in &chunks {
            current = transition(&current, Event::Chunk { request_id: id, result: result.clone() })
                .unwrap()
                .new_state;
        }

        let last_reply = chunks.iter().rev().find_map(|c| c.reply.clone()).unwrap_or_default();
        let last_queries = chunks.iter().rev().find_map(|c| c.suggested_queries.clone()).unwrap_or_default();
        let last_events = chunks.iter().rev().find_map(|c| c.events.clone()).unwrap_or_default();

        prop_assert_eq!(current.partial_reply, last_reply);
        prop_assert_eq!(current.suggested_queries, last_queries);
        prop_assert_eq!(current.current_events, last_events);

        if let Some(history) = chunks.iter().rev().find_map(|c| c.history.clone()) {
            let skip = history.len().saturating_sub(DISPLAY_HISTORY_LIMIT);
            prop_assert_eq!(current.turns, history[skip..].to_vec());
        }
    }

    #[test]
    fn prop_stale_chunks_never_apply(
        state in arb_idle_state(),
        result in arb_partial_result(),
        offset in 1u64..5,
    ) {
        let (current, id) = in_flight(&state);
        let before = current.clone();

        let stale = id.saturating_sub(offset);
        let err = transition(&current, Event::Chunk { request_id: stale, result }).unwrap_err();
        prop_assert_eq!(err, TransitionError::StaleRequest(stale));
        prop_assert_eq!(current, before);
    }

    #[test]
    fn prop_request_always_ends_idle_with_empty_reply(
        state in arb_idle_state(),
        chunks in proptest::collection::vec(arb_partial_result(), 0..5),
        fail in any::<bool>(),
    ) {
        let (mut current, id) = in_flight(&state);
        for result in chunks {
            current = transition(&current, Event::Chunk { request_id: id, result }).unwrap().new_state;
        }
        let turns_before = current.turns.len();

        let end = if fail {
            Event::StreamFailed {
                request_id: id,
                message: "boom".to_string(),
                error_kind: FlowErrorKind::Network,
            }
        } else {
            Event::StreamCompleted { request_id: id }
        };
        let done = transition(&current, end).unwrap().new_state;

        prop_assert!(!done.in_flight());
        prop_assert!(done.partial_reply.is_empty());
        if fail {
            prop_assert_eq!(done.turns.len(), turns_before + 1);
            prop_assert_eq!(&done.turns.last().unwrap().text, FALLBACK_REPLY);
        } else {
            prop_assert!(done.turns.len() <= turns_before + 1);
        }
    }
}
