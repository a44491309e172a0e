//! Property-based tests for flow stream decoding
//!
//! Network reads can split the body anywhere; decoding must not depend on
//! where the splits fall.

use super::genkit::{decode_chunks, parse_frame};
use super::sse::{data_frames, FrameBuffer};
use super::types::FlowChunk;
use futures::stream::{self, StreamExt};
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

/// Reply text including multi-byte characters and JSON escapes
fn arb_reply() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 äöüéß€♪\"\\\\]{0,40}"
}

/// A body of message frames followed by one result frame
fn arb_body() -> impl Strategy<Value = (Vec<String>, Vec<u8>)> {
    proptest::collection::vec(arb_reply(), 0..6).prop_map(|replies| {
        let mut body = Vec::new();
        for reply in &replies {
            let frame = serde_json::json!({ "message": { "reply": reply } });
            body.extend_from_slice(format!("data: {frame}\n\n").as_bytes());
        }
        body.extend_from_slice(b"data: {\"result\":{}}\n\n");
        (replies, body)
    })
}

/// Split `body` into consecutive pieces at the given cut points
fn split_at_cuts(body: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
    let mut cuts: Vec<usize> = cuts.iter().map(|c| c % (body.len() + 1)).collect();
    cuts.sort_unstable();
    cuts.dedup();

    let mut pieces = Vec::new();
    let mut start = 0;
    for cut in cuts {
        pieces.push(body[start..cut].to_vec());
        start = cut;
    }
    pieces.push(body[start..].to_vec());
    pieces
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_frame_buffer_is_split_invariant(
        (replies, body) in arb_body(),
        cuts in proptest::collection::vec(any::<usize>(), 0..12),
    ) {
        let mut buffer = FrameBuffer::new();
        let mut payloads = Vec::new();
        for piece in split_at_cuts(&body, &cuts) {
            buffer.extend(&piece);
            while let Some(payload) = buffer.next_payload() {
                payloads.push(payload.unwrap());
            }
        }

        prop_assert_eq!(payloads.len(), replies.len() + 1);
        prop_assert!(buffer.residue().is_empty());

        for (payload, reply) in payloads.iter().zip(&replies) {
            match parse_frame(payload).unwrap() {
                FlowChunk::Partial(result) => prop_assert_eq!(result.reply.as_deref(), Some(reply.as_str())),
                FlowChunk::Final(_) => prop_assert!(false, "final chunk before the end"),
            }
        }
        prop_assert!(parse_frame(payloads.last().unwrap()).unwrap().is_final());
    }

    #[test]
    fn prop_decoded_stream_ends_with_exactly_one_final(
        (replies, body) in arb_body(),
        cuts in proptest::collection::vec(any::<usize>(), 0..12),
    ) {
        let pieces = split_at_cuts(&body, &cuts);
        let body = stream::iter(pieces.into_iter().map(Ok::<_, std::io::Error>));
        let chunks: Vec<FlowChunk> = futures::executor::block_on(
            decode_chunks(data_frames(body)).map(Result::unwrap).collect(),
        );

        prop_assert_eq!(chunks.len(), replies.len() + 1);
        prop_assert_eq!(chunks.iter().filter(|c| c.is_final()).count(), 1);
        prop_assert!(chunks.last().unwrap().is_final());
    }

    #[test]
    fn prop_truncated_body_never_yields_final(
        (_replies, body) in arb_body(),
        keep in any::<usize>(),
    ) {
        // Drop at least the final frame's closing delimiter
        let keep = keep % (body.len() - 1);
        let truncated = body[..keep].to_vec();
        let body = stream::iter(vec![Ok::<_, std::io::Error>(truncated)]);
        let items: Vec<_> = futures::executor::block_on(decode_chunks(data_frames(body)).collect());

        prop_assert!(items.last().unwrap().is_err());
        prop_assert!(items.iter().all(|item| !matches!(item, Ok(FlowChunk::Final(_)))));
    }
}
