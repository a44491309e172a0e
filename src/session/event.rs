//! Events that drive a session

use crate::flow::{FlowErrorKind, PartialResult};

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    Submit {
        query: String,
    },

    // Stream events, tagged with the request they belong to
    Chunk {
        request_id: u64,
        result: PartialResult,
    },
    StreamCompleted {
        request_id: u64,
    },
    StreamFailed {
        request_id: u64,
        message: String,
        error_kind: FlowErrorKind,
    },
}

impl Event {
    pub fn submit(query: impl Into<String>) -> Self {
        Event::Submit {
            query: query.into(),
        }
    }

    /// Request the event belongs to, if any
    pub fn request_id(&self) -> Option<u64> {
        match self {
            Event::Submit { .. } => None,
            Event::Chunk { request_id, .. }
            | Event::StreamCompleted { request_id }
            | Event::StreamFailed { request_id, .. } => Some(*request_id),
        }
    }
}
