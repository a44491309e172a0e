//! Common types for flow interactions

use serde::{Deserialize, Serialize};

/// Number of most recent turns sent to the flow as conversation context
pub const HISTORY_SEND_LIMIT: usize = 20;

/// Who authored a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// A retrieval result. Only `id` is relied upon; every display field
/// tolerates being absent so one sparse event cannot fail a whole chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub about: Option<String>,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub media: Media,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub venue: Option<Venue>,
    #[serde(default)]
    pub geodata: Geodata,
    #[serde(default)]
    pub genres: Vec<Genre>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Media {
    #[serde(default)]
    pub photos: Vec<Photo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub url: String,
    #[serde(default)]
    pub blurhash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    #[serde(default)]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Geodata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genre {
    #[serde(default)]
    pub id: String,
    pub name: String,
}

/// One incremental unit of a streamed flow response.
///
/// Every field is optional; an absent field leaves the corresponding
/// session value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialResult {
    pub reply: Option<String>,
    pub suggested_queries: Option<Vec<String>>,
    pub events: Option<Vec<Event>>,
    /// Full history snapshot echoed back by the server
    pub history: Option<Vec<ConversationTurn>>,
}

#[cfg(test)]
impl PartialResult {
    pub fn reply(text: impl Into<String>) -> Self {
        Self {
            reply: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn with_events(mut self, events: Vec<Event>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_suggested_queries(mut self, queries: Vec<String>) -> Self {
        self.suggested_queries = Some(queries);
        self
    }

    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.history = Some(history);
        self
    }
}

/// Item yielded by a flow stream
#[derive(Debug, Clone, PartialEq)]
pub enum FlowChunk {
    /// Streamed partial output
    Partial(PartialResult),
    /// The complete output; nothing follows it
    Final(PartialResult),
}

impl FlowChunk {
    pub fn into_result(self) -> PartialResult {
        match self {
            FlowChunk::Partial(result) | FlowChunk::Final(result) => result,
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, FlowChunk::Final(_))
    }
}

/// Flow invocation input
#[derive(Debug, Clone, PartialEq)]
pub struct FlowRequest {
    pub prompt: String,
    /// At most `HISTORY_SEND_LIMIT` turns, oldest first
    pub history: Vec<ConversationTurn>,
}

impl FlowRequest {
    pub fn new(prompt: impl Into<String>, history: &[ConversationTurn]) -> Self {
        let skip = history.len().saturating_sub(HISTORY_SEND_LIMIT);
        Self {
            prompt: prompt.into(),
            history: history[skip..].to_vec(),
        }
    }
}
