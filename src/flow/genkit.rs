//! Genkit streaming flow client
//!
//! Speaks the Genkit `streamFlow` protocol: the flow input is posted wrapped
//! in `{"data": ...}` and the response is an event stream of
//! `{"message": ...}` frames terminated by one `{"result": ...}` frame.

use super::sse::data_frames;
use super::types::{ConversationTurn, Event, FlowChunk, FlowRequest, PartialResult, Role};
use super::{ChunkStream, FlowClient, FlowError};
use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Smart search flow deployed as a cloud function
pub const DEFAULT_FLOW_URL: &str =
    "https://europe-west1-wheretogo-e5f51.cloudfunctions.net/smartSearch";

/// HTTP client for a Genkit flow endpoint
pub struct GenkitFlowClient {
    client: Client,
    url: String,
}

impl GenkitFlowClient {
    pub fn new(url: impl Into<String>) -> Result<Self, FlowError> {
        // No overall timeout here: the body is long-lived and the session
        // runtime enforces the per-request deadline.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| FlowError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl FlowClient for GenkitFlowClient {
    async fn stream(&self, request: &FlowRequest) -> Result<ChunkStream, FlowError> {
        let body = GenkitRequest {
            data: FlowInput::from(request),
        };

        let response = self
            .client
            .post(&self.url)
            .header(ACCEPT, "text/event-stream")
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FlowError::timeout(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    FlowError::network(format!("Connection failed: {e}"))
                } else {
                    FlowError::unknown(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            let text = response.text().await.unwrap_or_default();
            return Err(FlowError::from_status(
                status.as_u16(),
                format!("Server returned: {status}: {text}"),
            ));
        }

        Ok(Box::pin(decode_chunks(data_frames(response.bytes_stream()))))
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}

/// Decode frame payloads into flow chunks.
///
/// The sequence ends after the final result or the first error. A payload
/// stream that ends before the final result yields one malformed error.
pub(crate) fn decode_chunks<S>(frames: S) -> impl Stream<Item = Result<FlowChunk, FlowError>> + Send
where
    S: Stream<Item = Result<String, FlowError>> + Send + 'static,
{
    stream::unfold((Box::pin(frames), false), |(mut frames, finished)| async move {
        if finished {
            return None;
        }

        let item = match frames.next().await {
            Some(Ok(payload)) => parse_frame(&payload),
            Some(Err(e)) => Err(e),
            None => Err(FlowError::malformed("stream did not terminate correctly")),
        };
        let finished = !matches!(item, Ok(FlowChunk::Partial(_)));
        Some((item, (frames, finished)))
    })
}

/// Interpret one frame payload
pub(crate) fn parse_frame(payload: &str) -> Result<FlowChunk, FlowError> {
    let frame: GenkitFrame = serde_json::from_str(payload)
        .map_err(|e| FlowError::malformed(format!("Failed to parse frame: {e} - payload: {payload}")))?;

    if let Some(message) = frame.message {
        return Ok(FlowChunk::Partial(message.into()));
    }
    if let Some(result) = frame.result {
        return Ok(FlowChunk::Final(result.into()));
    }
    if let Some(error) = frame.error {
        return Err(FlowError::remote(format!(
            "{}: {}",
            error.status.as_deref().unwrap_or("UNKNOWN"),
            error.message.as_deref().unwrap_or("flow reported an error")
        )));
    }

    Err(FlowError::malformed(format!("unknown chunk format: {payload}")))
}

// Genkit wire types

#[derive(Debug, Serialize)]
struct GenkitRequest<'a> {
    data: FlowInput<'a>,
}

#[derive(Debug, Serialize)]
struct FlowInput<'a> {
    prompt: &'a str,
    history: Vec<WireMessage>,
}

impl<'a> From<&'a FlowRequest> for FlowInput<'a> {
    fn from(request: &'a FlowRequest) -> Self {
        Self {
            prompt: &request.prompt,
            history: request.history.iter().map(WireMessage::from).collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: WireRole,
    #[serde(default)]
    content: Vec<WirePart>,
}

impl From<&ConversationTurn> for WireMessage {
    fn from(turn: &ConversationTurn) -> Self {
        Self {
            role: match turn.role {
                Role::User => WireRole::User,
                Role::Assistant => WireRole::Model,
            },
            content: vec![WirePart {
                text: Some(turn.text.clone()),
            }],
        }
    }
}

impl WireMessage {
    /// Convert to a display turn; roles other than user/model are dropped
    fn into_turn(self) -> Option<ConversationTurn> {
        let role = match self.role {
            WireRole::User => Role::User,
            WireRole::Model => Role::Assistant,
            WireRole::Other => return None,
        };
        let text = self
            .content
            .into_iter()
            .filter_map(|part| part.text)
            .collect::<String>();
        Some(ConversationTurn { role, text })
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum WireRole {
    User,
    Model,
    #[serde(other)]
    Other,
}

#[derive(Debug, Serialize, Deserialize)]
struct WirePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireOutput {
    #[serde(default)]
    reply: Option<String>,
    #[serde(default)]
    suggested_queries: Option<Vec<String>>,
    #[serde(default)]
    events: Option<Vec<Event>>,
    #[serde(default)]
    history: Option<Vec<WireMessage>>,
}

impl From<WireOutput> for PartialResult {
    fn from(output: WireOutput) -> Self {
        Self {
            reply: output.reply,
            suggested_queries: output.suggested_queries,
            events: output.events,
            history: output
                .history
                .map(|messages| messages.into_iter().filter_map(WireMessage::into_turn).collect()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenkitFrame {
    #[serde(default)]
    message: Option<WireOutput>,
    #[serde(default)]
    result: Option<WireOutput>,
    #[serde(default)]
    error: Option<GenkitError>,
}

#[derive(Debug, Deserialize)]
struct GenkitError {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
}
