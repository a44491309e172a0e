//! Remote flow transport
//!
//! Opens a streaming request against the remote AI flow and exposes the
//! response as partial chunks followed by one final result.

mod error;
mod genkit;
mod sse;
mod types;

#[cfg(test)]
mod proptests;

pub use error::{FlowError, FlowErrorKind};
pub use genkit::{GenkitFlowClient, DEFAULT_FLOW_URL};
pub use types::*;

use async_trait::async_trait;
use futures::stream::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

/// Lazy, single-pass sequence of chunks. Ends after the final chunk or the
/// first error.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<FlowChunk, FlowError>> + Send>>;

/// Common interface for flow transports
#[async_trait]
pub trait FlowClient: Send + Sync {
    /// Open a streaming invocation of the flow
    async fn stream(&self, request: &FlowRequest) -> Result<ChunkStream, FlowError>;

    /// Endpoint the flow is served from
    fn endpoint(&self) -> &str;
}

#[async_trait]
impl<T: FlowClient + ?Sized> FlowClient for Arc<T> {
    async fn stream(&self, request: &FlowRequest) -> Result<ChunkStream, FlowError> {
        (**self).stream(request).await
    }

    fn endpoint(&self) -> &str {
        (**self).endpoint()
    }
}

/// Logging wrapper for flow transports
pub struct LoggingFlowClient {
    inner: Arc<dyn FlowClient>,
    endpoint: String,
}

impl LoggingFlowClient {
    pub fn new(inner: Arc<dyn FlowClient>) -> Self {
        let endpoint = inner.endpoint().to_string();
        Self { inner, endpoint }
    }
}

#[async_trait]
impl FlowClient for LoggingFlowClient {
    async fn stream(&self, request: &FlowRequest) -> Result<ChunkStream, FlowError> {
        let start = Instant::now();
        let result = self.inner.stream(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(_) => {
                tracing::info!(
                    endpoint = %self.endpoint,
                    duration_ms = %duration.as_millis(),
                    history_turns = request.history.len(),
                    "Flow stream opened"
                );
            }
            Err(e) => {
                tracing::error!(
                    endpoint = %self.endpoint,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    kind = ?e.kind,
                    transient = e.kind.is_transient(),
                    "Flow request failed"
                );
            }
        }

        result
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}
