//! Session runtime executor

use crate::flow::{FlowClient, FlowError, FlowRequest};
use crate::runtime::RuntimeConfig;
use crate::session::{transition, Effect, Event, SessionSnapshot, SessionState};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Generic session runtime that can work with any flow transport
pub struct SessionRuntime<F>
where
    F: FlowClient + 'static,
{
    session_id: String,
    state: SessionState,
    flow: Arc<F>,
    config: RuntimeConfig,
    event_rx: mpsc::Receiver<Event>,
    /// Weak so the loop ends once every handle is gone
    event_tx: mpsc::WeakSender<Event>,
    state_tx: Arc<watch::Sender<SessionSnapshot>>,
    shutdown: CancellationToken,
    /// Token to cancel the stream task in flight
    stream_cancel: Option<CancellationToken>,
}

impl<F> SessionRuntime<F>
where
    F: FlowClient + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: String,
        flow: F,
        config: RuntimeConfig,
        event_rx: mpsc::Receiver<Event>,
        event_tx: mpsc::WeakSender<Event>,
        state_tx: Arc<watch::Sender<SessionSnapshot>>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            session_id,
            state: SessionState::default(),
            flow: Arc::new(flow),
            config,
            event_rx,
            event_tx,
            state_tx,
            shutdown,
            stream_cancel: None,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(session_id = %self.session_id, "Starting session runtime");

        // One event at a time; this loop is the only writer of the state
        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => break,
                event = self.event_rx.recv() => match event {
                    Some(event) => self.process_event(event),
                    None => break,
                },
            }
        }

        if let Some(cancel) = self.stream_cancel.take() {
            cancel.cancel();
        }
        tracing::info!(session_id = %self.session_id, "Session runtime stopped");
    }

    fn process_event(&mut self, event: Event) {
        let request_id = event.request_id();
        if let Event::StreamFailed {
            message,
            error_kind,
            ..
        } = &event
        {
            tracing::error!(
                session_id = %self.session_id,
                request_id = ?request_id,
                error = %message,
                kind = ?error_kind,
                transient = error_kind.is_transient(),
                "Request failed"
            );
        }

        let result = match transition(&self.state, event) {
            Ok(r) => r,
            Err(e) => {
                // Duplicate submissions and late chunks are not applied
                tracing::debug!(
                    session_id = %self.session_id,
                    request_id = ?request_id,
                    reason = %e,
                    "Event ignored"
                );
                return;
            }
        };

        if self.state.in_flight() && !result.new_state.in_flight() {
            self.stream_cancel = None;
        }
        self.state = result.new_state;

        for effect in result.effects {
            self.execute_effect(effect);
        }
    }

    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::Publish => {
                self.state_tx.send_replace(SessionSnapshot::from(&self.state));
            }
            Effect::OpenStream {
                request_id,
                prompt,
                history,
            } => {
                let Some(event_tx) = self.event_tx.upgrade() else {
                    return;
                };
                let cancel = self.shutdown.child_token();
                self.stream_cancel = Some(cancel.clone());

                let request = FlowRequest::new(prompt, &history);
                tracing::info!(
                    session_id = %self.session_id,
                    request_id,
                    history_turns = request.history.len(),
                    "Submitting query"
                );

                tokio::spawn(run_stream(
                    self.session_id.clone(),
                    request_id,
                    request,
                    Arc::clone(&self.flow),
                    self.config,
                    event_tx,
                    cancel,
                ));
            }
        }
    }
}

/// Drive one flow invocation and report its outcome as events
async fn run_stream<F: FlowClient + 'static>(
    session_id: String,
    request_id: u64,
    request: FlowRequest,
    flow: Arc<F>,
    config: RuntimeConfig,
    event_tx: mpsc::Sender<Event>,
    cancel: CancellationToken,
) {
    let forwarded = tokio::select! {
        () = cancel.cancelled() => {
            tracing::debug!(session_id = %session_id, request_id, "Stream cancelled");
            return;
        }
        outcome = tokio::time::timeout(
            config.request_timeout,
            forward_chunks(flow.as_ref(), &request, request_id, &event_tx),
        ) => outcome,
    };

    let terminal = match forwarded {
        Ok(Ok(chunks)) => {
            tracing::info!(session_id = %session_id, request_id, chunks, "Stream completed");
            Event::StreamCompleted { request_id }
        }
        Ok(Err(e)) => stream_failed(request_id, e),
        Err(_) => stream_failed(
            request_id,
            FlowError::timeout(format!(
                "No final result within {}s",
                config.request_timeout.as_secs()
            )),
        ),
    };

    let _ = event_tx.send(terminal).await;
}

/// Forward chunks until the final one. Returns the number of chunks seen.
async fn forward_chunks<F: FlowClient + ?Sized>(
    flow: &F,
    request: &FlowRequest,
    request_id: u64,
    event_tx: &mpsc::Sender<Event>,
) -> Result<usize, FlowError> {
    let mut stream = flow.stream(request).await?;
    let mut chunks = 0;

    while let Some(item) = stream.next().await {
        let chunk = item?;
        chunks += 1;
        let is_final = chunk.is_final();

        let event = Event::Chunk {
            request_id,
            result: chunk.into_result(),
        };
        if event_tx.send(event).await.is_err() || is_final {
            return Ok(chunks);
        }
    }

    Err(FlowError::malformed("Stream ended without a final result"))
}

fn stream_failed(request_id: u64, error: FlowError) -> Event {
    Event::StreamFailed {
        request_id,
        message: error.message,
        error_kind: error.kind,
    }
}
