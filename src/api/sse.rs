//! Server-Sent Events support

use crate::session::SessionSnapshot;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;

/// Stream every published snapshot, starting with the current one. Ends
/// when `closed` resolves. The open receiver keeps the session from being
/// evicted.
pub fn sse_stream(
    state_rx: watch::Receiver<SessionSnapshot>,
    closed: impl Future<Output = ()> + Send + 'static,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let snapshots = futures::StreamExt::take_until(WatchStream::new(state_rx), closed)
        .filter_map(|snapshot| match serde_json::to_string(&snapshot) {
            Ok(data) => Some(Ok(Event::default().event("snapshot").data(data))),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize snapshot");
                None
            }
        });

    Sse::new(snapshots).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}
