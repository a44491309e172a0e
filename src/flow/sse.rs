//! Server-sent event framing for flow responses
//!
//! Frames are separated by a blank line. Network reads may split a frame
//! (or a multi-byte character) anywhere, so bytes are buffered until a full
//! frame is available.

use super::FlowError;
use futures::stream::{self, Stream, StreamExt};
use std::fmt::Display;

const FRAME_DELIMITER: &[u8] = b"\n\n";

/// Largest frame accepted before the stream is treated as malformed
pub const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

/// Accumulates raw body bytes and yields the `data:` payload of each
/// complete frame.
#[derive(Debug)]
pub struct FrameBuffer {
    pending: Vec<u8>,
    /// Prefix of `pending` already searched for a delimiter
    scanned: usize,
    max_frame: usize,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::with_max_frame(MAX_FRAME_BYTES)
    }
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_frame(max_frame: usize) -> Self {
        Self {
            pending: Vec::new(),
            scanned: 0,
            max_frame,
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Pop the payload of the next complete frame.
    ///
    /// Returns `None` when no complete frame is buffered. Frames that carry
    /// no `data:` line (keep-alives, comments) are skipped. A frame growing
    /// past the size limit is an error and its bytes are discarded.
    pub fn next_payload(&mut self) -> Option<Result<String, FlowError>> {
        loop {
            // A delimiter may straddle the previous scan boundary
            let start = self.scanned.saturating_sub(FRAME_DELIMITER.len() - 1);
            let Some(offset) = self
                .pending
                .get(start..)
                .unwrap_or_default()
                .windows(FRAME_DELIMITER.len())
                .position(|window| window == FRAME_DELIMITER)
            else {
                self.scanned = self.pending.len();
                if self.pending.len() > self.max_frame {
                    let size = self.pending.len();
                    self.pending.clear();
                    self.scanned = 0;
                    return Some(Err(FlowError::malformed(format!(
                        "Frame exceeds {} bytes ({size} buffered)",
                        self.max_frame
                    ))));
                }
                return None;
            };
            let end = start + offset;

            let rest = self.pending.split_off(end + FRAME_DELIMITER.len());
            self.scanned = 0;
            let mut frame = std::mem::replace(&mut self.pending, rest);
            frame.truncate(end);

            let frame = match String::from_utf8(frame) {
                Ok(text) => text,
                Err(e) => {
                    return Some(Err(FlowError::malformed(format!(
                        "Frame is not valid UTF-8: {e}"
                    ))))
                }
            };

            if let Some(payload) = frame_payload(&frame) {
                return Some(Ok(payload));
            }
        }
    }

    /// Bytes received after the last complete frame
    pub fn residue(&self) -> &[u8] {
        &self.pending
    }
}

/// Join the `data:` lines of one frame. `None` if the frame has none.
fn frame_payload(frame: &str) -> Option<String> {
    let mut data_lines = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.strip_prefix(' ').unwrap_or(data))
        .peekable();

    data_lines.peek()?;
    Some(data_lines.collect::<Vec<_>>().join("\n"))
}

/// Turn a body byte stream into a stream of frame payloads.
///
/// A read error ends the stream after yielding it. Trailing bytes that never
/// formed a complete frame are dropped with a warning; the caller decides
/// whether an early end is an error.
pub fn data_frames<S, B, E>(body: S) -> impl Stream<Item = Result<String, FlowError>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Display + Send,
{
    let body = Box::pin(body);
    stream::unfold(
        (body, FrameBuffer::new(), false),
        |(mut body, mut buffer, mut done)| async move {
            loop {
                if let Some(payload) = buffer.next_payload() {
                    return Some((payload, (body, buffer, done)));
                }
                if done {
                    return None;
                }

                match body.next().await {
                    Some(Ok(bytes)) => buffer.extend(bytes.as_ref()),
                    Some(Err(e)) => {
                        done = true;
                        buffer = FrameBuffer::new();
                        let error = FlowError::network(format!("Stream error: {e}"));
                        return Some((Err(error), (body, buffer, done)));
                    }
                    None => {
                        if !buffer.residue().iter().all(u8::is_ascii_whitespace) {
                            tracing::warn!(
                                bytes = buffer.residue().len(),
                                "Flow stream ended with an incomplete frame"
                            );
                        }
                        done = true;
                        buffer = FrameBuffer::new();
                    }
                }
            }
        },
    )
}
