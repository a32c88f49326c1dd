//! SSE streaming parser for Gemini generation responses.
//!
//! Converts a raw `reqwest` byte stream into tagged [`StreamFragment`]
//! values. Handles partial lines and buffering; fragments are yielded in
//! generation order and the stream is forward-only and non-restartable.

use bytes::Bytes;
use futures::stream::Stream;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::CanvasError;
use crate::gemini::{FunctionCall, GenerateContentResponse};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

/// One fragment of a streamed response, exhaustively matched by callers.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFragment {
    /// Visible text delta; render in arrival order without buffering.
    Text(String),
    /// Opaque reasoning signature bytes; no semantic content for the
    /// caller, rendered only for diagnostic visibility.
    ReasoningSignature(Vec<u8>),
    /// The backend expects the caller to execute this and resume the
    /// dialogue with the result on a later turn.
    ToolCallRequest(FunctionCall),
}

/// Stream adapter that converts raw SSE bytes into `StreamFragment`s.
pub struct FragmentStream {
    inner: Pin<Box<dyn Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Send>>,
    buffer: String,
    pending: VecDeque<StreamFragment>,
}

impl FragmentStream {
    pub(crate) fn new(
        byte_stream: impl Stream<Item = std::result::Result<Bytes, reqwest::Error>>
            + Send
            + 'static,
    ) -> Self {
        Self {
            inner: Box::pin(byte_stream),
            buffer: String::new(),
            pending: VecDeque::new(),
        }
    }
}

impl Stream for FragmentStream {
    type Item = crate::Result<StreamFragment>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(fragment) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(fragment)));
            }

            // Try to parse a complete line from the buffer
            match parse_next_line(&mut this.buffer) {
                Some(Ok(fragments)) => {
                    this.pending.extend(fragments);
                    continue;
                }
                Some(Err(e)) => return Poll::Ready(Some(Err(e))),
                None => {}
            }

            // Need more data from the byte stream
            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => this.buffer.push_str(text),
                    Err(e) => {
                        return Poll::Ready(Some(Err(CanvasError::StreamError(format!(
                            "Invalid UTF-8 in stream: {}",
                            e
                        )))));
                    }
                },
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(CanvasError::StreamError(e.to_string()))));
                }
                Poll::Ready(None) => {
                    if this.buffer.trim().is_empty() {
                        return Poll::Ready(None);
                    }
                    // Flush a final unterminated line
                    this.buffer.push('\n');
                    match parse_next_line(&mut this.buffer) {
                        Some(Ok(fragments)) => {
                            this.pending.extend(fragments);
                            continue;
                        }
                        Some(Err(e)) => return Poll::Ready(Some(Err(e))),
                        None => return Poll::Ready(None),
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Extract and parse the next complete SSE line from the buffer.
/// Returns `None` when no complete line is available yet.
fn parse_next_line(
    buffer: &mut String,
) -> Option<crate::Result<Vec<StreamFragment>>> {
    loop {
        let newline_pos = buffer.find('\n')?;
        let line = buffer[..newline_pos].trim().to_string();
        buffer.drain(..=newline_pos);

        // Blank lines are SSE event separators
        if line.is_empty() {
            continue;
        }

        let Some(data) = line.strip_prefix("data: ").map(str::trim) else {
            // Skip non-data lines ("event:", "id:", "retry:")
            continue;
        };

        match serde_json::from_str::<GenerateContentResponse>(data) {
            Ok(chunk) => {
                let fragments = fragments_from_chunk(&chunk);
                if fragments.is_empty() {
                    // Keep-alive or metadata-only chunk
                    continue;
                }
                return Some(Ok(fragments));
            }
            Err(e) => {
                return Some(Err(CanvasError::StreamError(format!(
                    "Failed to parse stream chunk: {} (data: {})",
                    e,
                    &data[..data.len().min(200)]
                ))));
            }
        }
    }
}

/// Flatten one response chunk into ordered fragments.
fn fragments_from_chunk(chunk: &GenerateContentResponse) -> Vec<StreamFragment> {
    let mut fragments = Vec::new();

    let Some(content) = chunk.candidates.first().and_then(|c| c.content.as_ref()) else {
        return fragments;
    };

    for part in &content.parts {
        if let Some(text) = &part.text {
            // Thought summaries are not answer text
            if part.thought != Some(true) && !text.is_empty() {
                fragments.push(StreamFragment::Text(text.clone()));
            }
        }

        if let Some(signature) = &part.thought_signature {
            let bytes = BASE64
                .decode(signature)
                .unwrap_or_else(|_| signature.clone().into_bytes());
            fragments.push(StreamFragment::ReasoningSignature(bytes));
        }

        if let Some(call) = &part.function_call {
            fragments.push(StreamFragment::ToolCallRequest(call.clone()));
        }
    }

    fragments
}
