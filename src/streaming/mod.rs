//! SSE (Server-Sent Events) framing
//!
//! Line buffering for reading the upstream stream and the `data:` framing written to callers.

use bytes::Bytes;
use serde::Serialize;

use crate::error::{GatewayError, GatewayResult};
use crate::openai::CompletionChunk;

/// Longest line accepted from the upstream before the stream is treated as broken
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Buffer for accumulating incomplete SSE lines across chunk boundaries.
///
/// Network reads do not respect line boundaries, and a multi-byte UTF-8 sequence can be split
/// between two reads. Bytes are therefore buffered raw and only decoded once a full line
/// (ending with `\n`) is available.
///
/// # Example
/// ```
/// use copilot_gateway::streaming::SseLineBuffer;
///
/// let mut buffer = SseLineBuffer::new();
/// let mut lines = Vec::new();
///
/// // First chunk contains partial line
/// buffer.feed(b"data: {\"content\":\"hel", &mut lines).unwrap();
/// assert!(lines.is_empty());
///
/// // Second chunk completes the line
/// buffer.feed(b"lo\"}\n", &mut lines).unwrap();
/// assert_eq!(lines, vec!["data: {\"content\":\"hello\"}"]);
/// ```
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    incomplete: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self {
            incomplete: Vec::new(),
        }
    }

    /// Feed bytes into the buffer and append any complete, non-empty lines to `lines`.
    ///
    /// The trailing `\n` and an optional `\r` before it are stripped. Incomplete trailing data
    /// is retained for the next call, up to [`MAX_LINE_BYTES`]. Lines completed by this call are
    /// appended even when the remainder then overflows.
    pub fn feed(&mut self, bytes: &[u8], lines: &mut Vec<String>) -> GatewayResult<()> {
        self.incomplete.extend_from_slice(bytes);

        let mut start = 0;

        while let Some(offset) = self.incomplete[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            if let Some(line) = decode_line(&self.incomplete[start..end]) {
                lines.push(line);
            }
            start = end + 1;
        }

        self.incomplete.drain(..start);

        if self.incomplete.len() > MAX_LINE_BYTES {
            self.incomplete.clear();
            return Err(GatewayError::UpstreamProtocolError(format!(
                "stream line exceeds {} bytes without a newline",
                MAX_LINE_BYTES
            )));
        }

        Ok(())
    }

    /// Take whatever is left as a final line. Used when the stream ends without a newline.
    pub fn flush(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.incomplete);
        decode_line(&rest)
    }
}

fn decode_line(raw: &[u8]) -> Option<String> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    if raw.is_empty() {
        return None;
    }
    Some(String::from_utf8_lossy(raw).into_owned())
}

/// Format a chunk as an SSE data event: `data: {json}\n\n`
pub fn format_sse_chunk(chunk: &CompletionChunk) -> Result<Bytes, serde_json::Error> {
    let json = serde_json::to_string(chunk)?;
    Ok(Bytes::from(format!("data: {}\n\n", json)))
}

/// The stream terminator: `data: [DONE]\n\n`
pub fn format_sse_done() -> Bytes {
    Bytes::from_static(b"data: [DONE]\n\n")
}

#[derive(Debug, Serialize)]
struct SseErrorEvent<'a> {
    error: SseErrorDetails<'a>,
}

#[derive(Debug, Serialize)]
struct SseErrorDetails<'a> {
    message: String,
    #[serde(rename = "type")]
    error_type: &'a str,
    code: &'a str,
}

/// Format a mid-stream failure as an SSE error event, using the same envelope as error responses
pub fn format_error_event(error: &GatewayError) -> Bytes {
    let body = error.to_body();
    let event = SseErrorEvent {
        error: SseErrorDetails {
            message: body.error.message,
            error_type: &body.error.error_type,
            code: &body.error.code,
        },
    };
    // Plain strings always serialize; the fallback keeps the stream well-formed regardless
    let json = serde_json::to_string(&event).unwrap_or_else(|_| {
        r#"{"error":{"message":"stream failed","type":"server_error","code":"internal_error"}}"#
            .to_string()
    });
    Bytes::from(format!("data: {}\n\n", json))
}
