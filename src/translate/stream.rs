//! Streaming response translation
//!
//! [`StreamTranslator`] turns raw upstream SSE bytes into OpenAI `chat.completion.chunk` values,
//! one feed at a time. [`translate_stream`] drives it over the upstream byte stream and frames
//! the result for the caller, so each chunk is written as soon as its upstream line is complete.
//!
//! Every stream ends in exactly one of two ways:
//! - a terminal chunk with a non-null `finish_reason`, then `data: [DONE]`
//! - one `data: {"error":{...}}` line, then `data: [DONE]`

use std::convert::Infallible;

use async_stream::stream;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tracing::{debug, warn};

use super::response::{map_finish_reason, map_usage};
use crate::error::{GatewayError, GatewayResult};
use crate::openai::{CompletionChunk, Delta, FinishReason, Usage};
use crate::routes::metrics;
use crate::streaming::{format_error_event, format_sse_chunk, format_sse_done, SseLineBuffer};
use crate::upstream::types::UpstreamStreamChunk;
use crate::upstream::ByteStream;

fn protocol(message: impl Into<String>) -> GatewayError {
    GatewayError::UpstreamProtocolError(message.into())
}

fn upstream_error_message(error: &serde_json::Value) -> String {
    error
        .get("message")
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string())
}

/// Per-response streaming state
#[derive(Debug)]
pub struct StreamTranslator {
    lines: SseLineBuffer,
    id: String,
    created: i64,
    model: String,
    include_usage: bool,
    /// Whether any chunk has been handed out; id and created are fixed from then on
    started: bool,
    /// Finish reason seen upstream, held back until the stream ends
    finish: Option<(u32, FinishReason)>,
    usage: Option<Usage>,
    done: bool,
}

impl StreamTranslator {
    /// `id` and `created` are used until the upstream reports its own
    pub fn new(id: String, created: i64, public_model: &str, include_usage: bool) -> Self {
        Self {
            lines: SseLineBuffer::new(),
            id,
            created,
            model: public_model.to_string(),
            include_usage,
            started: false,
            finish: None,
            usage: None,
            done: false,
        }
    }

    /// Translator with a generated id and the current time
    pub fn for_model(public_model: &str, include_usage: bool) -> Self {
        Self::new(
            format!("chatcmpl-{}", uuid::Uuid::new_v4().simple()),
            chrono::Utc::now().timestamp(),
            public_model,
            include_usage,
        )
    }

    /// Whether the upstream sent its `[DONE]` terminator
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Usage reported by the upstream so far
    pub fn usage(&self) -> Option<Usage> {
        self.usage
    }

    /// Consume a slice of upstream bytes, appending the chunks it completes to `out`.
    ///
    /// On error, `out` still holds every chunk completed before the failing line, in upstream
    /// order, so the caller can relay them ahead of the error.
    pub fn feed(&mut self, bytes: &[u8], out: &mut Vec<CompletionChunk>) -> GatewayResult<()> {
        let mut lines = Vec::new();
        let buffered = self.lines.feed(bytes, &mut lines);
        for line in &lines {
            self.process_line(line, out)?;
        }
        buffered
    }

    /// Close the stream, appending the terminal chunk to `out`
    pub fn finish(&mut self, out: &mut Vec<CompletionChunk>) -> GatewayResult<()> {
        if let Some(line) = self.lines.flush() {
            self.process_line(&line, out)?;
        }

        let (index, reason) = match self.finish.take() {
            Some(finish) => finish,
            None if self.done => (0, FinishReason::Stop),
            None => return Err(protocol("stream ended before a finish_reason or [DONE]")),
        };

        let role = self.take_role();
        let mut terminal = self.chunk(
            index,
            Delta {
                role,
                ..Default::default()
            },
            Some(reason),
        );
        if self.include_usage {
            terminal.usage = self.usage;
        }
        out.push(terminal);

        Ok(())
    }

    fn take_role(&mut self) -> Option<String> {
        if self.started {
            None
        } else {
            self.started = true;
            Some("assistant".to_string())
        }
    }

    fn chunk(&self, index: u32, delta: Delta, finish_reason: Option<FinishReason>) -> CompletionChunk {
        CompletionChunk::new(&self.id, self.created, &self.model, index, delta, finish_reason)
    }

    fn process_line(&mut self, line: &str, out: &mut Vec<CompletionChunk>) -> GatewayResult<()> {
        if self.done {
            return Ok(());
        }
        // Comments, `event:`, `id:` and `retry:` lines carry nothing we relay
        let Some(payload) = line.strip_prefix("data:") else {
            return Ok(());
        };
        let payload = payload.trim();
        if payload.is_empty() {
            return Ok(());
        }
        if payload == "[DONE]" {
            self.done = true;
            return Ok(());
        }

        let chunk: UpstreamStreamChunk = serde_json::from_str(payload)
            .map_err(|e| protocol(format!("malformed stream chunk: {}", e)))?;

        if let Some(error) = &chunk.error {
            return Err(GatewayError::upstream(None, &upstream_error_message(error)));
        }

        if !self.started {
            if let Some(id) = chunk.id.filter(|id| !id.is_empty()) {
                self.id = id;
            }
            if let Some(created) = chunk.created.filter(|c| *c > 0) {
                self.created = created;
            }
        }
        if let Some(usage) = chunk.usage.as_ref().and_then(map_usage) {
            self.usage = Some(usage);
        }

        for choice in chunk.choices {
            let index = choice.index.unwrap_or(0);
            let delta = choice.delta.unwrap_or_default();
            let content = delta.content.filter(|c| !c.is_empty());
            let tool_calls = delta.tool_calls.filter(|calls| !calls.is_empty());

            if content.is_some() || tool_calls.is_some() {
                if self.finish.is_some() {
                    return Err(protocol("content received after finish_reason"));
                }
                let role = self.take_role();
                out.push(self.chunk(
                    index,
                    Delta {
                        role,
                        content,
                        tool_calls,
                    },
                    None,
                ));
            }

            if let Some(reason) = choice.finish_reason.as_deref() {
                let reason = map_finish_reason(reason)?;
                if self.finish.is_none() {
                    self.finish = Some((index, reason));
                }
            }
        }

        Ok(())
    }
}

/// Frame chunks for the caller. Serialization stops at the first chunk that fails.
fn frame_chunks(chunks: Vec<CompletionChunk>) -> (Vec<Bytes>, Option<GatewayError>) {
    let mut frames = Vec::with_capacity(chunks.len());
    for chunk in &chunks {
        match format_sse_chunk(chunk) {
            Ok(frame) => frames.push(frame),
            Err(e) => return (frames, Some(GatewayError::Internal(e.into()))),
        }
    }
    (frames, None)
}

/// Translate an upstream SSE byte stream into caller-facing SSE frames.
///
/// Chunks completed by a read are written before any error found later in the same read.
/// The returned stream owns `upstream`; dropping it (caller disconnect) drops the upstream
/// response and aborts that request.
pub fn translate_stream(
    upstream: ByteStream,
    mut translator: StreamTranslator,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send {
    stream! {
        let mut upstream = upstream;

        while let Some(item) = upstream.next().await {
            let mut chunks = Vec::new();
            let fed = item.and_then(|bytes| translator.feed(&bytes, &mut chunks));

            let (frames, framing_error) = frame_chunks(chunks);
            for frame in frames {
                yield Ok(frame);
            }

            if let Some(error) = framing_error.or(fed.err()) {
                warn!(error = %error, model = %translator.model, "Upstream stream failed");
                yield Ok(format_error_event(&error));
                yield Ok(format_sse_done());
                return;
            }

            if translator.is_done() {
                break;
            }
        }

        let mut chunks = Vec::new();
        let finished = translator.finish(&mut chunks);

        let (frames, framing_error) = frame_chunks(chunks);
        for frame in frames {
            yield Ok(frame);
        }

        if let Some(error) = framing_error.or(finished.err()) {
            warn!(error = %error, model = %translator.model, "Upstream stream ended abnormally");
            yield Ok(format_error_event(&error));
        }

        if let Some(usage) = translator.usage() {
            metrics::record_tokens("prompt", usage.prompt_tokens, &translator.model);
            metrics::record_tokens("completion", usage.completion_tokens, &translator.model);
        }
        debug!(model = %translator.model, "Stream complete");

        yield Ok(format_sse_done());
    }
}
