//! Mock upstream chat API for testing
//!
//! Provides wiremock-based mocks for the one upstream endpoint the gateway calls:
//! - POST /chat/completions - Chat completions (streaming and non-streaming)
//!
//! # Example
//!
//! ```rust,ignore
//! use crate::mocks::upstream::{MockUpstream, UpstreamTestData};
//!
//! #[tokio::test]
//! async fn test_with_upstream_mock() {
//!     let upstream = MockUpstream::start().await;
//!     upstream.mock_completion(UpstreamTestData::completion("claude-opus-4.5", "Hi")).await;
//!
//!     // Point the gateway at upstream.uri()
//! }
//! ```

use serde_json::{json, Value};
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, Request, ResponseTemplate,
};

pub const CHAT_PATH: &str = "/chat/completions";

/// Mock upstream server wrapper
pub struct MockUpstream {
    server: MockServer,
}

impl MockUpstream {
    /// Start a new mock upstream server
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL to configure the gateway with
    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Successful non-streaming completion for any token
    pub async fn mock_completion(&self, body: Value) {
        Mock::given(method("POST"))
            .and(path(CHAT_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Successful non-streaming completion, only for the given upstream token
    pub async fn mock_completion_for_token(&self, token: &str, body: Value) {
        Mock::given(method("POST"))
            .and(path(CHAT_PATH))
            .and(header("authorization", format!("Bearer {}", token).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Successful SSE stream made of the given `data:` payloads, terminated by `[DONE]`
    pub async fn mock_stream(&self, events: &[Value]) {
        Mock::given(method("POST"))
            .and(path(CHAT_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(format_sse(events, true), "text/event-stream")
                    .insert_header("Cache-Control", "no-cache"),
            )
            .mount(&self.server)
            .await;
    }

    /// SSE stream with an arbitrary raw body
    pub async fn mock_raw_stream(&self, body: &str) {
        Mock::given(method("POST"))
            .and(path(CHAT_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/event-stream"),
            )
            .mount(&self.server)
            .await;
    }

    /// Error status with a body, for any token
    pub async fn mock_error(&self, status: u16, body: Value) {
        Mock::given(method("POST"))
            .and(path(CHAT_PATH))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// 401 for the given upstream token only
    pub async fn mock_rejected_token(&self, token: &str) {
        Mock::given(method("POST"))
            .and(path(CHAT_PATH))
            .and(header("authorization", format!("Bearer {}", token).as_str()))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"message": "token expired", "code": "unauthorized"}
            })))
            .mount(&self.server)
            .await;
    }

    /// Every request the upstream has received so far
    pub async fn requests(&self) -> Vec<Request> {
        self.server.received_requests().await.unwrap_or_default()
    }

    /// Number of requests the upstream has received so far
    pub async fn request_count(&self) -> usize {
        self.requests().await.len()
    }

    /// Authorization header values seen by the upstream, in order
    pub async fn seen_tokens(&self) -> Vec<String> {
        self.requests()
            .await
            .iter()
            .filter_map(|r| r.headers.get("authorization"))
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect()
    }
}

/// Render `data:` events as an SSE body
pub fn format_sse(events: &[Value], with_done: bool) -> String {
    let mut body = String::new();
    for event in events {
        body.push_str(&format!("data: {}\n\n", event));
    }
    if with_done {
        body.push_str("data: [DONE]\n\n");
    }
    body
}

/// Canned upstream payloads
pub struct UpstreamTestData;

impl UpstreamTestData {
    /// A complete response with a single text choice
    pub fn completion(upstream_model: &str, content: &str) -> Value {
        json!({
            "id": "chatcmpl-upstream-1",
            "object": "chat.completion",
            "created": 1_735_689_600,
            "model": upstream_model,
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        })
    }

    /// Split answer: text in one choice, the tool call in a second choice with the same index
    pub fn split_tool_call(upstream_model: &str) -> Value {
        json!({
            "id": "chatcmpl-upstream-2",
            "created": 1_735_689_600,
            "model": upstream_model,
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "Checking the weather."}},
                {
                    "index": 0,
                    "message": {
                        "role": "assistant",
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": {"name": "get_weather", "arguments": "{\"city\":\"Oslo\"}"}
                        }]
                    },
                    "finish_reason": "tool_calls"
                }
            ],
            "usage": {"prompt_tokens": 40, "completion_tokens": 18, "total_tokens": 58}
        })
    }

    /// Streaming events spelling "Hello world" followed by a stop and a usage event
    pub fn hello_stream() -> Vec<Value> {
        vec![
            json!({"id": "chatcmpl-up-s", "created": 1_735_689_600,
                   "choices": [{"index": 0, "delta": {"role": "assistant", "content": ""}}]}),
            json!({"id": "chatcmpl-up-s", "created": 1_735_689_600,
                   "choices": [{"index": 0, "delta": {"content": "Hello"}}]}),
            json!({"id": "chatcmpl-up-s", "created": 1_735_689_600,
                   "choices": [{"index": 0, "delta": {"content": " world"}}]}),
            json!({"id": "chatcmpl-up-s", "created": 1_735_689_600,
                   "choices": [{"index": 0, "delta": {}, "finish_reason": "stop"}]}),
            json!({"id": "chatcmpl-up-s", "created": 1_735_689_600, "choices": [],
                   "usage": {"prompt_tokens": 9, "completion_tokens": 2, "total_tokens": 11}}),
        ]
    }
}
