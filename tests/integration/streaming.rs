//! Streaming chat completions integration tests
//!
//! POST /v1/chat/completions with `stream: true`: SSE framing, chunk translation and the
//! `[DONE]` terminator on both clean and failed streams.

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::{sse_payloads, TestGateway};
use crate::mocks::{format_sse, UpstreamTestData};

fn stream_request(model: &str) -> Value {
    json!({
        "model": model,
        "stream": true,
        "messages": [{"role": "user", "content": "Say hello"}]
    })
}

fn chunks(payloads: &[String]) -> Vec<Value> {
    payloads
        .iter()
        .filter(|p| p.as_str() != "[DONE]")
        .map(|p| serde_json::from_str(p).unwrap())
        .collect()
}

#[tokio::test]
async fn test_stream_is_translated_and_terminated() {
    let gateway = TestGateway::start().await;
    gateway
        .upstream
        .mock_stream(&UpstreamTestData::hello_stream())
        .await;

    let response = gateway.chat().json(&stream_request("claude-opus-4.5")).await;

    response.assert_status(StatusCode::OK);
    assert!(response
        .header("content-type")
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let payloads = sse_payloads(&response.text());
    assert_eq!(payloads.last().map(String::as_str), Some("[DONE]"));
    assert_eq!(payloads.iter().filter(|p| p.as_str() == "[DONE]").count(), 1);

    let chunks = chunks(&payloads);
    assert!(!chunks.is_empty());
    for chunk in &chunks {
        assert_eq!(chunk["object"], "chat.completion.chunk");
        assert_eq!(chunk["model"], "claude-opus-4.5");
        assert_eq!(chunk["id"], chunks[0]["id"]);
    }

    let content: String = chunks
        .iter()
        .filter_map(|c| c["choices"][0]["delta"]["content"].as_str())
        .collect();
    assert_eq!(content, "Hello world");
    assert_eq!(chunks[0]["choices"][0]["delta"]["role"], "assistant");

    let finishes: Vec<&Value> = chunks
        .iter()
        .map(|c| &c["choices"][0]["finish_reason"])
        .filter(|f| !f.is_null())
        .collect();
    assert_eq!(finishes, vec![&json!("stop")]);

    // Usage was not requested by the caller
    assert!(chunks.iter().all(|c| c.get("usage").map_or(true, Value::is_null)));
}

#[tokio::test]
async fn test_upstream_is_asked_to_stream_with_usage() {
    let gateway = TestGateway::start().await;
    gateway
        .upstream
        .mock_stream(&UpstreamTestData::hello_stream())
        .await;

    gateway
        .chat()
        .json(&stream_request("gpt-4.1"))
        .await
        .assert_status(StatusCode::OK);

    let requests = gateway.upstream.requests().await;
    let sent: Value = requests[0].body_json().unwrap();
    assert_eq!(sent["stream"], true);
    assert_eq!(sent["stream_options"]["include_usage"], true);
    assert_eq!(
        requests[0].headers.get("accept").unwrap(),
        "text/event-stream"
    );
}

#[tokio::test]
async fn test_usage_relayed_when_requested() {
    let gateway = TestGateway::start().await;
    gateway
        .upstream
        .mock_stream(&UpstreamTestData::hello_stream())
        .await;

    let mut request = stream_request("claude-sonnet-4.5");
    request["stream_options"] = json!({"include_usage": true});

    let response = gateway.chat().json(&request).await;

    response.assert_status(StatusCode::OK);
    let chunks = chunks(&sse_payloads(&response.text()));
    let usage: Vec<&Value> = chunks
        .iter()
        .map(|c| &c["usage"])
        .filter(|u| !u.is_null())
        .collect();
    assert_eq!(
        usage,
        vec![&json!({"prompt_tokens": 9, "completion_tokens": 2, "total_tokens": 11})]
    );
}

#[tokio::test]
async fn test_truncated_upstream_stream_ends_with_error_then_done() {
    let gateway = TestGateway::start().await;
    let events = vec![json!({
        "id": "chatcmpl-up", "created": 1,
        "choices": [{"index": 0, "delta": {"role": "assistant", "content": "Hel"}}]
    })];
    gateway
        .upstream
        .mock_raw_stream(&format_sse(&events, false))
        .await;

    let response = gateway.chat().json(&stream_request("claude-opus-4.5")).await;

    // Headers were already sent, so the failure is reported in-band
    response.assert_status(StatusCode::OK);
    let payloads = sse_payloads(&response.text());
    assert_eq!(payloads.last().map(String::as_str), Some("[DONE]"));

    let error = chunks(&payloads)
        .into_iter()
        .find(|c| c.get("error").is_some())
        .expect("error event");
    assert_eq!(error["error"]["code"], "upstream_protocol_error");
}

#[tokio::test]
async fn test_upstream_error_payload_mid_stream() {
    let gateway = TestGateway::start().await;
    let body = concat!(
        "data: {\"id\":\"c\",\"created\":1,\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hi\"}}]}\n\n",
        "data: {\"error\":{\"message\":\"model overloaded\"}}\n\n",
    );
    gateway.upstream.mock_raw_stream(body).await;

    let response = gateway.chat().json(&stream_request("gpt-4.1")).await;

    let payloads = sse_payloads(&response.text());
    assert_eq!(payloads.last().map(String::as_str), Some("[DONE]"));
    let error = chunks(&payloads)
        .into_iter()
        .find(|c| c.get("error").is_some())
        .expect("error event");
    assert!(error["error"]["message"]
        .as_str()
        .unwrap()
        .contains("model overloaded"));
}

#[tokio::test]
async fn test_stream_rejected_upstream_returns_plain_error() {
    let gateway = TestGateway::start().await;
    gateway
        .upstream
        .mock_error(429, json!({"error": {"message": "slow down"}}))
        .await;

    let response = gateway.chat().json(&stream_request("claude-opus-4.5")).await;

    // The upstream refused before any SSE was produced, so the caller gets a JSON error
    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.json::<Value>()["error"]["upstream_status"], 429);
}

#[tokio::test]
async fn test_stream_unknown_model() {
    let gateway = TestGateway::start().await;

    let response = gateway.chat().json(&stream_request("nonexistent-model")).await;

    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(gateway.refresh_count(), 0);
    assert_eq!(gateway.upstream.request_count().await, 0);
}
