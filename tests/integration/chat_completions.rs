//! Chat completions endpoint integration tests
//!
//! Non-streaming POST /v1/chat/completions: translation in both directions, validation
//! ahead of any upstream call, and upstream error pass-through.

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::{constants, CredentialSetup, TestGateway};
use crate::mocks::UpstreamTestData;

fn hello(model: &str) -> Value {
    json!({
        "model": model,
        "messages": [{"role": "user", "content": "Say hello"}]
    })
}

#[tokio::test]
async fn test_non_streaming_completion() {
    let gateway = TestGateway::start().await;
    gateway
        .upstream
        .mock_completion(UpstreamTestData::completion("claude-opus-4.5", "Hello!"))
        .await;

    let response = gateway.chat().json(&hello("claude-opus-4.5")).await;

    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["object"], "chat.completion");
    assert_eq!(body["model"], "claude-opus-4.5");
    assert_eq!(body["choices"][0]["index"], 0);
    assert_eq!(body["choices"][0]["message"]["role"], "assistant");
    assert_eq!(body["choices"][0]["message"]["content"], "Hello!");
    assert_eq!(body["choices"][0]["finish_reason"], "stop");
    assert_eq!(
        body["usage"],
        json!({"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15})
    );
    assert_eq!(gateway.upstream.request_count().await, 1);
}

#[tokio::test]
async fn test_alias_is_sent_upstream_under_its_upstream_id() {
    let gateway = TestGateway::start().await;
    gateway
        .upstream
        .mock_completion(UpstreamTestData::completion("claude-opus-4.5", "Hi"))
        .await;

    let response = gateway.chat().json(&hello("copilot-opus-45")).await;

    response.assert_status(StatusCode::OK);
    assert_eq!(response.json::<Value>()["model"], "copilot-opus-45");

    let requests = gateway.upstream.requests().await;
    let sent: Value = requests[0].body_json().unwrap();
    assert_eq!(sent["model"], "claude-opus-4.5");
    assert_eq!(sent["stream"], false);
}

#[tokio::test]
async fn test_upstream_receives_routing_headers_and_provider_token() {
    let gateway = TestGateway::start().await;
    gateway
        .upstream
        .mock_completion(UpstreamTestData::completion("gpt-4.1", "Hi"))
        .await;

    gateway
        .chat()
        .json(&hello("gpt-4.1"))
        .await
        .assert_status(StatusCode::OK);

    let requests = gateway.upstream.requests().await;
    let headers = &requests[0].headers;
    assert_eq!(headers.get("authorization").unwrap(), "Bearer token-1");
    assert_eq!(
        headers.get("copilot-integration-id").unwrap(),
        constants::TEST_INTEGRATION_ID
    );
    assert_eq!(headers.get("editor-version").unwrap(), constants::TEST_EDITOR_VERSION);
    assert_eq!(headers.get("x-initiator").unwrap(), "user");
    assert!(headers.get("copilot-vision-request").is_none());
}

#[tokio::test]
async fn test_agent_initiator_and_vision_flag() {
    let gateway = TestGateway::start().await;
    gateway
        .upstream
        .mock_completion(UpstreamTestData::completion("gpt-4.1", "A cat."))
        .await;

    let request = json!({
        "model": "gpt-4.1",
        "messages": [
            {"role": "user", "content": [
                {"type": "text", "text": "What is in this image?"},
                {"type": "image_url", "image_url": {"url": "data:image/png;base64,iVBORw0KGgo="}}
            ]},
            {"role": "assistant", "content": null, "tool_calls": [{
                "id": "call_1", "type": "function",
                "function": {"name": "describe", "arguments": "{}"}
            }]},
            {"role": "tool", "tool_call_id": "call_1", "content": "a cat"}
        ],
        "tools": [{"type": "function", "function": {"name": "describe", "parameters": {"type": "object"}}}]
    });

    gateway.chat().json(&request).await.assert_status(StatusCode::OK);

    let requests = gateway.upstream.requests().await;
    let headers = &requests[0].headers;
    assert_eq!(headers.get("x-initiator").unwrap(), "agent");
    assert_eq!(headers.get("copilot-vision-request").unwrap(), "true");
}

#[tokio::test]
async fn test_split_choices_are_merged() {
    let gateway = TestGateway::start().await;
    gateway
        .upstream
        .mock_completion(UpstreamTestData::split_tool_call("claude-sonnet-4.5"))
        .await;

    let request = json!({
        "model": "claude-sonnet-4.5",
        "messages": [{"role": "user", "content": "Weather in Oslo?"}],
        "tools": [{"type": "function", "function": {
            "name": "get_weather",
            "parameters": {"type": "object", "properties": {"city": {"type": "string"}}}
        }}]
    });

    let response = gateway.chat().json(&request).await;

    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    let choices = body["choices"].as_array().unwrap();
    assert_eq!(choices.len(), 1);
    assert_eq!(choices[0]["message"]["content"], "Checking the weather.");
    assert_eq!(choices[0]["message"]["tool_calls"][0]["id"], "call_1");
    assert_eq!(
        choices[0]["message"]["tool_calls"][0]["function"]["arguments"],
        "{\"city\":\"Oslo\"}"
    );
    assert_eq!(choices[0]["finish_reason"], "tool_calls");
}

#[tokio::test]
async fn test_unknown_model_is_rejected_before_credentials() {
    let gateway = TestGateway::start().await;

    let response = gateway.chat().json(&hello("nonexistent-model")).await;

    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "model_not_found");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("nonexistent-model"));
    assert_eq!(gateway.refresh_count(), 0);
    assert_eq!(gateway.upstream.request_count().await, 0);
}

#[tokio::test]
async fn test_invalid_requests_never_reach_upstream() {
    let gateway = TestGateway::start().await;

    let cases = vec![
        json!({"model": "gpt-4o", "messages": []}),
        json!({"model": "gpt-4o", "messages": [{"role": "user", "content": "hi"}], "max_tokens": 5000}),
        json!({"model": "gpt-4o", "messages": [{"role": "user", "content": "hi"}], "temperature": 3.5}),
        json!({"model": "gpt-4o", "messages": [{"role": "user", "content": "hi"}], "n": 2}),
        json!({"model": "gpt-4o", "messages": [{"role": "user", "content": "hi"}],
               "tools": [{"type": "function", "function": {"name": "bad name!"}}]}),
        json!({"model": "o3-mini", "messages": [{"role": "user", "content": [
            {"type": "image_url", "image_url": {"url": "https://example.com/cat.png"}}
        ]}]}),
        json!({"messages": [{"role": "user", "content": "hi"}]}),
    ];

    for case in cases {
        let response = gateway.chat().json(&case).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(
            response.json::<Value>()["error"]["type"],
            "invalid_request_error",
            "case: {}",
            case
        );
    }

    assert_eq!(gateway.upstream.request_count().await, 0);
}

#[tokio::test]
async fn test_malformed_json_body() {
    let gateway = TestGateway::start().await;

    let response = gateway.chat().text("{not json").await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"]["code"], "invalid_request");
}

#[tokio::test]
async fn test_missing_gateway_secret() {
    let gateway = TestGateway::start().await;

    let response = gateway
        .server
        .post("/v1/chat/completions")
        .json(&hello("claude-opus-4.5"))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(gateway.refresh_count(), 0);
    assert_eq!(gateway.upstream.request_count().await, 0);
}

#[tokio::test]
async fn test_upstream_forbidden_and_rate_limited_pass_through() {
    for (status, expected) in [(403, StatusCode::FORBIDDEN), (429, StatusCode::TOO_MANY_REQUESTS)] {
        let gateway = TestGateway::start().await;
        gateway
            .upstream
            .mock_error(status, json!({"error": {"message": "nope"}}))
            .await;

        let response = gateway.chat().json(&hello("claude-opus-4.5")).await;

        response.assert_status(expected);
        let body: Value = response.json();
        assert_eq!(body["error"]["type"], "upstream_error");
        assert_eq!(body["error"]["upstream_status"], status);
        // Not an auth rejection, so no second attempt
        assert_eq!(gateway.upstream.request_count().await, 1);
    }
}

#[tokio::test]
async fn test_upstream_server_error_is_bad_gateway() {
    let gateway = TestGateway::start().await;
    gateway
        .upstream
        .mock_error(500, json!({"error": {"message": "boom"}}))
        .await;

    let response = gateway.chat().json(&hello("gpt-4.1")).await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    assert_eq!(gateway.upstream.request_count().await, 1);
}

#[tokio::test]
async fn test_incomplete_upstream_response_is_protocol_error() {
    let gateway = TestGateway::start().await;
    gateway
        .upstream
        .mock_completion(json!({
            "id": "chatcmpl-x",
            "created": 1,
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "hi"}, "finish_reason": "stop"}]
        }))
        .await;

    let response = gateway.chat().json(&hello("gpt-4.1")).await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    assert_eq!(response.json::<Value>()["error"]["code"], "upstream_protocol_error");
}

#[tokio::test]
async fn test_no_credential_source_is_service_unavailable() {
    let gateway = TestGateway::start_with(CredentialSetup::Unconfigured).await;

    let response = gateway.chat().json(&hello("claude-opus-4.5")).await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.json::<Value>()["error"]["code"], "auth_unavailable");
    assert_eq!(gateway.upstream.request_count().await, 0);
}
