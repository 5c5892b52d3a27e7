//! Chat completions endpoint
//!
//! OpenAI-compatible chat completions API endpoint.
//! Handles both streaming and non-streaming responses.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::{debug, info, warn};

use crate::{
    error::{GatewayError, GatewayResult},
    openai::ChatRequest,
    registry::ModelDescriptor,
    routes::metrics::{record_request, record_tokens},
    translate::{translate, translate_complete, translate_stream, StreamTranslator},
    upstream::UpstreamRequest,
    AppState,
};

/// Largest request body accepted. Base64 images make chat requests large.
const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Handle chat completion requests
pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Response, GatewayError> {
    let start_time = Instant::now();

    let body = to_bytes(request.into_body(), MAX_BODY_BYTES)
        .await
        .map_err(|e| GatewayError::InvalidRequest(format!("Failed to read request body: {}", e)))?;

    let chat_request: ChatRequest = serde_json::from_slice(&body)
        .map_err(|e| GatewayError::InvalidRequest(format!("Invalid request body: {}", e)))?;

    if !chat_request.extra.is_empty() {
        let ignored: Vec<&str> = chat_request.extra.keys().map(String::as_str).collect();
        debug!(fields = ?ignored, "Ignoring unsupported request fields");
    }

    // Unknown names are folded into one label to keep metric cardinality bounded
    let model_label = match state.registry.get(&chat_request.model) {
        Some(model) => model.public_id.clone(),
        None => "unknown".to_string(),
    };
    let is_streaming = chat_request.stream;

    info!(
        model = %chat_request.model,
        stream = is_streaming,
        messages = chat_request.messages.len(),
        "Processing chat completion request"
    );

    let result = if is_streaming {
        handle_streaming_chat(&state, chat_request).await
    } else {
        handle_non_streaming_chat(&state, chat_request).await
    };

    let status = match &result {
        Ok(response) => response.status(),
        Err(e) => {
            warn!(
                model = %model_label,
                code = e.label(),
                status = e.status_code().as_u16(),
                error = %e,
                "Chat completion request failed"
            );
            e.status_code()
        }
    };
    record_request(
        status.as_str(),
        &model_label,
        is_streaming,
        start_time.elapsed().as_secs_f64(),
    );

    result
}

/// Resolve the model and build the upstream call. Runs before any credential is used.
fn prepare(
    state: &AppState,
    request: &ChatRequest,
) -> GatewayResult<(ModelDescriptor, UpstreamRequest)> {
    let model = state.registry.resolve(&request.model)?.clone();
    let upstream_request = translate(request, &model)?;
    Ok((model, upstream_request))
}

async fn handle_non_streaming_chat(
    state: &AppState,
    request: ChatRequest,
) -> GatewayResult<Response> {
    let (model, upstream_request) = prepare(state, &request)?;

    let upstream = &state.upstream;
    let upstream_request = &upstream_request;
    let response = state
        .credentials
        .with_refresh(|token| async move { upstream.chat_completions(&token, upstream_request).await })
        .await?;

    let completion = translate_complete(response, &model.public_id)?;

    record_tokens("prompt", completion.usage.prompt_tokens, &model.public_id);
    record_tokens("completion", completion.usage.completion_tokens, &model.public_id);

    info!(
        model = %model.public_id,
        upstream_model = %model.upstream_id,
        total_tokens = completion.usage.total_tokens,
        "Chat completion request completed"
    );

    Ok((StatusCode::OK, Json(completion)).into_response())
}

async fn handle_streaming_chat(state: &AppState, request: ChatRequest) -> GatewayResult<Response> {
    let (model, upstream_request) = prepare(state, &request)?;

    let upstream = &state.upstream;
    let upstream_request = &upstream_request;
    let byte_stream = state
        .credentials
        .with_refresh(|token| async move {
            upstream.chat_completions_stream(&token, upstream_request).await
        })
        .await?;

    let translator = StreamTranslator::for_model(&model.public_id, request.wants_stream_usage());
    let body = Body::from_stream(translate_stream(byte_stream, translator));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .header("X-Accel-Buffering", "no")
        .body(body)
        .map_err(|e| GatewayError::Internal(anyhow::anyhow!("Failed to build response: {}", e)))
}
