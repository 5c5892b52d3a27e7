//! Upstream request headers
//!
//! Caller headers are never forwarded. Every upstream call carries only the provider token and
//! the routing headers the upstream uses to classify the request.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};

use super::types::RoutingMetadata;
use crate::credentials::AccessToken;
use crate::error::{GatewayError, GatewayResult};

pub const COPILOT_INTEGRATION_ID: HeaderName = HeaderName::from_static("copilot-integration-id");
pub const EDITOR_VERSION: HeaderName = HeaderName::from_static("editor-version");
pub const OPENAI_INTENT: HeaderName = HeaderName::from_static("openai-intent");
pub const X_INITIATOR: HeaderName = HeaderName::from_static("x-initiator");
pub const COPILOT_VISION_REQUEST: HeaderName = HeaderName::from_static("copilot-vision-request");
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Static client identity sent on every call
#[derive(Debug, Clone)]
pub struct ClientIdentity {
    pub integration_id: String,
    pub editor_version: String,
}

/// Build the headers for one upstream call
pub fn build_upstream_headers(
    token: &AccessToken,
    identity: &ClientIdentity,
    routing: &RoutingMetadata,
    request_id: &str,
    stream: bool,
) -> GatewayResult<HeaderMap> {
    let mut headers = HeaderMap::new();

    let mut auth = HeaderValue::from_str(&format!("Bearer {}", token.expose())).map_err(|_| {
        GatewayError::AuthUnavailable("upstream token contains invalid header characters".into())
    })?;
    auth.set_sensitive(true);
    headers.insert(AUTHORIZATION, auth);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(if stream {
            "text/event-stream"
        } else {
            "application/json"
        }),
    );

    headers.insert(COPILOT_INTEGRATION_ID, header_value(&identity.integration_id)?);
    headers.insert(EDITOR_VERSION, header_value(&identity.editor_version)?);
    headers.insert(OPENAI_INTENT, HeaderValue::from_static("conversation-panel"));
    headers.insert(X_INITIATOR, HeaderValue::from_static(routing.initiator.as_str()));
    if routing.vision {
        headers.insert(COPILOT_VISION_REQUEST, HeaderValue::from_static("true"));
    }
    headers.insert(X_REQUEST_ID, header_value(request_id)?);

    Ok(headers)
}

fn header_value(value: &str) -> GatewayResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| GatewayError::Internal(anyhow::anyhow!("invalid header value {:?}: {}", value, e)))
}
