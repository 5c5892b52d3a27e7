//! Authentication middleware
//!
//! Callers present the gateway secret as `Authorization: Bearer <secret>`. The secret is
//! compared by SHA-256 digest so the comparison does not depend on where the inputs differ.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use tracing::{instrument, warn};

use crate::{error::GatewayError, AppState};

/// Extract the bearer token from an Authorization header value
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Hex-encoded SHA-256 of a secret
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Reject requests that do not carry the gateway secret
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(extract_bearer_token)
        .ok_or_else(|| {
            warn!("Request without a bearer token");
            GatewayError::Unauthorized
        })?;

    if hash_secret(token) != state.gateway_secret_hash {
        warn!("Request with an invalid gateway secret");
        return Err(GatewayError::Unauthorized);
    }

    Ok(next.run(request).await)
}
