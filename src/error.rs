//! Error types for the gateway
//!
//! Every failure a caller can observe is one of the `GatewayError` variants below. Responses
//! mirror OpenAI's error envelope so existing client libraries surface them unchanged.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum number of characters of upstream error text relayed to callers
pub const UPSTREAM_MESSAGE_LIMIT: usize = 512;

/// Gateway-level errors
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Invalid or missing API key")]
    Unauthorized,

    #[error("The model '{0}' does not exist")]
    UnknownModel(String),

    #[error("{0}")]
    CapabilityUnsupported(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("Upstream credentials unavailable: {0}")]
    AuthUnavailable(String),

    #[error("Upstream error{}: {message}", status_suffix(.status))]
    UpstreamError {
        status: Option<u16>,
        message: String,
    },

    #[error("Upstream protocol error: {0}")]
    UpstreamProtocolError(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl GatewayError {
    /// Build an upstream error from a status code and raw body, truncating the body
    pub fn upstream(status: Option<u16>, body: &str) -> Self {
        GatewayError::UpstreamError {
            status,
            message: truncate_message(body.trim(), UPSTREAM_MESSAGE_LIMIT),
        }
    }

    /// Whether the upstream rejected the credential we presented
    pub fn is_upstream_auth_rejection(&self) -> bool {
        matches!(self, GatewayError::UpstreamError { status: Some(401), .. })
    }

    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Unauthorized => StatusCode::UNAUTHORIZED,
            GatewayError::UnknownModel(_) => StatusCode::NOT_FOUND,
            GatewayError::CapabilityUnsupported(_) => StatusCode::BAD_REQUEST,
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::AuthUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::UpstreamError { status, .. } => match status {
                Some(403) => StatusCode::FORBIDDEN,
                Some(429) => StatusCode::TOO_MANY_REQUESTS,
                _ => StatusCode::BAD_GATEWAY,
            },
            GatewayError::UpstreamProtocolError(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// OpenAI-style `(type, code)` pair
    fn kind(&self) -> (&'static str, &'static str) {
        match self {
            GatewayError::Unauthorized => ("authentication_error", "invalid_api_key"),
            GatewayError::UnknownModel(_) => ("invalid_request_error", "model_not_found"),
            GatewayError::CapabilityUnsupported(_) => {
                ("invalid_request_error", "capability_unsupported")
            }
            GatewayError::InvalidRequest(_) => ("invalid_request_error", "invalid_request"),
            GatewayError::AuthUnavailable(_) => ("service_unavailable", "auth_unavailable"),
            GatewayError::UpstreamError { .. } => ("upstream_error", "upstream_error"),
            GatewayError::UpstreamProtocolError(_) => ("upstream_error", "upstream_protocol_error"),
            GatewayError::Internal(_) => ("server_error", "internal_error"),
        }
    }

    /// Stable error code, used as a log field
    pub fn label(&self) -> &'static str {
        self.kind().1
    }

    /// Build the error envelope for this error
    pub fn to_body(&self) -> ErrorResponse {
        let (error_type, code) = self.kind();
        let message = match self {
            // Internal details stay in the logs
            GatewayError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        let upstream_status = match self {
            GatewayError::UpstreamError { status, .. } => *status,
            _ => None,
        };

        ErrorResponse {
            error: ErrorBody {
                message,
                error_type: error_type.to_string(),
                code: code.to_string(),
                param: None,
                upstream_status,
            },
        }
    }
}

/// Error response body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error details
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: String,
    pub code: String,
    pub param: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        if let GatewayError::Internal(ref e) = self {
            tracing::error!(error = %e, "Internal error while handling request");
        }
        (self.status_code(), Json(self.to_body())).into_response()
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" {}", s)).unwrap_or_default()
}

/// Truncate a message to `limit` characters, marking the cut
pub fn truncate_message(message: &str, limit: usize) -> String {
    match message.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &message[..cut]),
        None => message.to_string(),
    }
}

/// Result type alias for convenience
pub type GatewayResult<T> = Result<T, GatewayError>;
