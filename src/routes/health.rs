//! Health check endpoints
//!
//! Pure liveness checks: no upstream call, no credential use, no auth.
//! - `/` - Service banner
//! - `/health` - Health check
//! - `/health/live` - Liveness check

use axum::Json;
use serde::{Deserialize, Serialize};

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
}

/// Health response body
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
}

/// Root banner
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct RootResponse {
    pub status: String,
    pub message: String,
}

fn healthy() -> HealthResponse {
    HealthResponse {
        status: HealthStatus::Healthy,
        version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(healthy())
}

/// Liveness check
pub async fn liveness_check() -> Json<HealthResponse> {
    Json(healthy())
}

/// Service banner at `/`
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        status: "ok".to_string(),
        message: "Copilot OpenAI Gateway is running".to_string(),
    })
}
