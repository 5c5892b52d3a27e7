//! Copilot Gateway - OpenAI-compatible front for the GitHub Copilot chat API
//!
//! Callers speak the OpenAI Chat Completions protocol; the gateway resolves the model,
//! supplies a short-lived upstream credential, translates the request, and translates the
//! response (whole or streamed) back into OpenAI's format.

pub mod config;
pub mod credentials;
pub mod error;
pub mod middleware;
pub mod openai;
pub mod registry;
pub mod routes;
pub mod streaming;
pub mod translate;
pub mod upstream;

use std::sync::Arc;

use anyhow::Result;

pub use crate::config::Config;
pub use crate::credentials::CredentialProvider;
pub use crate::error::{GatewayError, GatewayResult};
pub use crate::registry::ModelRegistry;
pub use crate::upstream::UpstreamClient;

/// Application state shared across all request handlers
pub struct AppState {
    /// SHA-256 of the gateway secret, hex encoded
    pub gateway_secret_hash: String,
    pub registry: Arc<ModelRegistry>,
    pub credentials: Arc<CredentialProvider>,
    pub upstream: UpstreamClient,
}

impl AppState {
    /// Create the application state from configuration
    pub fn new(config: &Config) -> Result<Self> {
        let registry = Arc::new(ModelRegistry::load(config.models_file.as_deref())?);
        let credentials = Arc::new(CredentialProvider::from_config(config));
        let upstream = UpstreamClient::new(config)?;

        Ok(Self::with_components(config, registry, credentials, upstream))
    }

    /// Assemble the state from already-built components
    ///
    /// Used by `new` and by tests that inject a fake credential source or a mock upstream.
    pub fn with_components(
        config: &Config,
        registry: Arc<ModelRegistry>,
        credentials: Arc<CredentialProvider>,
        upstream: UpstreamClient,
    ) -> Self {
        let gateway_secret_hash = middleware::auth::hash_secret(&config.gateway_api_key);

        Self {
            gateway_secret_hash,
            registry,
            credentials,
            upstream,
        }
    }
}
