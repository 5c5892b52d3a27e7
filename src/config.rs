//! Configuration management for the gateway
//!
//! Configuration is loaded from environment variables (a `.env` file is honoured by `main`).

use anyhow::{bail, Context, Result};
use std::env;

/// Application configuration
#[derive(Clone)]
pub struct Config {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,

    /// Shared secret callers present as `Authorization: Bearer <secret>`
    pub gateway_api_key: String,

    /// Upstream chat API base URL
    pub upstream_api_url: String,
    /// Per-read timeout for upstream calls (in seconds)
    pub upstream_timeout_seconds: u64,

    /// Fixed upstream token; takes precedence over the token command
    pub upstream_token: Option<String>,
    /// Credential helper command, split on whitespace. Empty disables it.
    pub token_command: Vec<String>,
    /// Timeout for the credential helper (in seconds)
    pub token_command_timeout_seconds: u64,
    /// Lifetime applied to tokens that do not carry their own expiry (in seconds)
    pub token_ttl_seconds: u64,

    /// Optional path to a model table overriding the built-in catalog
    pub models_file: Option<String>,

    /// Value of the `Copilot-Integration-Id` routing header
    pub integration_id: String,
    /// Value of the `Editor-Version` routing header
    pub editor_version: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let gateway_api_key = env::var("PROXY_API_KEY").context("PROXY_API_KEY must be set")?;
        if gateway_api_key.trim().is_empty() {
            bail!("PROXY_API_KEY must not be empty");
        }

        Ok(Self {
            host: env::var("GATEWAY_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8001".to_string())
                .parse()
                .context("Invalid PORT")?,

            gateway_api_key,

            upstream_api_url: env::var("UPSTREAM_API_URL")
                .unwrap_or_else(|_| "https://api.githubcopilot.com".to_string())
                .trim_end_matches('/')
                .to_string(),
            upstream_timeout_seconds: env::var("UPSTREAM_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .context("Invalid UPSTREAM_TIMEOUT_SECONDS")?,

            upstream_token: env::var("UPSTREAM_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty()),
            token_command: env::var("TOKEN_COMMAND")
                .unwrap_or_else(|_| "gh auth token".to_string())
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            token_command_timeout_seconds: env::var("TOKEN_COMMAND_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Invalid TOKEN_COMMAND_TIMEOUT_SECONDS")?,
            token_ttl_seconds: env::var("TOKEN_TTL_SECONDS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .context("Invalid TOKEN_TTL_SECONDS")?,

            models_file: env::var("MODELS_FILE").ok().filter(|p| !p.is_empty()),

            integration_id: env::var("COPILOT_INTEGRATION_ID")
                .unwrap_or_else(|_| "vscode-chat".to_string()),
            editor_version: env::var("EDITOR_VERSION")
                .unwrap_or_else(|_| "vscode/1.96.0".to_string()),
        })
    }
}

// Secrets stay out of logs even when the whole config is printed.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("gateway_api_key", &"[REDACTED]")
            .field("upstream_api_url", &self.upstream_api_url)
            .field("upstream_timeout_seconds", &self.upstream_timeout_seconds)
            .field("upstream_token", &self.upstream_token.as_ref().map(|_| "[REDACTED]"))
            .field("token_command", &self.token_command)
            .field("token_command_timeout_seconds", &self.token_command_timeout_seconds)
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .field("models_file", &self.models_file)
            .field("integration_id", &self.integration_id)
            .field("editor_version", &self.editor_version)
            .finish()
    }
}
