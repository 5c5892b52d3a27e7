//! HTTP client for the upstream chat API

use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use tracing::{debug, instrument, warn};

use super::headers::{build_upstream_headers, ClientIdentity};
use super::types::{UpstreamRequest, UpstreamResponse};
use crate::config::Config;
use crate::credentials::AccessToken;
use crate::error::{GatewayError, GatewayResult};

/// Longest wait for the TCP and TLS handshake with the upstream
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Raw upstream response body, chunked as it arrives
pub type ByteStream = Pin<Box<dyn Stream<Item = GatewayResult<Bytes>> + Send>>;

/// Upstream chat API client
#[derive(Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    base_url: String,
    identity: ClientIdentity,
}

impl UpstreamClient {
    /// Create a client using the configured base URL, timeout and client identity
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = build_http_client(Duration::from_secs(config.upstream_timeout_seconds))?;

        Ok(Self::with_client(
            client,
            &config.upstream_api_url,
            ClientIdentity {
                integration_id: config.integration_id.clone(),
                editor_version: config.editor_version.clone(),
            },
        ))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str, identity: ClientIdentity) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            identity,
        }
    }

    /// Issue a non-streaming chat completion
    #[instrument(skip_all, fields(model = %request.body.model))]
    pub async fn chat_completions(
        &self,
        token: &AccessToken,
        request: &UpstreamRequest,
    ) -> GatewayResult<UpstreamResponse> {
        let response = self.send(token, request).await?;

        let body = response.bytes().await.map_err(transport_error)?;
        serde_json::from_slice(&body).map_err(|e| {
            GatewayError::UpstreamProtocolError(format!("response body is not valid JSON: {}", e))
        })
    }

    /// Issue a streaming chat completion and return the raw SSE byte stream.
    ///
    /// Dropping the returned stream aborts the upstream request.
    #[instrument(skip_all, fields(model = %request.body.model))]
    pub async fn chat_completions_stream(
        &self,
        token: &AccessToken,
        request: &UpstreamRequest,
    ) -> GatewayResult<ByteStream> {
        let response = self.send(token, request).await?;
        Ok(Box::pin(response.bytes_stream().map_err(transport_error)))
    }

    async fn send(
        &self,
        token: &AccessToken,
        request: &UpstreamRequest,
    ) -> GatewayResult<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);
        let request_id = uuid::Uuid::new_v4().to_string();
        let headers = build_upstream_headers(
            token,
            &self.identity,
            &request.routing,
            &request_id,
            request.is_stream(),
        )?;

        debug!(
            request_id = %request_id,
            stream = request.is_stream(),
            messages = request.body.messages.len(),
            "Dispatching upstream request"
        );

        let response = self
            .client
            .post(&url)
            .headers(headers)
            .json(&request.body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            if status.as_u16() == 403 {
                warn!(
                    model = %request.body.model,
                    "Upstream refused the model; it may not be enabled for this account"
                );
            }
            return Err(GatewayError::upstream(Some(status.as_u16()), &text));
        }

        Ok(response)
    }
}

/// The read timeout bounds each wait for data, so a stream lives as long as bytes keep arriving
fn build_http_client(read_timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .read_timeout(read_timeout)
        .build()
}

fn transport_error(e: reqwest::Error) -> GatewayError {
    GatewayError::upstream(e.status().map(|s| s.as_u16()), &e.to_string())
}
