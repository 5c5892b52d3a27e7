//! Upstream credential lifecycle
//!
//! `CredentialProvider` owns the one cached upstream credential for the process. It is created
//! at startup, handed to request handlers through `AppState`, and torn down at shutdown.
//!
//! Refreshes are single-flight: the credential slot is an async mutex that stays locked for the
//! whole refresh, so concurrent callers that find an expired credential queue behind the one
//! refresh in progress and then read its result.

pub mod source;

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::error::{GatewayError, GatewayResult};

pub use source::{CommandTokenSource, IssuedToken, StaticTokenSource, TokenSource, TokenSourceError};

/// Credentials this close to expiry are refreshed early
const EXPIRY_SKEW_SECONDS: i64 = 30;

/// Opaque upstream access token. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for building the upstream `Authorization` header only
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

/// A cached upstream credential
#[derive(Debug, Clone)]
pub struct UpstreamCredential {
    pub access_token: AccessToken,
    pub expires_at: DateTime<Utc>,
}

impl UpstreamCredential {
    pub fn new(access_token: AccessToken, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token,
            expires_at,
        }
    }

    /// Whether the credential must be refreshed before use at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_SKEW_SECONDS) >= self.expires_at
    }
}

/// Caches and refreshes the upstream credential
pub struct CredentialProvider {
    source: Option<Arc<dyn TokenSource>>,
    slot: Mutex<Option<UpstreamCredential>>,
    default_ttl: Duration,
    refreshes: AtomicU64,
}

impl CredentialProvider {
    /// Create a provider backed by `source`.
    ///
    /// Tokens issued without an expiry are cached for `default_ttl_seconds`.
    pub fn new(source: Arc<dyn TokenSource>, default_ttl_seconds: u64) -> Self {
        Self {
            source: Some(source),
            slot: Mutex::new(None),
            default_ttl: Duration::seconds(default_ttl_seconds as i64),
            refreshes: AtomicU64::new(0),
        }
    }

    /// Pick the credential source from configuration: a fixed `UPSTREAM_TOKEN` wins over the
    /// helper command, and with neither the provider is left unconfigured.
    pub fn from_config(config: &Config) -> Self {
        if let Some(token) = &config.upstream_token {
            info!("Using static upstream token from configuration");
            return Self::new(Arc::new(StaticTokenSource::new(token.clone())), config.token_ttl_seconds);
        }

        match CommandTokenSource::from_command_line(
            &config.token_command,
            std::time::Duration::from_secs(config.token_command_timeout_seconds),
        ) {
            Some(source) => {
                info!(command = %config.token_command.join(" "), "Using credential helper");
                Self::new(Arc::new(source), config.token_ttl_seconds)
            }
            None => Self::unconfigured(),
        }
    }

    /// A provider with no credential source; every `get_token` fails with `AuthUnavailable`
    pub fn unconfigured() -> Self {
        Self {
            source: None,
            slot: Mutex::new(None),
            default_ttl: Duration::zero(),
            refreshes: AtomicU64::new(0),
        }
    }

    /// Start with a previously obtained credential in the cache
    pub fn with_cached(self, credential: UpstreamCredential) -> Self {
        Self {
            slot: Mutex::new(Some(credential)),
            ..self
        }
    }

    /// Whether a credential source is configured at all
    pub fn is_configured(&self) -> bool {
        self.source.is_some()
    }

    /// Number of token-issuing calls made so far
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Return a valid upstream token, refreshing it first if the cached one has expired
    #[instrument(skip(self))]
    pub async fn get_token(&self) -> GatewayResult<AccessToken> {
        let source = self.source.as_ref().ok_or_else(|| {
            GatewayError::AuthUnavailable("no upstream credential source is configured".to_string())
        })?;

        let mut slot = self.slot.lock().await;

        if let Some(credential) = slot.as_ref() {
            if !credential.is_expired(Utc::now()) {
                return Ok(credential.access_token.clone());
            }
            debug!(expires_at = %credential.expires_at, "Cached upstream credential expired");
        }

        let credential = self.refresh(source.as_ref()).await?;
        let token = credential.access_token.clone();
        *slot = Some(credential);

        Ok(token)
    }

    /// Drop the cached credential if it is still the one the upstream rejected.
    ///
    /// Comparing against the rejected token keeps a burst of 401s from discarding a
    /// credential that another request already refreshed.
    pub async fn invalidate(&self, rejected: &AccessToken) {
        let mut slot = self.slot.lock().await;
        if slot.as_ref().is_some_and(|c| &c.access_token == rejected) {
            info!("Upstream rejected the cached credential, discarding it");
            *slot = None;
        }
    }

    /// Run an upstream call with a valid token.
    ///
    /// If the upstream answers 401, the credential is invalidated, refreshed once, and the
    /// call is issued again with the new token. Any other outcome is returned as-is.
    pub async fn with_refresh<T, F, Fut>(&self, mut call: F) -> GatewayResult<T>
    where
        F: FnMut(AccessToken) -> Fut,
        Fut: Future<Output = GatewayResult<T>>,
    {
        let token = self.get_token().await?;
        match call(token.clone()).await {
            Err(e) if e.is_upstream_auth_rejection() => {
                warn!("Upstream returned 401, refreshing credential and re-issuing once");
                self.invalidate(&token).await;
                let token = self.get_token().await?;
                call(token).await
            }
            other => other,
        }
    }

    /// Drop the cached credential. Called once at process shutdown.
    pub async fn shutdown(&self) {
        let mut slot = self.slot.lock().await;
        if slot.take().is_some() {
            debug!("Upstream credential discarded");
        }
    }

    async fn refresh(&self, source: &dyn TokenSource) -> GatewayResult<UpstreamCredential> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);

        match source.issue().await {
            Ok(issued) => {
                let expires_at = issued
                    .expires_at
                    .unwrap_or_else(|| Utc::now() + self.default_ttl);
                crate::routes::metrics::record_credential_refresh("success");
                info!(source = source.name(), expires_at = %expires_at, "Upstream credential refreshed");
                Ok(UpstreamCredential::new(issued.access_token, expires_at))
            }
            Err(e) => {
                crate::routes::metrics::record_credential_refresh("failure");
                warn!(source = source.name(), error = %e, "Upstream credential refresh failed");
                Err(GatewayError::AuthUnavailable(e.to_string()))
            }
        }
    }
}
