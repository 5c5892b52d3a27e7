//! Upstream token sources
//!
//! A `TokenSource` is the external collaborator that actually issues provider tokens. The
//! gateway ships two: a credential helper command (the GitHub CLI by default) and a fixed token
//! from configuration.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use super::AccessToken;
use crate::error::truncate_message;

/// Longest slice of helper stderr written to the log
const STDERR_LOG_LIMIT: usize = 512;

/// Errors raised while obtaining a token
#[derive(Debug, thiserror::Error)]
pub enum TokenSourceError {
    #[error("credential helper `{0}` not found")]
    HelperNotFound(String),

    /// Helper stderr is logged, never carried here, since this message reaches callers
    #[error("credential helper `{program}` failed ({status})")]
    HelperFailed { program: String, status: String },

    #[error("credential helper `{0}` timed out")]
    HelperTimedOut(String),

    #[error("credential helper `{0}` returned an empty token")]
    EmptyToken(String),

    #[error("credential helper I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A token handed out by a `TokenSource`
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub access_token: AccessToken,
    /// Expiry reported by the source, if it knows one
    pub expires_at: Option<DateTime<Utc>>,
}

impl IssuedToken {
    /// A token without a source-reported expiry
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: AccessToken::new(access_token),
            expires_at: None,
        }
    }

    /// Attach an explicit expiry
    pub fn expiring_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

/// Something that can issue upstream access tokens
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Name used in logs and metrics
    fn name(&self) -> &'static str;

    /// Issue a fresh token. Implementations must not log the token value.
    async fn issue(&self) -> Result<IssuedToken, TokenSourceError>;
}

/// Runs a credential helper (e.g. `gh auth token`) and reads the token from stdout
pub struct CommandTokenSource {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandTokenSource {
    /// Build from a command line already split into program and arguments.
    ///
    /// Returns `None` when the command is empty.
    pub fn from_command_line(command: &[String], timeout: Duration) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            timeout,
        })
    }
}

#[async_trait]
impl TokenSource for CommandTokenSource {
    fn name(&self) -> &'static str {
        "command"
    }

    #[instrument(skip(self), fields(program = %self.program))]
    async fn issue(&self) -> Result<IssuedToken, TokenSourceError> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => TokenSourceError::HelperNotFound(self.program.clone()),
                _ => TokenSourceError::Io(e),
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| TokenSourceError::HelperTimedOut(self.program.clone()))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(
                status = %output.status,
                stderr = %truncate_message(stderr.trim(), STDERR_LOG_LIMIT),
                "Credential helper failed"
            );
            return Err(TokenSourceError::HelperFailed {
                program: self.program.clone(),
                status: output.status.to_string(),
            });
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(TokenSourceError::EmptyToken(self.program.clone()));
        }

        debug!(token_len = token.len(), "Credential helper issued a token");
        Ok(IssuedToken::new(token))
    }
}

/// Hands out a fixed token from configuration
pub struct StaticTokenSource {
    token: AccessToken,
}

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: AccessToken::new(token),
        }
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn issue(&self) -> Result<IssuedToken, TokenSourceError> {
        Ok(IssuedToken {
            access_token: self.token.clone(),
            expires_at: None,
        })
    }
}
