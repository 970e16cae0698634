//! Core `CommandClient` trait and the `reqwest`-backed implementation.
//!
//! All connection details come from [`EndpointConfig`]; nothing is
//! hardcoded.  There are no retries: a failed submission is reported once
//! and the user can simply send again.

use async_trait::async_trait;
use thiserror::Error;

use crate::client::protocol::{AssistantReply, CommandRequest, CommandResponse};
use crate::config::EndpointConfig;

// ---------------------------------------------------------------------------
// ClientError
// ---------------------------------------------------------------------------

/// Errors that can occur while submitting a command.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server could not be reached.
    #[error("network error: {0}")]
    Network(String),

    /// The request did not complete within the configured timeout.
    #[error("command request timed out")]
    Timeout,

    /// The server answered with a non-success status.  `message` is the
    /// text to show the user.
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    /// A success response whose body was not the expected JSON.
    #[error("failed to parse server response: {0}")]
    Parse(String),
}

impl ClientError {
    /// `true` for failures where the server was never heard from.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, ClientError::Network(_) | ClientError::Timeout)
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClientError::Timeout
        } else {
            ClientError::Network(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// CommandClient trait
// ---------------------------------------------------------------------------

/// Async trait for submitting one command and receiving the reply.
///
/// Implementors must be `Send + Sync` so they can be shared across threads
/// (e.g. wrapped in `Arc<dyn CommandClient>`).
#[async_trait]
pub trait CommandClient: Send + Sync {
    async fn send(&self, text: &str) -> Result<AssistantReply, ClientError>;
}

// ---------------------------------------------------------------------------
// HttpCommandClient
// ---------------------------------------------------------------------------

/// POSTs commands as JSON to the configured command route.
pub struct HttpCommandClient {
    client: reqwest::Client,
    url: String,
}

impl HttpCommandClient {
    /// Build a client from the endpoint config.
    ///
    /// The HTTP client carries the per-request timeout from
    /// `config.timeout_secs`.  A default client is used if the builder fails.
    pub fn from_config(config: &EndpointConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            url: config.command_url(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl CommandClient for HttpCommandClient {
    async fn send(&self, text: &str) -> Result<AssistantReply, ClientError> {
        let request = CommandRequest {
            text: text.to_string(),
        };

        log::debug!("client: POST {} ({} chars)", self.url, text.len());
        let response = self.client.post(&self.url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body: Option<serde_json::Value> = response.json().await.ok();
            let message = error_message(body.as_ref(), status);
            log::warn!("client: server answered {status}: {message}");
            return Err(ClientError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: CommandResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))?;

        Ok(parsed.response)
    }
}

/// Text to show for a non-success reply.
///
/// Uses the body's `response` when it is a string or carries a `content`
/// string; otherwise `HTTP Error: <reason> (<code>)`.
fn error_message(body: Option<&serde_json::Value>, status: reqwest::StatusCode) -> String {
    let from_body = body.and_then(|b| b.get("response")).and_then(|r| {
        r.as_str()
            .or_else(|| r.get("content").and_then(|c| c.as_str()))
            .map(str::to_string)
    });

    from_body.unwrap_or_else(|| {
        format!(
            "HTTP Error: {} ({})",
            status.canonical_reason().unwrap_or("Unknown"),
            status.as_u16()
        )
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
