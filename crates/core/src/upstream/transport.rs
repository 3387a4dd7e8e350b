//! Transport abstraction over the HTTP client.

use async_trait::async_trait;
use thiserror::Error;

/// Ordered request headers.
pub type Headers = Vec<(String, String)>;

/// A completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    /// The upstream refused this identity (anti-automation or rate limit).
    pub fn is_denied(&self) -> bool {
        matches!(self.status, 403 | 429)
    }
}

/// Errors that prevent a response from being received at all.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The proxy refused the connection (auth failure, tunnel error).
    #[error("proxy connection failed: {0}")]
    Proxy(String),

    #[error("request timeout")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to build HTTP session: {0}")]
    Setup(String),
}

impl TransportError {
    /// Failures that a different proxy might fix.
    pub fn is_proxy_failure(&self) -> bool {
        matches!(self, TransportError::Proxy(_))
    }
}

/// Factory for browser-like sessions.
pub trait Transport: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Open a session with its own cookie jar, optionally routed via `proxy`.
    fn open_session(&self, proxy: Option<&str>)
        -> Result<Box<dyn TransportSession>, TransportError>;
}

/// One cookie-carrying HTTP session.
#[async_trait]
pub trait TransportSession: Send + Sync {
    async fn get(&self, url: &str, headers: &Headers) -> Result<TransportResponse, TransportError>;

    async fn post_json(
        &self,
        url: &str,
        headers: &Headers,
        body: &serde_json::Value,
    ) -> Result<TransportResponse, TransportError>;
}
