use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use twx_core::ResolvedRequest;

/// A response from the remote platform.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteResponse {
    pub status: u16,
    /// Parsed JSON body. Non-JSON bodies are kept as a JSON string; an empty
    /// body is `null`.
    pub body: Value,
}

impl RemoteResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn ok(body: Value) -> Self {
        Self::new(200, body)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the body reports that the target already exists.
    pub fn says_already_exists(&self) -> bool {
        self.body_text().to_ascii_lowercase().contains("already exist")
    }

    /// The body as display text.
    pub fn body_text(&self) -> String {
        match &self.body {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request failed: {0}")]
    Other(String),
}

#[async_trait]
pub trait RemoteTransport: Send + Sync {
    /// Send one request. Exactly one network exchange per call, no retry.
    async fn send(&self, request: &ResolvedRequest) -> Result<RemoteResponse, TransportError>;
}

#[async_trait]
impl<T: RemoteTransport + ?Sized> RemoteTransport for Arc<T> {
    async fn send(&self, request: &ResolvedRequest) -> Result<RemoteResponse, TransportError> {
        (**self).send(request).await
    }
}

/// A transport with no remote behind it, for dry runs where nothing is sent.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineTransport;

#[async_trait]
impl RemoteTransport for OfflineTransport {
    async fn send(&self, request: &ResolvedRequest) -> Result<RemoteResponse, TransportError> {
        Err(TransportError::Other(format!(
            "no remote configured, cannot send {request}"
        )))
    }
}
