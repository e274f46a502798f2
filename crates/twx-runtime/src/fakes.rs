//! In-memory transport fakes (testing only)
//!
//! `RecordingTransport` records every request it receives and answers from
//! per-path scripts, so pipeline behaviour can be checked without a network.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::json;
use twx_core::ResolvedRequest;

use crate::transport::{RemoteResponse, RemoteTransport, TransportError};

type Scripted = Result<RemoteResponse, TransportError>;

/// Records requests and replies `200 {"result": "ok"}` unless a path is
/// scripted otherwise.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    requests: Mutex<Vec<ResolvedRequest>>,
    scripts: Mutex<HashMap<String, Scripted>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply to every request for `path` with `reply`.
    pub fn script(self, path: impl Into<String>, reply: Scripted) -> Self {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into(), reply);
        self
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<ResolvedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl RemoteTransport for RecordingTransport {
    async fn send(&self, request: &ResolvedRequest) -> Result<RemoteResponse, TransportError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&request.path)
            .cloned()
            .unwrap_or_else(|| Ok(RemoteResponse::ok(json!({"result": "ok"}))))
    }
}
