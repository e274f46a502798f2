//! Per-action execution events.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use twx_core::{ActionKind, ResolvedRequest};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionEventType {
    /// Dry-run: request resolved, not sent.
    ActionPlanned,
    ActionDispatched,
    ActionSucceeded,
    ActionFailed,
}

/// One execution event. Carries method and path only, never headers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionEvent {
    pub run_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub event_type: ExecutionEventType,
    pub index: usize,
    pub action: ActionKind,
    pub method: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ExecutionEvent {
    pub fn new(
        run_id: Uuid,
        event_type: ExecutionEventType,
        index: usize,
        action: ActionKind,
        request: &ResolvedRequest,
    ) -> Self {
        Self {
            run_id,
            occurred_at: Utc::now(),
            event_type,
            index,
            action,
            method: request.method.to_string(),
            path: request.path.clone(),
            status: None,
            detail: None,
        }
    }

    pub fn with_status(mut self, status: Option<u16>) -> Self {
        self.status = status;
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

pub trait AuditSink: Send + Sync {
    fn record(&self, event: ExecutionEvent);
}

impl<S: AuditSink + ?Sized> AuditSink for Arc<S> {
    fn record(&self, event: ExecutionEvent) {
        (**self).record(event)
    }
}

/// Emits events as structured `tracing` records.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: ExecutionEvent) {
        match event.event_type {
            ExecutionEventType::ActionFailed => tracing::warn!(
                run_id = %event.run_id,
                index = event.index,
                action = %event.action,
                method = %event.method,
                path = %event.path,
                status = ?event.status,
                detail = event.detail.as_deref().unwrap_or(""),
                "action failed"
            ),
            event_type => tracing::info!(
                run_id = %event.run_id,
                index = event.index,
                action = %event.action,
                method = %event.method,
                path = %event.path,
                status = ?event.status,
                event = ?event_type,
                "execution event"
            ),
        }
    }
}

/// Keeps events in memory. Used by tests and by callers that want the event
/// stream alongside the report.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<ExecutionEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ExecutionEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn event_types(&self) -> Vec<ExecutionEventType> {
        self.events().iter().map(|e| e.event_type).collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: ExecutionEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
