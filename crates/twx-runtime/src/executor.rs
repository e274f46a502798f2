//! Sequential execution of approved specifications.
//!
//! Actions run strictly in order: action `i + 1` is never dispatched before
//! the result of action `i` is known. The first failure stops the run. The
//! executor sends the requests the guardrail approved; it never resolves an
//! action itself.
//! Cancellation is observed only between actions; a request in flight is
//! always allowed to finish.

use crate::audit::{AuditSink, ExecutionEvent, ExecutionEventType, TracingAuditSink};
use crate::transport::{RemoteTransport, TransportError};
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use twx_core::{
    Action, ActionOutcome, ActionRecord, ExecutionMode, ExecutionReport, FailureKind,
    ResolvedRequest, RunState,
};
use twx_policy::ApprovedSpecification;
use uuid::Uuid;

/// Longest remote error text kept in a record.
const MAX_MESSAGE_LEN: usize = 500;

pub struct Executor<T, S = TracingAuditSink> {
    transport: T,
    audit: S,
}

impl<T: RemoteTransport> Executor<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            audit: TracingAuditSink,
        }
    }
}

impl<T: RemoteTransport, S: AuditSink> Executor<T, S> {
    /// Replace the audit sink.
    pub fn with_audit_sink<S2: AuditSink>(self, audit: S2) -> Executor<T, S2> {
        Executor {
            transport: self.transport,
            audit,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Execute (or plan) every action of `spec` in order.
    ///
    /// Always returns a report: failures and cancellation are terminal
    /// states, not errors.
    pub async fn run(
        &self,
        spec: &ApprovedSpecification,
        mode: ExecutionMode,
        cancel: &CancellationToken,
    ) -> ExecutionReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let mut records = Vec::with_capacity(spec.len());
        let mut state = RunState::Completed;

        tracing::info!(%run_id, %mode, actions = spec.len(), "starting run");

        for (index, (action, request)) in spec.steps().enumerate() {
            if cancel.is_cancelled() {
                tracing::warn!(%run_id, index, "run cancelled before action");
                state = RunState::Cancelled { at: index };
                break;
            }

            let outcome = match mode {
                ExecutionMode::DryRun => self.plan(run_id, index, action, request),
                ExecutionMode::Live => self.dispatch(run_id, index, action, request).await,
            };

            let failed = outcome.is_failed();
            records.push(ActionRecord {
                index,
                action_type: action.kind(),
                description: action.description.clone(),
                request: request.clone(),
                outcome,
            });

            if failed {
                state = RunState::Aborted { at: index };
                break;
            }
        }

        tracing::info!(%run_id, state = %state, records = records.len(), "run finished");

        ExecutionReport {
            run_id,
            mode,
            specification: spec.summary().clone(),
            started_at,
            finished_at: Utc::now(),
            state,
            records,
        }
    }

    fn plan(
        &self,
        run_id: Uuid,
        index: usize,
        action: &Action,
        request: &ResolvedRequest,
    ) -> ActionOutcome {
        self.audit.record(
            ExecutionEvent::new(
                run_id,
                ExecutionEventType::ActionPlanned,
                index,
                action.kind(),
                request,
            )
            .with_detail(action.summary()),
        );
        ActionOutcome::Planned
    }

    async fn dispatch(
        &self,
        run_id: Uuid,
        index: usize,
        action: &Action,
        request: &ResolvedRequest,
    ) -> ActionOutcome {
        let kind = action.kind();
        let event = |event_type| ExecutionEvent::new(run_id, event_type, index, kind, request);

        self.audit.record(event(ExecutionEventType::ActionDispatched));

        let outcome = match self.transport.send(request).await {
            Ok(response) if response.is_success() => ActionOutcome::Succeeded {
                status: response.status,
                payload: response.body,
                already_existed: false,
            },
            Ok(response) if kind.is_creation() && response.says_already_exists() => {
                tracing::info!(
                    index,
                    action = %kind,
                    status = response.status,
                    "target already exists, treating as converged"
                );
                ActionOutcome::Succeeded {
                    status: response.status,
                    payload: response.body,
                    already_existed: true,
                }
            }
            Ok(response) => ActionOutcome::Failed {
                kind: FailureKind::RemoteCallFailure,
                status: Some(response.status),
                message: truncate(response.body_text()),
            },
            Err(TransportError::Timeout) => ActionOutcome::Failed {
                kind: FailureKind::Timeout,
                status: None,
                message: TransportError::Timeout.to_string(),
            },
            Err(e) => ActionOutcome::Failed {
                kind: FailureKind::RemoteCallFailure,
                status: None,
                message: truncate(e.to_string()),
            },
        };

        match &outcome {
            ActionOutcome::Succeeded {
                status,
                already_existed,
                ..
            } => {
                let mut ev = event(ExecutionEventType::ActionSucceeded).with_status(Some(*status));
                if *already_existed {
                    ev = ev.with_detail("already existed");
                }
                self.audit.record(ev);
            }
            ActionOutcome::Failed {
                kind,
                status,
                message,
            } => self.audit.record(
                event(ExecutionEventType::ActionFailed)
                    .with_status(*status)
                    .with_detail(format!("{kind}: {message}")),
            ),
            ActionOutcome::Planned => {}
        }

        outcome
    }
}

fn truncate(mut message: String) -> String {
    if let Some((cut, _)) = message.char_indices().nth(MAX_MESSAGE_LEN) {
        message.truncate(cut);
        message.push_str("...");
    }
    message
}
