//! Execution reports.
//!
//! An [`ExecutionReport`] is the ordered record of one pipeline run. It is
//! returned to the caller and persisted as an audit artifact, so its JSON
//! shape is stable: records appear in specification order and no record is
//! ever dropped.

use crate::action::ActionKind;
use crate::request::ResolvedRequest;
use crate::spec::Specification;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Write as _;
use uuid::Uuid;

/// Whether requests are sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Resolve and log every request without sending it.
    DryRun,
    /// Send every request and record the response.
    Live,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DryRun => write!(f, "dry-run"),
            Self::Live => write!(f, "live"),
        }
    }
}

/// Why a live request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Non-2xx status or transport error.
    RemoteCallFailure,
    /// No response within the request timeout.
    Timeout,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RemoteCallFailure => write!(f, "remote call failure"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

/// Outcome of one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    /// The remote accepted the request.
    Succeeded {
        status: u16,
        #[serde(default)]
        payload: Value,
        /// The entity already existed and the step converged without change.
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        already_existed: bool,
    },
    /// The request failed; the run stopped here.
    Failed {
        kind: FailureKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
        message: String,
    },
    /// Dry-run: resolved, not sent.
    Planned,
}

impl ActionOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, ActionOutcome::Failed { .. })
    }
}

/// The record for one action that reached the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Position in the specification.
    pub index: usize,
    pub action_type: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub request: ResolvedRequest,
    #[serde(flatten)]
    pub outcome: ActionOutcome,
}

/// Which pre-execution stage refused the specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionStage {
    Schema,
    Guardrail,
}

impl std::fmt::Display for RejectionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Schema => write!(f, "schema"),
            Self::Guardrail => write!(f, "guardrail"),
        }
    }
}

/// Terminal state of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    /// Every action was dispatched (or planned) successfully.
    Completed,
    /// Action `at` failed; later actions were not attempted.
    Aborted { at: usize },
    /// Cancellation was observed before dispatching action `at`.
    Cancelled { at: usize },
    /// Refused before execution; nothing was sent.
    Rejected {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        at: Option<usize>,
        stage: RejectionStage,
        reason: String,
    },
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Completed => write!(f, "Completed"),
            RunState::Aborted { at } => write!(f, "Aborted(at {at})"),
            RunState::Cancelled { at } => write!(f, "Cancelled(before {at})"),
            RunState::Rejected {
                at: Some(at),
                stage,
                ..
            } => write!(f, "Rejected({stage} at {at})"),
            RunState::Rejected {
                at: None, stage, ..
            } => write!(f, "Rejected({stage})"),
        }
    }
}

/// Specification facts carried into the report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpecSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    pub action_count: usize,
}

impl From<&Specification> for SpecSummary {
    fn from(spec: &Specification) -> Self {
        Self {
            version: spec.version.clone(),
            description: spec.metadata.description.clone(),
            requested_by: spec.metadata.requested_by.clone(),
            created_at: spec.metadata.created_at,
            action_count: spec.action_count(),
        }
    }
}

/// Ordered outcome record of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub run_id: Uuid,
    pub mode: ExecutionMode,
    pub specification: SpecSummary,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(flatten)]
    pub state: RunState,
    pub records: Vec<ActionRecord>,
}

impl ExecutionReport {
    /// Report for a specification refused before execution.
    pub fn rejected(
        mode: ExecutionMode,
        specification: SpecSummary,
        stage: RejectionStage,
        at: Option<usize>,
        reason: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            mode,
            specification,
            started_at: now,
            finished_at: now,
            state: RunState::Rejected {
                at,
                stage,
                reason: reason.into(),
            },
            records: Vec::new(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.state == RunState::Completed
    }

    /// The failing record of an aborted run.
    pub fn failure(&self) -> Option<&ActionRecord> {
        match self.state {
            RunState::Aborted { at } => self.records.iter().find(|r| r.index == at),
            _ => None,
        }
    }

    pub fn succeeded_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(r.outcome, ActionOutcome::Succeeded { .. }))
            .count()
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// JSON form without run id and timestamps, for diffing two runs of the
    /// same specification.
    pub fn comparable(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut value {
            map.remove("run_id");
            map.remove("started_at");
            map.remove("finished_at");
        }
        value
    }

    /// Human-readable rendering.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Run {} ({})", self.run_id, self.mode);
        if let Some(description) = &self.specification.description {
            let _ = writeln!(out, "Specification: {description}");
        }
        let _ = writeln!(
            out,
            "Actions: {} in specification, {} reached the executor",
            self.specification.action_count,
            self.records.len()
        );
        for record in &self.records {
            let status = match &record.outcome {
                ActionOutcome::Succeeded {
                    status,
                    already_existed: true,
                    ..
                } => format!("ok {status} (already existed)"),
                ActionOutcome::Succeeded { status, .. } => format!("ok {status}"),
                ActionOutcome::Failed {
                    kind,
                    status: Some(status),
                    message,
                } => format!("FAILED {kind} {status}: {message}"),
                ActionOutcome::Failed { kind, message, .. } => {
                    format!("FAILED {kind}: {message}")
                }
                ActionOutcome::Planned => "planned".to_string(),
            };
            let _ = writeln!(
                out,
                "  [{}] {:<26} {:<60} {}",
                record.index,
                record.action_type.as_str(),
                record.request.to_string(),
                status
            );
        }
        match &self.state {
            RunState::Rejected { reason, .. } => {
                let _ = writeln!(out, "Result: {} - {reason}", self.state);
            }
            state => {
                let _ = writeln!(out, "Result: {state}");
            }
        }
        out
    }
}
