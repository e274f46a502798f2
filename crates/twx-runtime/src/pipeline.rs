//! The guarded pipeline: schema validation, guardrails, execution.
//!
//! Control flow is strictly linear. Schema and guardrail failures are
//! returned before the transport is touched.

use crate::audit::{AuditSink, TracingAuditSink};
use crate::executor::Executor;
use crate::transport::RemoteTransport;
use tokio_util::sync::CancellationToken;
use twx_core::{ExecutionMode, ExecutionReport, RejectionStage, SpecSummary, Specification};
use twx_policy::{
    ApprovedSpecification, GuardrailEngine, GuardrailRejection, SchemaError, SchemaValidator,
};

/// A specification refused before execution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("schema validation failed: {0}")]
    Schema(#[from] SchemaError),

    #[error("guardrail rejected specification: {0}")]
    Guardrail(#[from] GuardrailRejection),
}

impl PipelineError {
    pub fn stage(&self) -> RejectionStage {
        match self {
            PipelineError::Schema(_) => RejectionStage::Schema,
            PipelineError::Guardrail(_) => RejectionStage::Guardrail,
        }
    }

    /// Index of the offending action, if the error is action-specific.
    pub fn index(&self) -> Option<usize> {
        match self {
            PipelineError::Schema(e) => e.index,
            PipelineError::Guardrail(e) => Some(e.index),
        }
    }

    /// The `Rejected` report persisted for a refused specification.
    pub fn into_report(self, spec: &Specification, mode: ExecutionMode) -> ExecutionReport {
        let reason = match &self {
            PipelineError::Schema(e) => e.to_string(),
            PipelineError::Guardrail(e) => e.to_string(),
        };
        ExecutionReport::rejected(
            mode,
            SpecSummary::from(spec),
            self.stage(),
            self.index(),
            reason,
        )
    }
}

pub struct Pipeline<T, S = TracingAuditSink> {
    validator: SchemaValidator,
    engine: GuardrailEngine,
    executor: Executor<T, S>,
}

impl<T: RemoteTransport, S: AuditSink> Pipeline<T, S> {
    pub fn new(validator: SchemaValidator, engine: GuardrailEngine, executor: Executor<T, S>) -> Self {
        Self {
            validator,
            engine,
            executor,
        }
    }

    pub fn engine(&self) -> &GuardrailEngine {
        &self.engine
    }

    pub fn executor(&self) -> &Executor<T, S> {
        &self.executor
    }

    /// Run the two pure stages only.
    pub fn check(&self, spec: &Specification) -> Result<ApprovedSpecification, PipelineError> {
        let validated = self.validator.validate(spec).inspect_err(|e| {
            tracing::warn!(index = ?e.index, error = %e, "specification failed schema validation");
        })?;
        Ok(self.engine.evaluate(&validated)?)
    }

    /// Validate, approve and execute `spec`.
    pub async fn run(
        &self,
        spec: &Specification,
        mode: ExecutionMode,
        cancel: &CancellationToken,
    ) -> Result<ExecutionReport, PipelineError> {
        let approved = self.check(spec)?;
        Ok(self.executor.run(&approved, mode, cancel).await)
    }
}
