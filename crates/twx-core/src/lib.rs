//! Shared data model for twx.
//!
//! Everything the pipeline stages exchange lives here: the raw
//! [`Specification`], the typed [`Action`] list, the [`RequestResolver`]
//! both the guardrail and the executor use, the [`ExecutionReport`], and the
//! configuration types.

pub mod action;
pub mod config;
pub mod report;
pub mod request;
pub mod spec;

pub use action::{Action, ActionKind, ActionParams, BaseType, UnknownActionKind};
pub use config::{
    AuditConfig, ConfigError, DEFAULT_CONFIG_FILE, GuardrailsConfig, RemoteConfig, TwxConfig,
};
pub use report::{
    ActionOutcome, ActionRecord, ExecutionMode, ExecutionReport, FailureKind, RejectionStage,
    RunState, SpecSummary,
};
pub use request::{DEFAULT_SERVICE_HELPER, HttpMethod, RequestResolver, ResolvedRequest};
pub use spec::{SpecMetadata, Specification, SpecificationError};
