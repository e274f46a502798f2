//! twx Runtime
//!
//! Executes approved specifications against the remote platform:
//!
//! - [`RemoteTransport`] is the seam to the network
//! - [`Executor`] runs actions strictly in order and builds the
//!   [`twx_core::ExecutionReport`]
//! - [`Pipeline`] composes schema validation, guardrails and execution
//! - [`AuditSink`] receives one event per dispatched or planned action

pub mod audit;
pub mod executor;
pub mod fakes;
pub mod pipeline;
pub mod transport;

pub use audit::{AuditSink, ExecutionEvent, ExecutionEventType, MemoryAuditSink, TracingAuditSink};
pub use executor::Executor;
pub use pipeline::{Pipeline, PipelineError};
pub use tokio_util::sync::CancellationToken;
pub use transport::{OfflineTransport, RemoteResponse, RemoteTransport, TransportError};
