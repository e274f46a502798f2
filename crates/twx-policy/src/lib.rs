//! twx Policy Enforcement
//!
//! The two pure stages that run before anything is sent:
//!
//! - [`SchemaValidator`] turns a raw specification into a
//!   [`ValidatedSpecification`] of typed actions
//! - [`GuardrailEngine`] turns a validated specification into an
//!   [`ApprovedSpecification`], or rejects it at the first action the
//!   [`GuardrailPolicy`] does not permit
//!
//! Neither stage performs I/O.

pub mod error;
pub mod guardrail;
pub mod rules;
pub mod schema;

pub use error::{
    GuardrailRejection, GuardrailViolation, PolicyConfigError, SchemaError, SchemaProblem,
};
pub use guardrail::{
    ApprovedSpecification, GuardrailDecision, GuardrailEngine, GuardrailPolicy,
    GuardrailPolicyBuilder,
};
pub use schema::{SchemaValidator, ValidatedSpecification};
