//! CLI command implementations for twx.

pub mod guardrails;
pub mod ping;
pub mod report;
pub mod run;
pub mod validate;

use anyhow::{Context, Result};
use std::path::Path;
use twx_core::{RequestResolver, Specification, TwxConfig};
use twx_policy::{GuardrailEngine, GuardrailPolicy, SchemaValidator};
use twx_runtime::{Executor, Pipeline, RemoteTransport};

pub(crate) fn load_spec(path: &Path) -> Result<Specification> {
    Specification::from_file(path)
        .with_context(|| format!("Failed to load specification: {}", path.display()))
}

pub(crate) fn build_engine(config: &TwxConfig) -> Result<GuardrailEngine> {
    let resolver = RequestResolver::new(config.remote.service_helper.clone());
    let policy = GuardrailPolicy::from_config(&config.guardrails, resolver)
        .context("Invalid guardrails configuration")?;
    Ok(GuardrailEngine::new(policy))
}

pub(crate) fn build_pipeline<T: RemoteTransport>(
    config: &TwxConfig,
    transport: T,
) -> Result<Pipeline<T>> {
    let engine = build_engine(config)?;
    let executor = Executor::new(transport);
    Ok(Pipeline::new(SchemaValidator::new(), engine, executor))
}
