//! `twx validate` command implementation.
//!
//! Runs the schema validator and the guardrail engine. Nothing is sent and
//! nothing is persisted.

use anyhow::{Context, Result, bail};
use std::path::Path;
use twx_core::{Specification, TwxConfig};
use twx_policy::{GuardrailDecision, GuardrailEngine, SchemaValidator};

use super::{build_engine, load_spec};

pub fn run_validate(config: &TwxConfig, file: &Path, all: bool) -> Result<()> {
    let spec = load_spec(file)?;
    let engine = build_engine(config)?;

    let count = if all {
        validate_all(&engine, &spec)?
    } else {
        validate_first(&engine, &spec)?
    };

    println!(
        "OK: {} passed schema validation and guardrails ({count} action(s))",
        file.display()
    );
    Ok(())
}

/// Stop at the first problem, exactly as `plan` and `apply` would.
fn validate_first(engine: &GuardrailEngine, spec: &Specification) -> Result<usize> {
    let validated = SchemaValidator::new()
        .validate(spec)
        .context("Schema validation failed")?;
    let approved = engine
        .evaluate(&validated)
        .context("Guardrail rejected specification")?;
    Ok(approved.len())
}

/// Report every offending action.
fn validate_all(engine: &GuardrailEngine, spec: &Specification) -> Result<usize> {
    let validator = SchemaValidator::new();

    let schema_errors = validator.collect_errors(spec);
    if !schema_errors.is_empty() {
        for error in &schema_errors {
            eprintln!("  schema: {error}");
        }
        bail!("{} schema error(s)", schema_errors.len());
    }

    let validated = validator.validate(spec).context("Schema validation failed")?;
    let mut rejected = 0usize;
    for (index, action) in validated.actions().iter().enumerate() {
        if let GuardrailDecision::Rejected(violation) = engine.evaluate_action(action) {
            eprintln!("  guardrail: action[{index}] ({}): {violation}", action.kind());
            rejected += 1;
        }
    }
    if rejected > 0 {
        bail!("{rejected} action(s) rejected by guardrails");
    }

    Ok(validated.len())
}
