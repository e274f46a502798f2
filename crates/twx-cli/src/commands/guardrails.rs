//! `twx guardrails` command implementation.

use anyhow::Result;
use std::fmt::Write as _;
use twx_core::{ActionKind, HttpMethod, TwxConfig};
use twx_policy::GuardrailPolicy;

use super::build_engine;

pub fn run_guardrails(config: &TwxConfig) -> Result<()> {
    let engine = build_engine(config)?;
    print!("{}", describe(engine.policy()));
    Ok(())
}

fn describe(policy: &GuardrailPolicy) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Allowed actions:");
    for kind in ActionKind::ALL {
        let mark = if policy.is_allowed(kind) { "+" } else { "-" };
        let _ = writeln!(out, "  {mark} {kind}");
    }

    let _ = writeln!(out, "Blocked methods:");
    let _ = writeln!(out, "  {}", HttpMethod::Delete);

    let _ = writeln!(out, "Blocked endpoint patterns:");
    for pattern in policy.blocked_endpoint_patterns() {
        let _ = writeln!(out, "  {pattern}");
    }

    let _ = writeln!(out, "Blocked capability code patterns:");
    for pattern in policy.blocked_code_patterns() {
        let _ = writeln!(out, "  {pattern}");
    }

    let _ = writeln!(out, "Service helper: {}", policy.resolver().service_helper());
    out
}
