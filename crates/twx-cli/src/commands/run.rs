//! `twx plan` and `twx apply` command implementations.
//!
//! Every run leaves the submitted specification and its report behind,
//! including specifications the pipeline refuses. An apply that is declined,
//! or that has no usable remote configuration, sends nothing and writes
//! nothing.

use anyhow::{Context, Result, anyhow, bail};
use std::io::{self, BufRead, Write};
use std::path::Path;
use twx_adapter_http::HttpTransport;
use twx_audit::{ArtifactStore, create_store};
use twx_core::{ActionOutcome, ExecutionMode, ExecutionReport, RunState, Specification, TwxConfig};
use twx_policy::ApprovedSpecification;
use twx_runtime::{CancellationToken, Executor, OfflineTransport, PipelineError};

use super::{build_pipeline, load_spec};

pub async fn run_plan(config: &TwxConfig, file: &Path) -> Result<()> {
    let spec = load_spec(file)?;
    let store = create_store(&config.audit);
    save_specification(store.as_ref(), &spec).await?;

    let pipeline = build_pipeline(config, OfflineTransport)?;
    let approved = match pipeline.check(&spec) {
        Ok(approved) => approved,
        Err(e) => return Err(reject(store.as_ref(), &spec, ExecutionMode::DryRun, e).await),
    };

    let report = pipeline
        .executor()
        .run(&approved, ExecutionMode::DryRun, &CancellationToken::new())
        .await;
    publish(config, store.as_ref(), &report).await
}

pub async fn run_apply(config: &TwxConfig, file: &Path, yes: bool) -> Result<()> {
    let spec = load_spec(file)?;
    let store = create_store(&config.audit);

    // Refusals are reported before the remote configuration is read.
    let approved = match build_pipeline(config, OfflineTransport)?.check(&spec) {
        Ok(approved) => approved,
        Err(e) => {
            save_specification(store.as_ref(), &spec).await?;
            return Err(reject(store.as_ref(), &spec, ExecutionMode::Live, e).await);
        }
    };

    let transport =
        HttpTransport::from_config(&config.remote).context("Remote platform is not configured")?;

    if !yes && !confirm(transport.base_url(), &approved)? {
        bail!("Apply declined, nothing was sent");
    }

    save_specification(store.as_ref(), &spec).await?;

    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, stopping after the current action");
                cancel.cancel();
            }
        }
    });

    let report = Executor::new(transport)
        .run(&approved, ExecutionMode::Live, &cancel)
        .await;
    interrupt.abort();

    publish(config, store.as_ref(), &report).await?;
    outcome(&report)
}

async fn save_specification(store: &dyn ArtifactStore, spec: &Specification) -> Result<()> {
    if let Some(path) = store
        .save_specification(spec)
        .await
        .context("Failed to save specification")?
    {
        tracing::debug!(path = %path.display(), "specification artifact written");
    }
    Ok(())
}

/// Persist the `Rejected` report and return the error to exit with.
async fn reject(
    store: &dyn ArtifactStore,
    spec: &Specification,
    mode: ExecutionMode,
    error: PipelineError,
) -> anyhow::Error {
    let message = error.to_string();
    let report = error.into_report(spec, mode);
    if let Err(e) = store.save_report(&report).await {
        tracing::warn!(error = %e, "failed to save rejected report");
    }
    anyhow!(message)
}

async fn publish(
    config: &TwxConfig,
    store: &dyn ArtifactStore,
    report: &ExecutionReport,
) -> Result<()> {
    print!("{}", published_text(config, report)?);
    if let Some(path) = store.save_report(report).await.context("Failed to save report")? {
        println!("Report saved to {}", path.display());
    }
    Ok(())
}

/// The rendered report, followed by its JSON when `audit.stdout` is set.
fn published_text(config: &TwxConfig, report: &ExecutionReport) -> Result<String> {
    let mut text = report.render();
    if config.audit.stdout {
        text.push_str(&report.to_json_pretty()?);
        text.push('\n');
    }
    Ok(text)
}

fn confirm(base_url: &str, approved: &ApprovedSpecification) -> Result<bool> {
    println!("About to apply {} action(s) to {base_url}:", approved.len());
    for (index, (action, request)) in approved.steps().enumerate() {
        println!("  [{index}] {:<26} {request}", action.kind().as_str());
    }
    print!("Proceed? [y/N] ");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

/// Map a finished live run to the process result.
fn outcome(report: &ExecutionReport) -> Result<()> {
    match &report.state {
        RunState::Completed => Ok(()),
        RunState::Aborted { at } => {
            let detail = report
                .failure()
                .and_then(|record| match &record.outcome {
                    ActionOutcome::Failed { kind, message, .. } => {
                        Some(format!(" ({}): {kind}: {message}", record.action_type))
                    }
                    _ => None,
                })
                .unwrap_or_default();
            bail!(
                "Run aborted at action[{at}]{detail}; {} action(s) applied before it",
                report.succeeded_count()
            )
        }
        RunState::Cancelled { at } => bail!(
            "Run cancelled before action[{at}]; {} action(s) applied",
            report.succeeded_count()
        ),
        RunState::Rejected { reason, .. } => bail!("{reason}"),
    }
}
