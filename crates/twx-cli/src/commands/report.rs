//! `twx report` command implementation.

use anyhow::{Context, Result};
use std::path::Path;
use twx_audit::{ArtifactStore, FileArtifactStore, load_report_file};
use twx_core::TwxConfig;

pub async fn run_report(config: &TwxConfig, file: Option<&Path>, json: bool) -> Result<()> {
    let Some(file) = file else {
        return list(config).await;
    };

    let report = load_report_file(file)
        .await
        .with_context(|| format!("Failed to load report: {}", file.display()))?;

    if json {
        println!("{}", report.to_json_pretty()?);
    } else {
        print!("{}", report.render());
    }
    Ok(())
}

async fn list(config: &TwxConfig) -> Result<()> {
    let store = FileArtifactStore::new(&config.audit.directory);
    let reports = store.list_reports().await?;
    if reports.is_empty() {
        println!("No reports under {}", store.reports_dir().display());
        return Ok(());
    }

    for path in reports {
        match store.load_report(&path).await {
            Ok(report) => println!(
                "{}  {:<8} {}",
                path.display(),
                report.mode.to_string(),
                report.state
            ),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable report");
                println!("{}  (unreadable)", path.display());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::config_in;
    use twx_core::{ExecutionMode, ExecutionReport, RejectionStage, SpecSummary};

    #[tokio::test]
    async fn test_renders_stored_report_and_lists_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let store = FileArtifactStore::new(&config.audit.directory);

        list(&config).await.unwrap();

        let report = ExecutionReport::rejected(
            ExecutionMode::DryRun,
            SpecSummary::default(),
            RejectionStage::Schema,
            None,
            "specification: actions must not be empty",
        );
        let path = store.save_report(&report).await.unwrap().unwrap();

        run_report(&config, Some(&path), false).await.unwrap();
        run_report(&config, Some(&path), true).await.unwrap();
        run_report(&config, None, false).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_report_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let missing = dir.path().join("run_missing.json");

        let err = run_report(&config, Some(&missing), false).await.unwrap_err();
        assert!(err.to_string().contains("run_missing.json"));
    }
}
