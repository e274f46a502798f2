//! `twx ping` command implementation.

use anyhow::{Context, Result, bail};
use twx_adapter_http::HttpTransport;
use twx_core::TwxConfig;

pub async fn run_ping(config: &TwxConfig) -> Result<()> {
    let transport =
        HttpTransport::from_config(&config.remote).context("Remote platform is not configured")?;

    let report = transport
        .ping()
        .await
        .with_context(|| format!("{} is not reachable", transport.base_url()))?;

    if !report.authenticated() {
        bail!(
            "{} is reachable but refused the application key (HTTP {} on {})",
            transport.base_url(),
            report.status,
            report.path
        );
    }

    println!(
        "OK: {} answered HTTP {} on {}",
        transport.base_url(),
        report.status,
        report.path
    );
    Ok(())
}
