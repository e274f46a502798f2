use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use twx_core::{DEFAULT_CONFIG_FILE, TwxConfig};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "twx", version, about = "Guarded execution of ThingWorx change specifications")]
struct Cli {
    /// Configuration file. Defaults are used when it does not exist.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE, env = "TWX_CONFIG")]
    config: PathBuf,

    /// Log at debug level (RUST_LOG takes precedence).
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check a specification against the action schemas and guardrails. Sends nothing.
    Validate {
        /// Path to the specification JSON
        file: PathBuf,

        /// Report every offending action instead of stopping at the first
        #[arg(long, default_value_t = false)]
        all: bool,
    },

    /// Dry run: show every request a specification would send.
    Plan {
        /// Path to the specification JSON
        file: PathBuf,
    },

    /// Execute a specification against the remote platform.
    Apply {
        /// Path to the specification JSON
        file: PathBuf,

        /// Skip the confirmation prompt
        #[arg(long, short = 'y', default_value_t = false)]
        yes: bool,
    },

    /// Print the active allowlist and blocklists.
    Guardrails,

    /// Check that the remote platform answers and accepts the application key.
    Ping,

    /// Render a stored report. With no file, list stored reports.
    Report {
        file: Option<PathBuf>,

        /// Print the raw JSON instead of the rendered summary
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli.config)?;

    match cli.cmd {
        Command::Validate { file, all } => commands::validate::run_validate(&config, &file, all)?,
        Command::Plan { file } => commands::run::run_plan(&config, &file).await?,
        Command::Apply { file, yes } => commands::run::run_apply(&config, &file, yes).await?,
        Command::Guardrails => commands::guardrails::run_guardrails(&config)?,
        Command::Ping => commands::ping::run_ping(&config).await?,
        Command::Report { file, json } => {
            commands::report::run_report(&config, file.as_deref(), json).await?
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // stdout carries plans and reports.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: &Path) -> anyhow::Result<TwxConfig> {
    let config = TwxConfig::load(path)
        .with_context(|| format!("Failed to load config file: {}", path.display()))?;
    tracing::debug!(
        path = %path.display(),
        project = config.project.as_deref().unwrap_or("-"),
        "configuration loaded"
    );
    Ok(config)
}
