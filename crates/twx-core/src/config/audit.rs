//! Audit artifact configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where specification and report artifacts are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Whether artifacts are persisted at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Root directory; `specs/` and `reports/` are created beneath it.
    #[serde(default = "default_directory")]
    pub directory: PathBuf,

    /// Also print the report as JSON to stdout after each run, after the
    /// rendered summary.
    #[serde(default)]
    pub stdout: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            directory: default_directory(),
            stdout: false,
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_directory() -> PathBuf {
    PathBuf::from("artifacts")
}
