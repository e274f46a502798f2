//! Configuration types for twx.
//!
//! Configuration is loaded from a single YAML file (`twx.yaml` by default)
//! and then overlaid with environment variables. A missing file is not an
//! error; every section has defaults that give the built-in safe policy.
//!
//! # Environment
//!
//! - `THINGWORX_BASE_URL` (or the variable named by `remote.base_url_env`)
//! - `THINGWORX_APP_KEY` (or the variable named by `remote.app_key_env`)
//! - `THINGWORX_TIMEOUT` seconds
//! - `THINGWORX_VERIFY_TLS` (`true`/`false`)
//! - `THINGWORX_SERVICEHELPER_THING`

pub mod audit;
pub mod guardrails;
pub mod remote;

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

pub use audit::AuditConfig;
pub use guardrails::{
    DEFAULT_BLOCKED_CODE_PATTERNS, DEFAULT_BLOCKED_ENDPOINT_PATTERNS, GuardrailsConfig,
};
pub use remote::RemoteConfig;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "twx.yaml";

pub const TIMEOUT_ENV: &str = "THINGWORX_TIMEOUT";
pub const VERIFY_TLS_ENV: &str = "THINGWORX_VERIFY_TLS";
pub const SERVICE_HELPER_ENV: &str = "THINGWORX_SERVICEHELPER_THING";

/// Complete twx configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwxConfig {
    /// Project name, used only in log output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    /// Remote platform connection.
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Guardrail policy.
    #[serde(default)]
    pub guardrails: GuardrailsConfig,

    /// Audit artifacts.
    #[serde(default)]
    pub audit: AuditConfig,
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl TwxConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Load from `path` (defaults when the file does not exist), apply
    /// environment overrides and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, |name| std::env::var(name).ok())
    }

    /// [`TwxConfig::load`] with environment values read through `lookup`.
    pub fn load_with<F>(path: impl AsRef<Path>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match Self::from_file(path.as_ref()) {
            Ok(config) => config,
            Err(ConfigError::Io(e)) if e.kind() == ErrorKind::NotFound => Self::default(),
            Err(e) => return Err(e),
        };
        config.apply_env_overrides_with(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay values from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_env_overrides_with(|name| std::env::var(name).ok())
    }

    /// Overlay values read through `lookup`.
    pub fn apply_env_overrides_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(&self.remote.base_url_env).filter(|v| !v.trim().is_empty()) {
            self.remote.base_url = Some(url);
        }

        if let Some(raw) = lookup(TIMEOUT_ENV) {
            self.remote.timeout_seconds = raw.trim().parse().map_err(|_| {
                ConfigError::Config(format!("{TIMEOUT_ENV} must be a whole number of seconds"))
            })?;
        }

        if let Some(raw) = lookup(VERIFY_TLS_ENV) {
            self.remote.verify_tls = parse_bool(&raw).ok_or_else(|| {
                ConfigError::Config(format!("{VERIFY_TLS_ENV} must be true or false"))
            })?;
        }

        if let Some(helper) = lookup(SERVICE_HELPER_ENV).filter(|v| !v.trim().is_empty()) {
            self.remote.service_helper = helper.trim().to_string();
        }

        Ok(())
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.remote.timeout_seconds == 0 {
            return Err(ConfigError::Config(
                "remote.timeout_seconds must be greater than zero".into(),
            ));
        }
        if self.remote.service_helper.trim().is_empty() {
            return Err(ConfigError::Config(
                "remote.service_helper must not be empty".into(),
            ));
        }
        if self.remote.app_key_env.trim().is_empty() {
            return Err(ConfigError::Config(
                "remote.app_key_env must name an environment variable".into(),
            ));
        }
        if self.audit.enabled && self.audit.directory.as_os_str().is_empty() {
            return Err(ConfigError::Config(
                "audit.directory must be set when audit is enabled".into(),
            ));
        }
        Ok(())
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
