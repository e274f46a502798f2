//! Remote platform connection settings.
//!
//! The base URL may be given directly or through an environment variable.
//! The application key is only ever read from the environment; it has no
//! YAML field so it cannot end up in a checked-in config file.

use super::ConfigError;
use crate::request::DEFAULT_SERVICE_HELPER;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const PLACEHOLDER_APP_KEY: &str = "your-app-key-here";
const PLACEHOLDER_HOST: &str = "your-server";

/// Connection settings for the remote platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL, e.g. `https://twx.example.com/Thingworx`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Environment variable holding the base URL. Takes precedence over
    /// `base_url`.
    #[serde(default = "default_base_url_env")]
    pub base_url_env: String,

    /// Environment variable holding the application key.
    #[serde(default = "default_app_key_env")]
    pub app_key_env: String,

    /// Per-request timeout.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Verify the server's TLS certificate.
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,

    /// Thing hosting the `AddServiceToThing` helper service.
    #[serde(default = "default_service_helper")]
    pub service_helper: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            base_url_env: default_base_url_env(),
            app_key_env: default_app_key_env(),
            timeout_seconds: default_timeout_seconds(),
            verify_tls: default_verify_tls(),
            service_helper: default_service_helper(),
        }
    }
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// The configured base URL without a trailing slash.
    pub fn base_url(&self) -> Result<String, ConfigError> {
        let url = self
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                ConfigError::Config(format!(
                    "remote base URL is not set (set remote.base_url or {})",
                    self.base_url_env
                ))
            })?;

        if url.contains(PLACEHOLDER_HOST) {
            return Err(ConfigError::Config(
                "remote base URL still contains the placeholder host 'your-server'".into(),
            ));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Config(format!(
                "remote base URL must start with http:// or https://, got '{url}'"
            )));
        }

        Ok(url.trim_end_matches('/').to_string())
    }

    /// Read the application key from the process environment.
    pub fn resolve_app_key(&self) -> Result<SecretString, ConfigError> {
        self.resolve_app_key_with(|name| std::env::var(name).ok())
    }

    /// Read the application key through `lookup`.
    pub fn resolve_app_key_with<F>(&self, lookup: F) -> Result<SecretString, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let key = lookup(&self.app_key_env)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                ConfigError::Config(format!(
                    "application key not found: environment variable {} is not set",
                    self.app_key_env
                ))
            })?;

        if key == PLACEHOLDER_APP_KEY {
            return Err(ConfigError::Config(format!(
                "environment variable {} still holds the placeholder value",
                self.app_key_env
            )));
        }

        Ok(SecretString::from(key))
    }
}

fn default_base_url_env() -> String {
    "THINGWORX_BASE_URL".to_string()
}

fn default_app_key_env() -> String {
    "THINGWORX_APP_KEY".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_verify_tls() -> bool {
    true
}

fn default_service_helper() -> String {
    DEFAULT_SERVICE_HELPER.to_string()
}
