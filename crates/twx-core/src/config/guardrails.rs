//! Guardrail policy configuration.
//!
//! Only raw strings live here. Regex compilation and action-name checking
//! happen when the policy is built, so a bad pattern fails at startup rather
//! than on the first specification.

use crate::action::ActionKind;
use serde::{Deserialize, Serialize};

/// Endpoint patterns rejected regardless of action type. Matched
/// case-insensitively against the resolved request path.
pub const DEFAULT_BLOCKED_ENDPOINT_PATTERNS: &[&str] = &[
    r".*/Delete.*",
    r".*/Remove.*",
    r".*/Purge.*",
    r".*/Reset.*",
    r".*/Permissions/.*",
    r".*/SetPermissions.*",
    r".*/GrantAccess.*",
    r".*/RevokeAccess.*",
    r".*/Restart.*",
    r".*/Shutdown.*",
];

/// Patterns rejected inside capability source code.
pub const DEFAULT_BLOCKED_CODE_PATTERNS: &[&str] = &[
    r"DeleteThing",
    r"DeleteEntity",
    r"SetPermissions",
    r"GrantAccess",
    r"RevokeAccess",
    r"Resources\[.*\]\.Delete",
    r"Resources\[.*\]\.Purge",
    r"Resources\[.*\]\.Reset",
];

/// Guardrail settings as written in `twx.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailsConfig {
    /// Action type names (wire names or aliases) that may be executed.
    #[serde(default = "default_allowed_actions")]
    pub allowed_actions: Vec<String>,

    #[serde(default = "default_blocked_endpoint_patterns")]
    pub blocked_endpoint_patterns: Vec<String>,

    #[serde(default = "default_blocked_code_patterns")]
    pub blocked_code_patterns: Vec<String>,
}

impl Default for GuardrailsConfig {
    fn default() -> Self {
        Self {
            allowed_actions: default_allowed_actions(),
            blocked_endpoint_patterns: default_blocked_endpoint_patterns(),
            blocked_code_patterns: default_blocked_code_patterns(),
        }
    }
}

fn default_allowed_actions() -> Vec<String> {
    ActionKind::NON_DESTRUCTIVE
        .iter()
        .map(|kind| kind.as_str().to_string())
        .collect()
}

fn default_blocked_endpoint_patterns() -> Vec<String> {
    DEFAULT_BLOCKED_ENDPOINT_PATTERNS
        .iter()
        .map(|p| p.to_string())
        .collect()
}

fn default_blocked_code_patterns() -> Vec<String> {
    DEFAULT_BLOCKED_CODE_PATTERNS
        .iter()
        .map(|p| p.to_string())
        .collect()
}
