//! Error types for schema validation and guardrail enforcement.
//!
//! Both stages run before anything is sent, so every error here means the
//! specification had zero side effects. Each error names the offending
//! action index and type.

use std::fmt;
use twx_core::ActionKind;

// =============================================================================
// SCHEMA ERRORS
// =============================================================================

/// A specification that does not match the action schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    /// Offending action index. `None` for document-level problems.
    pub index: Option<usize>,
    /// The action's `type` string as written, when there is one.
    pub action_type: Option<String>,
    /// Offending field, when the problem is field-specific.
    pub field: Option<String>,
    pub problem: SchemaProblem,
}

/// What is wrong with the offending action or field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaProblem {
    /// `type` is not one of the known action kinds.
    UnknownActionType,
    /// A required field is absent.
    MissingField,
    /// A field that is not part of the action's schema.
    UnexpectedField,
    /// A field holds the wrong JSON kind.
    WrongKind {
        expected: &'static str,
        found: &'static str,
    },
    /// A name spliced into a URL path is not a safe identifier.
    InvalidIdentifier,
    /// A platform base type name is not recognized.
    InvalidBaseType { value: String },
    /// `actions` is present but empty.
    EmptyActions,
    /// An action is not a JSON object.
    NotAnObject,
}

impl SchemaError {
    fn at(index: usize, action_type: Option<&str>, field: Option<&str>, problem: SchemaProblem) -> Self {
        Self {
            index: Some(index),
            action_type: action_type.map(str::to_string),
            field: field.map(str::to_string),
            problem,
        }
    }

    /// `actions` is missing from the document.
    pub fn missing_actions() -> Self {
        Self {
            index: None,
            action_type: None,
            field: Some("actions".into()),
            problem: SchemaProblem::MissingField,
        }
    }

    /// `actions` is an empty array.
    pub fn empty_actions() -> Self {
        Self {
            index: None,
            action_type: None,
            field: Some("actions".into()),
            problem: SchemaProblem::EmptyActions,
        }
    }

    pub fn not_an_object(index: usize) -> Self {
        Self::at(index, None, None, SchemaProblem::NotAnObject)
    }

    pub fn unknown_action_type(index: usize, action_type: &str) -> Self {
        Self::at(index, Some(action_type), Some("type"), SchemaProblem::UnknownActionType)
    }

    pub fn missing_field(index: usize, action_type: Option<&str>, field: &str) -> Self {
        Self::at(index, action_type, Some(field), SchemaProblem::MissingField)
    }

    pub fn unexpected_field(index: usize, action_type: Option<&str>, field: &str) -> Self {
        Self::at(index, action_type, Some(field), SchemaProblem::UnexpectedField)
    }

    pub fn wrong_kind(
        index: usize,
        action_type: Option<&str>,
        field: &str,
        expected: &'static str,
        found: &'static str,
    ) -> Self {
        Self::at(
            index,
            action_type,
            Some(field),
            SchemaProblem::WrongKind { expected, found },
        )
    }

    pub fn invalid_identifier(index: usize, action_type: &str, field: &str) -> Self {
        Self::at(index, Some(action_type), Some(field), SchemaProblem::InvalidIdentifier)
    }

    pub fn invalid_base_type(index: usize, action_type: &str, field: &str, value: &str) -> Self {
        Self::at(
            index,
            Some(action_type),
            Some(field),
            SchemaProblem::InvalidBaseType {
                value: value.to_string(),
            },
        )
    }

    /// The problem description without the location prefix.
    pub fn reason(&self) -> String {
        let field = self.field.as_deref().unwrap_or("?");
        match &self.problem {
            SchemaProblem::UnknownActionType => format!(
                "unknown action type '{}'",
                self.action_type.as_deref().unwrap_or("")
            ),
            SchemaProblem::MissingField => format!("field '{field}' is required but missing"),
            SchemaProblem::UnexpectedField => format!("field '{field}' is not recognized"),
            SchemaProblem::WrongKind { expected, found } => {
                format!("field '{field}' must be {expected}, found {found}")
            }
            SchemaProblem::InvalidIdentifier => format!(
                "field '{field}' must be 1-128 characters from [A-Za-z0-9_.-] without '..'"
            ),
            SchemaProblem::InvalidBaseType { value } => {
                format!("field '{field}' has unknown base type '{value}'")
            }
            SchemaProblem::EmptyActions => "field 'actions' must contain at least one action".into(),
            SchemaProblem::NotAnObject => "action must be a JSON object".into(),
        }
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.index, self.action_type.as_deref()) {
            (Some(index), Some(action_type)) => {
                write!(f, "action[{index}] ({action_type}): {}", self.reason())
            }
            (Some(index), None) => write!(f, "action[{index}]: {}", self.reason()),
            (None, _) => write!(f, "specification: {}", self.reason()),
        }
    }
}

impl std::error::Error for SchemaError {}

// =============================================================================
// GUARDRAIL ERRORS
// =============================================================================

/// Why the guardrail refused an action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardrailViolation {
    #[error("action type not permitted")]
    ActionNotPermitted,

    #[error("endpoint '{path}' matches blocked pattern '{pattern}'")]
    BlockedEndpoint { pattern: String, path: String },

    #[error("method {method} is never permitted ({path})")]
    BlockedMethod { method: String, path: String },

    #[error("capability code matches blocked pattern '{pattern}': '{excerpt}'")]
    BlockedCode { pattern: String, excerpt: String },
}

/// The first action the guardrail refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("action[{index}] ({action_type}): {violation}")]
pub struct GuardrailRejection {
    pub index: usize,
    pub action_type: ActionKind,
    pub violation: GuardrailViolation,
}

// =============================================================================
// POLICY CONSTRUCTION ERRORS
// =============================================================================

/// A guardrail configuration that cannot be turned into a policy.
#[derive(Debug, thiserror::Error)]
pub enum PolicyConfigError {
    #[error("unknown action type '{0}' in guardrails.allowed_actions")]
    UnknownAction(String),

    #[error("invalid blocklist pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_names_index_type_and_field() {
        let err = SchemaError::missing_field(2, Some("add-capability"), "code");
        assert_eq!(
            err.to_string(),
            "action[2] (add-capability): field 'code' is required but missing"
        );
    }

    #[test]
    fn test_document_level_error() {
        assert_eq!(
            SchemaError::empty_actions().to_string(),
            "specification: field 'actions' must contain at least one action"
        );
    }

    #[test]
    fn test_guardrail_rejection_text() {
        let rejection = GuardrailRejection {
            index: 0,
            action_type: ActionKind::DeleteEntity,
            violation: GuardrailViolation::ActionNotPermitted,
        };
        assert_eq!(
            rejection.to_string(),
            "action[0] (delete-entity): action type not permitted"
        );
    }
}
