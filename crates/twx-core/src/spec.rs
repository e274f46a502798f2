//! Raw specification documents.
//!
//! A [`Specification`] is the JSON document handed to the pipeline. Actions
//! are kept as untyped JSON here so the schema validator can report the exact
//! index and field that is wrong instead of a serde position.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// A specification as received from a generator, a template or a human.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Specification {
    /// Specification format version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Optional provenance metadata.
    #[serde(default)]
    pub metadata: SpecMetadata,

    /// Ordered action list. `None` when the document has no `actions` key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<Value>>,

    /// Top-level keys twx does not interpret, kept for the audit trail.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Provenance metadata. Unknown keys are preserved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpecMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, alias = "generated_at", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<String>,

    /// The natural-language request the specification was generated from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Errors reading a specification document.
#[derive(Debug, thiserror::Error)]
pub enum SpecificationError {
    #[error("failed to read specification: {0}")]
    Io(#[from] std::io::Error),

    #[error("specification is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl Specification {
    /// Build a specification from raw action values.
    pub fn from_actions(actions: Vec<Value>) -> Self {
        Self {
            version: None,
            metadata: SpecMetadata::default(),
            actions: Some(actions),
            extra: Map::new(),
        }
    }

    /// Parse a specification from JSON text.
    pub fn from_json_str(content: &str) -> Result<Self, SpecificationError> {
        // Generators on some platforms emit a UTF-8 BOM.
        let content = content.trim_start_matches('\u{feff}');
        Ok(serde_json::from_str(content)?)
    }

    /// Load a specification from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SpecificationError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    pub fn action_count(&self) -> usize {
        self.actions.as_ref().map(Vec::len).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_with_metadata() {
        let spec = Specification::from_json_str(
            r#"{
                "version": "1.0.0",
                "metadata": {
                    "generated_at": "2025-01-08T10:00:00Z",
                    "prompt": "Create a calculator",
                    "model": "local"
                },
                "actions": [{"type": "create-entity", "params": {"name": "Calc"}}]
            }"#,
        )
        .unwrap();

        assert_eq!(spec.version.as_deref(), Some("1.0.0"));
        assert_eq!(spec.metadata.prompt.as_deref(), Some("Create a calculator"));
        assert!(spec.metadata.created_at.is_some());
        assert_eq!(spec.metadata.extra.get("model"), Some(&json!("local")));
        assert_eq!(spec.action_count(), 1);
    }

    #[test]
    fn test_unknown_top_level_keys_survive_reserialization() {
        let spec = Specification::from_json_str(
            r#"{"actions": [], "generator": {"name": "llm", "temperature": 0.2}, "ticket": "CHG-42"}"#,
        )
        .unwrap();
        assert_eq!(spec.extra.get("ticket"), Some(&json!("CHG-42")));

        let written = serde_json::to_value(&spec).unwrap();
        assert_eq!(
            written,
            json!({
                "metadata": {},
                "actions": [],
                "generator": {"name": "llm", "temperature": 0.2},
                "ticket": "CHG-42"
            })
        );
    }

    #[test]
    fn test_missing_actions_is_none() {
        let spec = Specification::from_json_str(r#"{"metadata": {}}"#).unwrap();
        assert!(spec.actions.is_none());
        assert_eq!(spec.action_count(), 0);
    }

    #[test]
    fn test_bom_is_ignored() {
        let spec = Specification::from_json_str("\u{feff}{\"actions\": []}").unwrap();
        assert_eq!(spec.actions, Some(vec![]));
    }

    #[test]
    fn test_non_array_actions_is_parse_error() {
        let err = Specification::from_json_str(r#"{"actions": {"type": "x"}}"#).unwrap_err();
        assert!(matches!(err, SpecificationError::Json(_)));
    }
}
