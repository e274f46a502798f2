//! Specification schema validation.
//!
//! The `SchemaValidator` turns a raw [`Specification`] into a
//! [`ValidatedSpecification`] holding typed [`Action`]s. Every action kind has
//! a fixed parameter schema:
//!
//! 1. **Shape** - each action is an object with `type`, `params` and an
//!    optional `description`, nothing else
//! 2. **Type** - `type` names a kind in the closed [`ActionKind`] set
//! 3. **Params** - `params` holds exactly the required keys plus recognized
//!    optional keys, each of the expected kind
//!
//! Values spliced into request paths must be identifiers (see
//! [`crate::rules::is_identifier`]).

use crate::error::SchemaError;
use crate::rules::is_identifier;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use twx_core::{Action, ActionKind, ActionParams, BaseType, SpecSummary, Specification};

/// Default template for `create-entity`.
pub const DEFAULT_TEMPLATE: &str = "GenericThing";

const ACTION_KEYS: &[&str] = &["type", "params", "description"];

/// A specification whose every action matched its schema.
///
/// Only [`SchemaValidator::validate`] constructs this type, so holding one is
/// proof the schema stage passed. The action list is read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSpecification {
    summary: SpecSummary,
    actions: Vec<Action>,
}

impl ValidatedSpecification {
    pub fn summary(&self) -> &SpecSummary {
        &self.summary
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Validates specifications against the per-kind action schemas.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaValidator;

impl SchemaValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate every action in order, stopping at the first error.
    pub fn validate(&self, spec: &Specification) -> Result<ValidatedSpecification, SchemaError> {
        let raw = raw_actions(spec)?;
        let actions = raw
            .iter()
            .enumerate()
            .map(|(index, value)| self.parse_action(index, value))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(actions = actions.len(), "specification passed schema validation");

        Ok(ValidatedSpecification {
            summary: SpecSummary::from(spec),
            actions,
        })
    }

    /// Every schema error in the specification, one per offending action.
    pub fn collect_errors(&self, spec: &Specification) -> Vec<SchemaError> {
        match raw_actions(spec) {
            Ok(raw) => raw
                .iter()
                .enumerate()
                .filter_map(|(index, value)| self.parse_action(index, value).err())
                .collect(),
            Err(e) => vec![e],
        }
    }

    /// Parse one raw action.
    pub fn parse_action(&self, index: usize, value: &Value) -> Result<Action, SchemaError> {
        let Some(object) = value.as_object() else {
            return Err(SchemaError::not_an_object(index));
        };

        // `type` first so later errors can name it.
        let type_name = match object.get("type") {
            None => return Err(SchemaError::missing_field(index, None, "type")),
            Some(Value::String(s)) => s.as_str(),
            Some(other) => {
                return Err(SchemaError::wrong_kind(
                    index,
                    None,
                    "type",
                    "a string",
                    kind_name(other),
                ));
            }
        };
        let Some(kind) = ActionKind::parse(type_name) else {
            return Err(SchemaError::unknown_action_type(index, type_name));
        };

        if let Some(key) = object.keys().find(|k| !ACTION_KEYS.contains(&k.as_str())) {
            return Err(SchemaError::unexpected_field(index, Some(type_name), key));
        }

        let description = match object.get("description") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => {
                return Err(SchemaError::wrong_kind(
                    index,
                    Some(type_name),
                    "description",
                    "a string",
                    kind_name(other),
                ));
            }
        };

        let params = match object.get("params") {
            None => return Err(SchemaError::missing_field(index, Some(type_name), "params")),
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(SchemaError::wrong_kind(
                    index,
                    Some(type_name),
                    "params",
                    "an object",
                    kind_name(other),
                ));
            }
        };

        let reader = ParamReader {
            index,
            type_name,
            params,
        };
        let params = reader.parse(kind)?;

        Ok(Action {
            params,
            description,
        })
    }
}

fn raw_actions(spec: &Specification) -> Result<&[Value], SchemaError> {
    match spec.actions.as_deref() {
        None => Err(SchemaError::missing_actions()),
        Some([]) => Err(SchemaError::empty_actions()),
        Some(actions) => Ok(actions),
    }
}

/// Name of a JSON value's kind, for error messages.
fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Typed access to one action's `params`.
struct ParamReader<'a> {
    index: usize,
    type_name: &'a str,
    params: &'a Map<String, Value>,
}

impl<'a> ParamReader<'a> {
    fn parse(&self, kind: ActionKind) -> Result<ActionParams, SchemaError> {
        self.check_keys(schema_keys(kind))?;

        let params = match kind {
            ActionKind::CreateEntity => ActionParams::CreateEntity {
                name: self.ident("name")?,
                template: self
                    .opt_ident("template")?
                    .unwrap_or_else(|| DEFAULT_TEMPLATE.to_string()),
                description: self.opt_string("description")?,
            },
            ActionKind::UpdateEntity => ActionParams::UpdateEntity {
                name: self.ident("name")?,
                description: self.string("description")?,
            },
            ActionKind::EnableEntity => ActionParams::EnableEntity {
                name: self.ident("name")?,
            },
            ActionKind::AddCapability => ActionParams::AddCapability {
                entity: self.ident("entity")?,
                capability: self.ident("capability")?,
                code: self.string("code")?,
                params: self.opt_type_map("params")?,
                result_type: self.opt_base_type("resultType")?.unwrap_or(BaseType::String),
                description: self.opt_string("description")?,
            },
            ActionKind::AddPropertyDefinition => ActionParams::AddPropertyDefinition {
                entity: self.ident("entity")?,
                name: self.ident("name")?,
                base_type: self.base_type("type")?,
                description: self.opt_string("description")?,
                persistent: self.opt_bool("persistent")?,
                logged: self.opt_bool("logged")?,
            },
            ActionKind::SetPropertyValue => ActionParams::SetPropertyValue {
                entity: self.ident("entity")?,
                property: self.ident("property")?,
                value: self.scalar("value")?,
            },
            ActionKind::InvokeCapability => ActionParams::InvokeCapability {
                entity: self.ident("entity")?,
                capability: self.ident("capability")?,
                args: self.opt_object("args")?.unwrap_or_default(),
            },
            ActionKind::DeleteEntity => ActionParams::DeleteEntity {
                name: self.ident("name")?,
            },
            ActionKind::RemovePropertyDefinition => ActionParams::RemovePropertyDefinition {
                entity: self.ident("entity")?,
                name: self.ident("name")?,
            },
            ActionKind::RemoveCapability => ActionParams::RemoveCapability {
                entity: self.ident("entity")?,
                capability: self.ident("capability")?,
            },
            ActionKind::SetPermissions => ActionParams::SetPermissions {
                entity: self.ident("entity")?,
                principal: self.string("principal")?,
                permission: self.string("permission")?,
                allow: self.bool("allow")?,
            },
        };
        Ok(params)
    }

    fn check_keys(&self, (required, optional): (&[&str], &[&str])) -> Result<(), SchemaError> {
        if let Some(key) = self
            .params
            .keys()
            .find(|k| !required.contains(&k.as_str()) && !optional.contains(&k.as_str()))
        {
            return Err(SchemaError::unexpected_field(
                self.index,
                Some(self.type_name),
                &format!("params.{key}"),
            ));
        }
        if let Some(key) = required.iter().find(|k| !self.params.contains_key(**k)) {
            return Err(self.missing(key));
        }
        Ok(())
    }

    fn missing(&self, field: &str) -> SchemaError {
        SchemaError::missing_field(self.index, Some(self.type_name), field)
    }

    fn wrong_kind(&self, field: &str, expected: &'static str, found: &Value) -> SchemaError {
        SchemaError::wrong_kind(
            self.index,
            Some(self.type_name),
            field,
            expected,
            kind_name(found),
        )
    }

    /// Present and non-null.
    fn get(&self, field: &str) -> Option<&'a Value> {
        self.params.get(field).filter(|v| !v.is_null())
    }

    fn opt_string(&self, field: &str) -> Result<Option<String>, SchemaError> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(self.wrong_kind(field, "a string", other)),
        }
    }

    fn string(&self, field: &str) -> Result<String, SchemaError> {
        self.opt_string(field)?.ok_or_else(|| self.missing(field))
    }

    fn opt_ident(&self, field: &str) -> Result<Option<String>, SchemaError> {
        let value = self.opt_string(field)?;
        match value {
            Some(s) if !is_identifier(&s) => Err(SchemaError::invalid_identifier(
                self.index,
                self.type_name,
                field,
            )),
            other => Ok(other),
        }
    }

    fn ident(&self, field: &str) -> Result<String, SchemaError> {
        self.opt_ident(field)?.ok_or_else(|| self.missing(field))
    }

    fn opt_bool(&self, field: &str) -> Result<Option<bool>, SchemaError> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(self.wrong_kind(field, "a boolean", other)),
        }
    }

    fn bool(&self, field: &str) -> Result<bool, SchemaError> {
        self.opt_bool(field)?.ok_or_else(|| self.missing(field))
    }

    fn opt_base_type(&self, field: &str) -> Result<Option<BaseType>, SchemaError> {
        let Some(name) = self.opt_string(field)? else {
            return Ok(None);
        };
        BaseType::parse(&name).map(Some).ok_or_else(|| {
            SchemaError::invalid_base_type(self.index, self.type_name, field, &name)
        })
    }

    fn base_type(&self, field: &str) -> Result<BaseType, SchemaError> {
        self.opt_base_type(field)?.ok_or_else(|| self.missing(field))
    }

    /// A string, number or boolean.
    fn scalar(&self, field: &str) -> Result<Value, SchemaError> {
        match self.get(field) {
            None => Err(self.missing(field)),
            Some(v @ (Value::String(_) | Value::Number(_) | Value::Bool(_))) => Ok(v.clone()),
            Some(other) => Err(self.wrong_kind(field, "a string, number or boolean", other)),
        }
    }

    fn opt_object(&self, field: &str) -> Result<Option<Map<String, Value>>, SchemaError> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map.clone())),
            Some(other) => Err(self.wrong_kind(field, "an object", other)),
        }
    }

    /// Object mapping identifier names to base type strings.
    fn opt_type_map(&self, field: &str) -> Result<BTreeMap<String, BaseType>, SchemaError> {
        let Some(map) = self.opt_object(field)? else {
            return Ok(BTreeMap::new());
        };
        map.iter()
            .map(|(name, value)| {
                let path = format!("{field}.{name}");
                if !is_identifier(name) {
                    return Err(SchemaError::invalid_identifier(
                        self.index,
                        self.type_name,
                        &path,
                    ));
                }
                let type_name = value
                    .as_str()
                    .ok_or_else(|| self.wrong_kind(&path, "a base type string", value))?;
                let base_type = BaseType::parse(type_name).ok_or_else(|| {
                    SchemaError::invalid_base_type(self.index, self.type_name, &path, type_name)
                })?;
                Ok((name.clone(), base_type))
            })
            .collect()
    }
}

/// Required and optional `params` keys per kind.
fn schema_keys(kind: ActionKind) -> (&'static [&'static str], &'static [&'static str]) {
    match kind {
        ActionKind::CreateEntity => (&["name"], &["template", "description"]),
        ActionKind::UpdateEntity => (&["name", "description"], &[]),
        ActionKind::EnableEntity => (&["name"], &[]),
        ActionKind::AddCapability => (
            &["entity", "capability", "code"],
            &["params", "resultType", "description"],
        ),
        ActionKind::AddPropertyDefinition => (
            &["entity", "name", "type"],
            &["description", "persistent", "logged"],
        ),
        ActionKind::SetPropertyValue => (&["entity", "property", "value"], &[]),
        ActionKind::InvokeCapability => (&["entity", "capability"], &["args"]),
        ActionKind::DeleteEntity => (&["name"], &[]),
        ActionKind::RemovePropertyDefinition => (&["entity", "name"], &[]),
        ActionKind::RemoveCapability => (&["entity", "capability"], &[]),
        ActionKind::SetPermissions => (&["entity", "principal", "permission", "allow"], &[]),
    }
}
