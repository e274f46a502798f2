//! Typed actions.
//!
//! An [`Action`] is one unit of work in a specification. The set of action
//! kinds is closed: every kind has a parameter schema (enforced by the schema
//! validator), an allowlist entry (or deliberate absence) in the guardrail
//! policy, and exactly one request mapping in [`crate::request`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The closed set of action kinds a specification may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    /// Create a new entity from a template.
    CreateEntity,
    /// Update an entity's description.
    UpdateEntity,
    /// Enable an entity.
    EnableEntity,
    /// Attach a capability (service) with source code to an entity.
    AddCapability,
    /// Add a property definition to an entity.
    AddPropertyDefinition,
    /// Write a property value.
    SetPropertyValue,
    /// Invoke a capability on an entity.
    InvokeCapability,

    // Destructive / privilege-changing kinds. They parse so the guardrail can
    // reject them by name; the default policy never permits them.
    /// Delete an entity.
    DeleteEntity,
    /// Remove a property definition.
    RemovePropertyDefinition,
    /// Remove a capability.
    RemoveCapability,
    /// Change runtime permissions on an entity.
    SetPermissions,
}

impl ActionKind {
    /// Every kind, in declaration order.
    pub const ALL: [ActionKind; 11] = [
        ActionKind::CreateEntity,
        ActionKind::UpdateEntity,
        ActionKind::EnableEntity,
        ActionKind::AddCapability,
        ActionKind::AddPropertyDefinition,
        ActionKind::SetPropertyValue,
        ActionKind::InvokeCapability,
        ActionKind::DeleteEntity,
        ActionKind::RemovePropertyDefinition,
        ActionKind::RemoveCapability,
        ActionKind::SetPermissions,
    ];

    /// Kinds permitted by the built-in guardrail policy.
    pub const NON_DESTRUCTIVE: [ActionKind; 7] = [
        ActionKind::CreateEntity,
        ActionKind::UpdateEntity,
        ActionKind::EnableEntity,
        ActionKind::AddCapability,
        ActionKind::AddPropertyDefinition,
        ActionKind::SetPropertyValue,
        ActionKind::InvokeCapability,
    ];

    /// Canonical wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::CreateEntity => "create-entity",
            ActionKind::UpdateEntity => "update-entity",
            ActionKind::EnableEntity => "enable-entity",
            ActionKind::AddCapability => "add-capability",
            ActionKind::AddPropertyDefinition => "add-property-definition",
            ActionKind::SetPropertyValue => "set-property-value",
            ActionKind::InvokeCapability => "invoke-capability",
            ActionKind::DeleteEntity => "delete-entity",
            ActionKind::RemovePropertyDefinition => "remove-property-definition",
            ActionKind::RemoveCapability => "remove-capability",
            ActionKind::SetPermissions => "set-permissions",
        }
    }

    /// Alternative spellings accepted on input (platform service names).
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            ActionKind::CreateEntity => &["CreateThing"],
            ActionKind::UpdateEntity => &["UpdateThing"],
            ActionKind::EnableEntity => &["EnableThing"],
            ActionKind::AddCapability => &["add-capability-to-entity", "AddServiceToThing"],
            ActionKind::AddPropertyDefinition => &["AddPropertyDefinition"],
            ActionKind::SetPropertyValue => &["SetProperty"],
            ActionKind::InvokeCapability => &["ExecuteService"],
            ActionKind::DeleteEntity => &["DeleteThing"],
            ActionKind::RemovePropertyDefinition => &["RemovePropertyDefinition"],
            ActionKind::RemoveCapability => &["RemoveServiceDefinition"],
            ActionKind::SetPermissions => &["SetPermissions"],
        }
    }

    /// Parse a canonical name or alias. Matching is exact.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name || kind.aliases().contains(&name))
    }

    /// Creation-style kinds treat "already exists" as convergence, not failure.
    pub fn is_creation(&self) -> bool {
        matches!(
            self,
            ActionKind::CreateEntity
                | ActionKind::AddCapability
                | ActionKind::AddPropertyDefinition
        )
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no action kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action type '{0}'")]
pub struct UnknownActionKind(pub String);

impl FromStr for ActionKind {
    type Err = UnknownActionKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| UnknownActionKind(s.to_string()))
    }
}

/// Platform base types accepted for property definitions and capability
/// signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BaseType {
    String,
    Number,
    Integer,
    Long,
    Boolean,
    Datetime,
    Json,
    Infotable,
    Location,
    Text,
    Html,
    Image,
    Xml,
    Guid,
    Thingname,
    Username,
    Password,
    Query,
    Nothing,
}

impl BaseType {
    pub const ALL: [BaseType; 19] = [
        BaseType::String,
        BaseType::Number,
        BaseType::Integer,
        BaseType::Long,
        BaseType::Boolean,
        BaseType::Datetime,
        BaseType::Json,
        BaseType::Infotable,
        BaseType::Location,
        BaseType::Text,
        BaseType::Html,
        BaseType::Image,
        BaseType::Xml,
        BaseType::Guid,
        BaseType::Thingname,
        BaseType::Username,
        BaseType::Password,
        BaseType::Query,
        BaseType::Nothing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BaseType::String => "STRING",
            BaseType::Number => "NUMBER",
            BaseType::Integer => "INTEGER",
            BaseType::Long => "LONG",
            BaseType::Boolean => "BOOLEAN",
            BaseType::Datetime => "DATETIME",
            BaseType::Json => "JSON",
            BaseType::Infotable => "INFOTABLE",
            BaseType::Location => "LOCATION",
            BaseType::Text => "TEXT",
            BaseType::Html => "HTML",
            BaseType::Image => "IMAGE",
            BaseType::Xml => "XML",
            BaseType::Guid => "GUID",
            BaseType::Thingname => "THINGNAME",
            BaseType::Username => "USERNAME",
            BaseType::Password => "PASSWORD",
            BaseType::Query => "QUERY",
            BaseType::Nothing => "NOTHING",
        }
    }

    /// Case-insensitive parse.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-kind parameters. Field names follow the specification's `params` keys.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionParams {
    CreateEntity {
        name: String,
        template: String,
        description: Option<String>,
    },
    UpdateEntity {
        name: String,
        description: String,
    },
    EnableEntity {
        name: String,
    },
    AddCapability {
        entity: String,
        capability: String,
        code: String,
        params: BTreeMap<String, BaseType>,
        result_type: BaseType,
        description: Option<String>,
    },
    AddPropertyDefinition {
        entity: String,
        name: String,
        base_type: BaseType,
        description: Option<String>,
        persistent: Option<bool>,
        logged: Option<bool>,
    },
    SetPropertyValue {
        entity: String,
        property: String,
        /// A JSON scalar (string, number or boolean).
        value: Value,
    },
    InvokeCapability {
        entity: String,
        capability: String,
        args: Map<String, Value>,
    },
    DeleteEntity {
        name: String,
    },
    RemovePropertyDefinition {
        entity: String,
        name: String,
    },
    RemoveCapability {
        entity: String,
        capability: String,
    },
    SetPermissions {
        entity: String,
        principal: String,
        permission: String,
        allow: bool,
    },
}

impl ActionParams {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionParams::CreateEntity { .. } => ActionKind::CreateEntity,
            ActionParams::UpdateEntity { .. } => ActionKind::UpdateEntity,
            ActionParams::EnableEntity { .. } => ActionKind::EnableEntity,
            ActionParams::AddCapability { .. } => ActionKind::AddCapability,
            ActionParams::AddPropertyDefinition { .. } => ActionKind::AddPropertyDefinition,
            ActionParams::SetPropertyValue { .. } => ActionKind::SetPropertyValue,
            ActionParams::InvokeCapability { .. } => ActionKind::InvokeCapability,
            ActionParams::DeleteEntity { .. } => ActionKind::DeleteEntity,
            ActionParams::RemovePropertyDefinition { .. } => ActionKind::RemovePropertyDefinition,
            ActionParams::RemoveCapability { .. } => ActionKind::RemoveCapability,
            ActionParams::SetPermissions { .. } => ActionKind::SetPermissions,
        }
    }

    /// The entity this action targets.
    pub fn target_entity(&self) -> &str {
        match self {
            ActionParams::CreateEntity { name, .. }
            | ActionParams::UpdateEntity { name, .. }
            | ActionParams::EnableEntity { name }
            | ActionParams::DeleteEntity { name } => name,
            ActionParams::AddCapability { entity, .. }
            | ActionParams::AddPropertyDefinition { entity, .. }
            | ActionParams::SetPropertyValue { entity, .. }
            | ActionParams::InvokeCapability { entity, .. }
            | ActionParams::RemovePropertyDefinition { entity, .. }
            | ActionParams::RemoveCapability { entity, .. }
            | ActionParams::SetPermissions { entity, .. } => entity,
        }
    }
}

/// A schema-valid action.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub params: ActionParams,
    /// Free-text note carried through to reports.
    pub description: Option<String>,
}

impl Action {
    pub fn new(params: ActionParams) -> Self {
        Self {
            params,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn kind(&self) -> ActionKind {
        self.params.kind()
    }

    /// One-line summary used in plans and logs.
    pub fn summary(&self) -> String {
        match &self.params {
            ActionParams::CreateEntity { name, template, .. } => {
                format!("create entity '{name}' from template '{template}'")
            }
            ActionParams::UpdateEntity { name, .. } => format!("update entity '{name}'"),
            ActionParams::EnableEntity { name } => format!("enable entity '{name}'"),
            ActionParams::AddCapability {
                entity, capability, ..
            } => format!("add capability '{capability}' to '{entity}'"),
            ActionParams::AddPropertyDefinition {
                entity,
                name,
                base_type,
                ..
            } => format!("add property '{name}' ({base_type}) to '{entity}'"),
            ActionParams::SetPropertyValue {
                entity, property, ..
            } => format!("set '{entity}.{property}'"),
            ActionParams::InvokeCapability {
                entity, capability, ..
            } => format!("invoke '{entity}.{capability}'"),
            ActionParams::DeleteEntity { name } => format!("delete entity '{name}'"),
            ActionParams::RemovePropertyDefinition { entity, name } => {
                format!("remove property '{name}' from '{entity}'")
            }
            ActionParams::RemoveCapability { entity, capability } => {
                format!("remove capability '{capability}' from '{entity}'")
            }
            ActionParams::SetPermissions {
                entity, principal, ..
            } => format!("set permissions on '{entity}' for '{principal}'"),
        }
    }
}
