//! Mapping from actions to concrete REST requests.
//!
//! [`RequestResolver::resolve`] is the only place that knows how an action
//! becomes a method, path and body. The guardrail inspects its output and the
//! executor sends it, so a dry-run preview and a live run can never disagree
//! on what is sent.

use crate::action::{Action, ActionParams};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;

/// HTTP method of a resolved request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully-formed request, relative to the platform base URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRequest {
    pub method: HttpMethod,
    /// Path beginning with `/`.
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl ResolvedRequest {
    fn new(method: HttpMethod, path: String, body: Option<Value>) -> Self {
        Self { method, path, body }
    }

    /// Whether the request installs capability code on the platform,
    /// whichever action kind resolved to it.
    pub fn installs_code(&self) -> bool {
        self.path
            .len()
            .checked_sub(ADD_SERVICE_SUFFIX.len())
            .and_then(|start| self.path.get(start..))
            .is_some_and(|tail| tail.eq_ignore_ascii_case(ADD_SERVICE_SUFFIX))
    }
}

impl fmt::Display for ResolvedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// Path suffix of the service that injects capability code.
const ADD_SERVICE_SUFFIX: &str = "/Services/AddServiceToThing";

/// Default thing hosting the service-injection helper.
pub const DEFAULT_SERVICE_HELPER: &str = "ServiceHelper";

/// Resolves actions to requests. Built once from static configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestResolver {
    service_helper: String,
}

impl Default for RequestResolver {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE_HELPER)
    }
}

impl RequestResolver {
    pub fn new(service_helper: impl Into<String>) -> Self {
        Self {
            service_helper: service_helper.into(),
        }
    }

    pub fn service_helper(&self) -> &str {
        &self.service_helper
    }

    /// Resolve an action. Total over every action kind.
    pub fn resolve(&self, action: &Action) -> ResolvedRequest {
        use HttpMethod::*;

        match &action.params {
            ActionParams::CreateEntity {
                name,
                template,
                description,
            } => {
                let mut body = Map::new();
                body.insert("name".into(), json!(name));
                body.insert("thingTemplateName".into(), json!(template));
                insert_opt(&mut body, "description", description.as_ref().map(|d| json!(d)));
                ResolvedRequest::new(
                    Post,
                    "/Resources/EntityServices/Services/CreateThing".into(),
                    Some(Value::Object(body)),
                )
            }
            ActionParams::UpdateEntity { name, description } => ResolvedRequest::new(
                Put,
                format!("/Things/{name}"),
                Some(json!({ "name": name, "description": description })),
            ),
            ActionParams::EnableEntity { name } => {
                ResolvedRequest::new(Post, format!("/Things/{name}/Services/EnableThing"), None)
            }
            ActionParams::AddCapability {
                entity,
                capability,
                code,
                params,
                result_type,
                description,
            } => {
                let parameters: Map<String, Value> = params
                    .iter()
                    .map(|(name, base_type)| (name.clone(), json!(base_type.as_str())))
                    .collect();
                let mut body = Map::new();
                body.insert("thingName".into(), json!(entity));
                body.insert("serviceName".into(), json!(capability));
                body.insert("serviceCode".into(), json!(code));
                body.insert("parameters".into(), Value::Object(parameters));
                body.insert("resultType".into(), json!(result_type.as_str()));
                insert_opt(&mut body, "description", description.as_ref().map(|d| json!(d)));
                ResolvedRequest::new(
                    Post,
                    format!("/Things/{}{ADD_SERVICE_SUFFIX}", self.service_helper),
                    Some(Value::Object(body)),
                )
            }
            ActionParams::AddPropertyDefinition {
                entity,
                name,
                base_type,
                description,
                persistent,
                logged,
            } => {
                let mut body = Map::new();
                body.insert("name".into(), json!(name));
                body.insert("type".into(), json!(base_type.as_str()));
                insert_opt(&mut body, "description", description.as_ref().map(|d| json!(d)));
                insert_opt(&mut body, "isPersistent", persistent.map(Value::Bool));
                insert_opt(&mut body, "isLogged", logged.map(Value::Bool));
                ResolvedRequest::new(
                    Post,
                    format!("/Things/{entity}/Services/AddPropertyDefinition"),
                    Some(Value::Object(body)),
                )
            }
            ActionParams::SetPropertyValue {
                entity,
                property,
                value,
            } => {
                let mut body = Map::new();
                body.insert(property.clone(), value.clone());
                ResolvedRequest::new(
                    Put,
                    format!("/Things/{entity}/Properties/{property}"),
                    Some(Value::Object(body)),
                )
            }
            ActionParams::InvokeCapability {
                entity,
                capability,
                args,
            } => ResolvedRequest::new(
                Post,
                format!("/Things/{entity}/Services/{capability}"),
                Some(Value::Object(args.clone())),
            ),
            ActionParams::DeleteEntity { name } => {
                ResolvedRequest::new(Delete, format!("/Things/{name}"), None)
            }
            ActionParams::RemovePropertyDefinition { entity, name } => ResolvedRequest::new(
                Post,
                format!("/Things/{entity}/Services/RemovePropertyDefinition"),
                Some(json!({ "name": name })),
            ),
            ActionParams::RemoveCapability { entity, capability } => ResolvedRequest::new(
                Post,
                format!("/Things/{entity}/Services/RemoveServiceDefinition"),
                Some(json!({ "name": capability })),
            ),
            ActionParams::SetPermissions {
                entity,
                principal,
                permission,
                allow,
            } => ResolvedRequest::new(
                Post,
                format!("/Things/{entity}/Services/SetPermissions"),
                Some(json!({
                    "principal": principal,
                    "permission": permission,
                    "allow": allow,
                })),
            ),
        }
    }
}

fn insert_opt(body: &mut Map<String, Value>, key: &str, value: Option<Value>) {
    if let Some(value) = value {
        body.insert(key.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::BaseType;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    #[test]
    fn test_create_entity_request() {
        let action = Action::new(ActionParams::CreateEntity {
            name: "demo-thing".into(),
            template: "GenericThing".into(),
            description: None,
        });
        let req = RequestResolver::default().resolve(&action);
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.path, "/Resources/EntityServices/Services/CreateThing");
        assert_eq!(
            req.body,
            Some(json!({"name": "demo-thing", "thingTemplateName": "GenericThing"}))
        );
    }

    #[test]
    fn test_add_capability_uses_configured_helper() {
        let action = Action::new(ActionParams::AddCapability {
            entity: "demo-thing".into(),
            capability: "solve".into(),
            code: "result = a + b;".into(),
            params: BTreeMap::from([
                ("a".to_string(), BaseType::Number),
                ("b".to_string(), BaseType::Number),
            ]),
            result_type: BaseType::Number,
            description: None,
        });
        let req = RequestResolver::new("Injector").resolve(&action);
        assert_eq!(req.path, "/Things/Injector/Services/AddServiceToThing");
        assert_eq!(
            req.body,
            Some(json!({
                "thingName": "demo-thing",
                "serviceName": "solve",
                "serviceCode": "result = a + b;",
                "parameters": {"a": "NUMBER", "b": "NUMBER"},
                "resultType": "NUMBER"
            }))
        );
    }

    #[test]
    fn test_installs_code_follows_the_resolved_path() {
        let resolver = RequestResolver::default();
        let add = resolver.resolve(&Action::new(ActionParams::AddCapability {
            entity: "demo-thing".into(),
            capability: "solve".into(),
            code: "result = 1;".into(),
            params: BTreeMap::new(),
            result_type: BaseType::Number,
            description: None,
        }));
        assert!(add.installs_code());

        let invoke = |entity: &str, capability: &str| {
            resolver.resolve(&Action::new(ActionParams::InvokeCapability {
                entity: entity.into(),
                capability: capability.into(),
                args: Map::new(),
            }))
        };
        assert!(invoke("ServiceHelper", "AddServiceToThing").installs_code());
        assert!(invoke("OtherHelper", "addservicetothing").installs_code());
        assert!(!invoke("demo-thing", "solve").installs_code());
    }

    #[test]
    fn test_enable_entity_has_no_body() {
        let action = Action::new(ActionParams::EnableEntity {
            name: "demo-thing".into(),
        });
        let req = RequestResolver::default().resolve(&action);
        assert_eq!(req.to_string(), "POST /Things/demo-thing/Services/EnableThing");
        assert!(req.body.is_none());
    }

    #[test]
    fn test_set_property_value_body_is_keyed_by_property() {
        let action = Action::new(ActionParams::SetPropertyValue {
            entity: "pump".into(),
            property: "speed".into(),
            value: json!(42),
        });
        let req = RequestResolver::default().resolve(&action);
        assert_eq!(req.method, HttpMethod::Put);
        assert_eq!(req.path, "/Things/pump/Properties/speed");
        assert_eq!(req.body, Some(json!({"speed": 42})));
    }

    #[test]
    fn test_delete_entity_resolves_to_delete_method() {
        let action = Action::new(ActionParams::DeleteEntity {
            name: "pump".into(),
        });
        let req = RequestResolver::default().resolve(&action);
        assert_eq!(req.method, HttpMethod::Delete);
        assert_eq!(req.path, "/Things/pump");
    }
}
