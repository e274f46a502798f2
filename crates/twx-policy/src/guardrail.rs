//! Guardrail policy enforcement.
//!
//! The `GuardrailEngine` decides, per action, whether a schema-valid action
//! may run. Checks run in this order and the first failure wins:
//!
//! 1. **Allowlist** - the action kind must be explicitly permitted
//! 2. **Method** - resolved `DELETE` requests are never permitted
//! 3. **Endpoint blocklist** - the *resolved* path must not match a blocked
//!    pattern, whatever the action kind
//! 4. **Code blocklist** - a request that installs capability code (any kind
//!    resolving to the `AddServiceToThing` helper service) must carry no
//!    string matching a blocked pattern
//!
//! The blocklists only ever reject. Nothing outside the allowlist is approved
//! because it happens to miss every pattern.

use crate::error::{GuardrailRejection, GuardrailViolation, PolicyConfigError};
use crate::rules::{PatternMatch, PatternSet};
use crate::schema::ValidatedSpecification;
use serde_json::Value;
use std::collections::BTreeSet;
use twx_core::{
    Action, ActionKind, GuardrailsConfig, HttpMethod, RequestResolver, ResolvedRequest,
    SpecSummary,
};

/// Immutable guardrail policy, built once at startup.
#[derive(Debug, Clone)]
pub struct GuardrailPolicy {
    allowed: BTreeSet<ActionKind>,
    blocked_endpoints: PatternSet,
    blocked_code: PatternSet,
    resolver: RequestResolver,
}

impl Default for GuardrailPolicy {
    /// The built-in safe policy: the non-destructive kinds and the default
    /// blocklists.
    fn default() -> Self {
        Self::from_config(&GuardrailsConfig::default(), RequestResolver::default())
            .unwrap_or_else(|e| {
                tracing::error!(
                    error = %e,
                    "built-in guardrail policy failed to build, refusing every action"
                );
                Self::deny_all()
            })
    }
}

impl GuardrailPolicy {
    /// A policy that permits nothing.
    pub fn deny_all() -> Self {
        Self {
            allowed: BTreeSet::new(),
            blocked_endpoints: PatternSet::empty(),
            blocked_code: PatternSet::empty(),
            resolver: RequestResolver::default(),
        }
    }

    pub fn builder() -> GuardrailPolicyBuilder {
        GuardrailPolicyBuilder::default()
    }

    /// Build a policy from configuration.
    pub fn from_config(
        config: &GuardrailsConfig,
        resolver: RequestResolver,
    ) -> Result<Self, PolicyConfigError> {
        let mut builder = Self::builder().resolver(resolver);
        for name in &config.allowed_actions {
            let kind = ActionKind::parse(name)
                .ok_or_else(|| PolicyConfigError::UnknownAction(name.clone()))?;
            builder = builder.allow(kind);
        }
        builder
            .block_endpoints(config.blocked_endpoint_patterns.iter())
            .block_code(config.blocked_code_patterns.iter())
            .build()
    }

    pub fn is_allowed(&self, kind: ActionKind) -> bool {
        self.allowed.contains(&kind)
    }

    pub fn allowed_actions(&self) -> impl Iterator<Item = ActionKind> + '_ {
        self.allowed.iter().copied()
    }

    pub fn blocked_endpoint_patterns(&self) -> impl Iterator<Item = &str> {
        self.blocked_endpoints.sources()
    }

    pub fn blocked_code_patterns(&self) -> impl Iterator<Item = &str> {
        self.blocked_code.sources()
    }

    pub fn resolver(&self) -> &RequestResolver {
        &self.resolver
    }
}

/// Builder for [`GuardrailPolicy`]. Starts empty: nothing allowed, nothing
/// blocked.
#[derive(Debug, Default)]
pub struct GuardrailPolicyBuilder {
    allowed: BTreeSet<ActionKind>,
    endpoint_patterns: Vec<String>,
    code_patterns: Vec<String>,
    resolver: RequestResolver,
}

impl GuardrailPolicyBuilder {
    pub fn allow(mut self, kind: ActionKind) -> Self {
        self.allowed.insert(kind);
        self
    }

    pub fn allow_all(mut self, kinds: impl IntoIterator<Item = ActionKind>) -> Self {
        self.allowed.extend(kinds);
        self
    }

    pub fn block_endpoints<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.endpoint_patterns
            .extend(patterns.into_iter().map(|p| p.as_ref().to_string()));
        self
    }

    pub fn block_code<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.code_patterns
            .extend(patterns.into_iter().map(|p| p.as_ref().to_string()));
        self
    }

    pub fn resolver(mut self, resolver: RequestResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn build(self) -> Result<GuardrailPolicy, PolicyConfigError> {
        Ok(GuardrailPolicy {
            allowed: self.allowed,
            blocked_endpoints: PatternSet::compile(&self.endpoint_patterns)?,
            blocked_code: PatternSet::compile(&self.code_patterns)?,
            resolver: self.resolver,
        })
    }
}

/// Outcome of evaluating one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allowed,
    Rejected(GuardrailViolation),
}

impl GuardrailDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardrailDecision::Allowed)
    }
}

/// A specification every action of which the guardrail allowed, together
/// with the exact requests it inspected.
///
/// Only [`GuardrailEngine::evaluate`] constructs this type; the executor
/// accepts nothing else and sends [`ApprovedSpecification::requests`]
/// unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovedSpecification {
    inner: ValidatedSpecification,
    requests: Vec<ResolvedRequest>,
}

impl ApprovedSpecification {
    pub fn summary(&self) -> &SpecSummary {
        self.inner.summary()
    }

    pub fn actions(&self) -> &[Action] {
        self.inner.actions()
    }

    /// The resolved request of each action, index-aligned with
    /// [`ApprovedSpecification::actions`].
    pub fn requests(&self) -> &[ResolvedRequest] {
        &self.requests
    }

    /// Actions paired with their approved requests, in order.
    pub fn steps(&self) -> impl Iterator<Item = (&Action, &ResolvedRequest)> {
        self.actions().iter().zip(&self.requests)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Applies a [`GuardrailPolicy`] to actions and specifications.
#[derive(Debug, Clone, Default)]
pub struct GuardrailEngine {
    policy: GuardrailPolicy,
}

impl GuardrailEngine {
    pub fn new(policy: GuardrailPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &GuardrailPolicy {
        &self.policy
    }

    /// Decide one action. Pure function of the action and the policy.
    pub fn evaluate_action(&self, action: &Action) -> GuardrailDecision {
        match self.check(action) {
            Ok(_) => GuardrailDecision::Allowed,
            Err(violation) => GuardrailDecision::Rejected(violation),
        }
    }

    /// Approve the whole specification or reject it at the first offending
    /// action. There is no partial approval.
    pub fn evaluate(
        &self,
        spec: &ValidatedSpecification,
    ) -> Result<ApprovedSpecification, GuardrailRejection> {
        let mut requests = Vec::with_capacity(spec.len());
        for (index, action) in spec.actions().iter().enumerate() {
            match self.check(action) {
                Ok(request) => requests.push(request),
                Err(violation) => {
                    tracing::warn!(
                        index,
                        action = %action.kind(),
                        reason = %violation,
                        "guardrail rejected action"
                    );
                    return Err(GuardrailRejection {
                        index,
                        action_type: action.kind(),
                        violation,
                    });
                }
            }
        }

        tracing::debug!(actions = spec.len(), "specification passed guardrails");
        Ok(ApprovedSpecification {
            inner: spec.clone(),
            requests,
        })
    }

    fn check(&self, action: &Action) -> Result<ResolvedRequest, GuardrailViolation> {
        // 1. Allowlist is authoritative.
        if !self.policy.is_allowed(action.kind()) {
            return Err(GuardrailViolation::ActionNotPermitted);
        }

        let request = self.policy.resolver.resolve(action);

        // 2. DELETE is never sent.
        if request.method == HttpMethod::Delete {
            return Err(GuardrailViolation::BlockedMethod {
                method: request.method.to_string(),
                path: request.path,
            });
        }

        // 3. Inspect the resolved target, not the declared kind.
        if let Some(m) = self.policy.blocked_endpoints.first_match(&request.path) {
            return Err(GuardrailViolation::BlockedEndpoint {
                pattern: m.pattern.to_string(),
                path: request.path.clone(),
            });
        }

        // 4. Code installed through the helper service, whichever kind
        // resolved to it.
        if request.installs_code()
            && let Some(m) = request
                .body
                .as_ref()
                .and_then(|body| first_code_match(&self.policy.blocked_code, body))
        {
            return Err(GuardrailViolation::BlockedCode {
                pattern: m.pattern.to_string(),
                excerpt: m.excerpt,
            });
        }

        Ok(request)
    }
}

/// First blocked pattern found in any string of `value`.
fn first_code_match<'p>(patterns: &'p PatternSet, value: &Value) -> Option<PatternMatch<'p>> {
    match value {
        Value::String(text) => patterns.first_match(text),
        Value::Array(items) => items.iter().find_map(|item| first_code_match(patterns, item)),
        Value::Object(fields) => fields
            .values()
            .find_map(|field| first_code_match(patterns, field)),
        _ => None,
    }
}
