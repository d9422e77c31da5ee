//! ACL rule evaluation: the gateway's access manager.
//!
//! Rules are loaded once at startup, ordered by priority (declaration order
//! breaks ties) and immutable afterwards. Per request, the authorizer walks
//! the applicable rules and the first one whose predicate evaluates `true`
//! allows the request; no rule means deny.
//!
//! Verdicts are computed fresh per request — interpolation depends on the
//! caller's identity — but parsed predicates are cached per distinct
//! interpolated string, since parsing is deterministic and evaluation pure.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use portcullis_core::{Identity, Permission, RequestContext};

use super::interpolate::{
    DEFAULT_IDENTITY_PREFIX, InterpolationError, interpolate, interpolate_placeholder,
    references_identity,
};
use super::predicate::{Predicate, PredicateSyntaxError};

// =============================================================================
// ACL Errors
// =============================================================================

/// Errors raised while loading or evaluating ACL rules.
#[derive(Debug, thiserror::Error)]
pub enum AclError {
    /// A rule's predicate template does not parse.
    ///
    /// Fatal at startup: a misconfigured rule must never be silently skipped
    /// at request time.
    #[error("invalid predicate in ACL rule '{rule}': {source}")]
    InvalidPredicate {
        /// The offending rule's id.
        rule: String,
        /// The underlying syntax error.
        #[source]
        source: PredicateSyntaxError,
    },

    /// A rule references an identity attribute the authenticated caller does
    /// not carry.
    ///
    /// Distinct from a deny: this indicates a misconfigured rule and is
    /// surfaced as a server error.
    #[error("ACL rule '{rule}' failed to resolve: {source}")]
    AttributeResolution {
        /// The offending rule's id.
        rule: String,
        /// The underlying interpolation error.
        #[source]
        source: InterpolationError,
    },
}

// =============================================================================
// ACL Rule
// =============================================================================

/// One access-control rule: a predicate template guarded by a permission and
/// scoped to a set of roles.
///
/// The literal role [`UNAUTHENTICATED_ROLE`] scopes a rule to anonymous
/// callers.
///
/// [`UNAUTHENTICATED_ROLE`]: portcullis_core::UNAUTHENTICATED_ROLE
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AclRule {
    /// Rule identifier, for logs and error reporting.
    pub id: String,

    /// Roles this rule applies to; the identity must hold at least one.
    pub roles: Vec<String>,

    /// Predicate template, possibly containing identity-attribute tokens.
    pub predicate: String,

    /// Permission this rule grants when its predicate holds.
    pub permission: Permission,

    /// Evaluation priority; lower values are consulted first.
    #[serde(default)]
    pub priority: i64,
}

// =============================================================================
// ACL Authorizer
// =============================================================================

/// The access manager: an immutable, priority-ordered rule set plus a parsed
/// predicate cache, shared read-only by all requests.
#[derive(Debug)]
pub struct AclAuthorizer {
    rules: Vec<AclRule>,
    identity_prefix: String,
    parsed: DashMap<String, Arc<Predicate>>,
}

impl AclAuthorizer {
    /// Build an authorizer with the default `@user.` identity prefix.
    ///
    /// Every rule's predicate template is syntax-checked here (identity
    /// tokens substituted with a placeholder first), so bad grammar aborts
    /// startup instead of surfacing per request.
    pub fn new(rules: Vec<AclRule>) -> Result<Self, AclError> {
        Self::with_identity_prefix(rules, DEFAULT_IDENTITY_PREFIX)
    }

    /// Build an authorizer with a custom identity-attribute token prefix.
    pub fn with_identity_prefix(
        mut rules: Vec<AclRule>,
        identity_prefix: impl Into<String>,
    ) -> Result<Self, AclError> {
        let identity_prefix = identity_prefix.into();

        // Stable sort: declaration order breaks priority ties.
        rules.sort_by_key(|rule| rule.priority);

        for rule in &rules {
            let checkable = interpolate_placeholder(&rule.predicate, &identity_prefix);
            Predicate::parse(&checkable).map_err(|source| AclError::InvalidPredicate {
                rule: rule.id.clone(),
                source,
            })?;
        }

        Ok(Self {
            rules,
            identity_prefix,
            parsed: DashMap::new(),
        })
    }

    /// Number of loaded rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// `true` when no rules are loaded (every request is denied).
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Decide whether `identity` may perform the request.
    ///
    /// Rules are consulted in priority order; the first applicable rule whose
    /// predicate evaluates `true` allows. No applicable rule means deny.
    pub fn is_allowed(
        &self,
        request: &RequestContext,
        identity: &Identity,
    ) -> Result<bool, AclError> {
        let wanted = request.method().required_permission();

        for rule in &self.rules {
            if rule.permission != wanted {
                continue;
            }
            if !rule.roles.iter().any(|role| identity.has_role(role)) {
                continue;
            }

            let needs_identity = references_identity(&rule.predicate, &self.identity_prefix);
            if identity.is_anonymous() && needs_identity {
                // An anonymous caller can never satisfy an identity-scoped
                // rule; skip it rather than fail the request.
                continue;
            }

            let interpolated = if needs_identity {
                interpolate(&rule.predicate, &self.identity_prefix, identity).map_err(
                    |source| AclError::AttributeResolution {
                        rule: rule.id.clone(),
                        source,
                    },
                )?
            } else {
                rule.predicate.clone()
            };

            let predicate = self.parsed_predicate(&rule.id, &interpolated)?;

            if predicate.evaluate(request) {
                tracing::debug!(
                    rule = %rule.id,
                    user = %identity.name(),
                    method = %request.method(),
                    path = %request.path(),
                    "request allowed by ACL rule"
                );
                return Ok(true);
            }
        }

        tracing::debug!(
            user = %identity.name(),
            method = %request.method(),
            path = %request.path(),
            "no ACL rule allows the request"
        );
        Ok(false)
    }

    /// Whether an anonymous caller could ever be allowed this request.
    ///
    /// Used by the pipeline to reject unauthenticated requests early, before
    /// running expensive stages.
    pub fn is_authentication_required(&self, request: &RequestContext) -> bool {
        let anonymous = Identity::anonymous();
        // Identity-scoped rules are skipped for the anonymous identity, so
        // this cannot fail on attribute resolution.
        !matches!(self.is_allowed(request, &anonymous), Ok(true))
    }

    fn parsed_predicate(
        &self,
        rule_id: &str,
        interpolated: &str,
    ) -> Result<Arc<Predicate>, AclError> {
        if let Some(cached) = self.parsed.get(interpolated) {
            return Ok(Arc::clone(&cached));
        }

        let predicate = Predicate::parse(interpolated)
            .map(Arc::new)
            .map_err(|source| AclError::InvalidPredicate {
                rule: rule_id.to_string(),
                source,
            })?;

        self.parsed
            .insert(interpolated.to_string(), predicate.clone());
        Ok(predicate)
    }
}
