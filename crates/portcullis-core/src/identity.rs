//! Authenticated caller model.
//!
//! An [`Identity`] is produced by an authentication mechanism, attached to the
//! request context for the lifetime of one request and never mutated
//! afterwards. The mechanism-specific payload is carried as a JSON document so
//! that ACL predicate interpolation can look attributes up by dotted path.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Virtual role held only by the anonymous identity.
///
/// ACL rules scoped to this role apply to requests that no authentication
/// mechanism could authenticate.
pub const UNAUTHENTICATED_ROLE: &str = "$unauthenticated";

/// Principal name reported for unauthenticated requests.
const ANONYMOUS_NAME: &str = "anonymous";

/// An authenticated caller: principal name, role set and the raw verified
/// credential payload.
///
/// Immutable once constructed; share it as `Arc<Identity>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    name: String,
    roles: Vec<String>,
    claims: Value,
}

impl Identity {
    /// Create an identity from a principal name, roles and the
    /// mechanism-specific payload.
    ///
    /// Roles keep their given order; duplicates are dropped.
    pub fn new(name: impl Into<String>, roles: Vec<String>, claims: Value) -> Self {
        let mut deduped: Vec<String> = Vec::with_capacity(roles.len());
        for role in roles {
            if !deduped.contains(&role) {
                deduped.push(role);
            }
        }

        Self {
            name: name.into(),
            roles: deduped,
            claims,
        }
    }

    /// The anonymous identity: empty payload and only the
    /// [`UNAUTHENTICATED_ROLE`] marker role.
    pub fn anonymous() -> Self {
        Self {
            name: ANONYMOUS_NAME.to_string(),
            roles: vec![UNAUTHENTICATED_ROLE.to_string()],
            claims: Value::Object(serde_json::Map::new()),
        }
    }

    /// The principal name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The roles granted to this identity, in grant order.
    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    /// Check whether this identity holds the given role.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// `true` for the identity produced when no mechanism authenticated the
    /// request.
    pub fn is_anonymous(&self) -> bool {
        self.has_role(UNAUTHENTICATED_ROLE)
    }

    /// The mechanism-specific payload (e.g. verified token claims) as a JSON
    /// document.
    pub fn claims(&self) -> &Value {
        &self.claims
    }

    /// Resolve a dotted attribute path (e.g. `tenant` or `org.unit`) inside
    /// the payload.
    ///
    /// Numeric segments index into arrays (`groups.0`). Returns `None` when
    /// any segment is missing or traverses a non-container value.
    pub fn claim_at(&self, path: &str) -> Option<&Value> {
        value_at(&self.claims, path)
    }
}

/// Resolve a dotted path inside a JSON document.
///
/// Shared by [`Identity::claim_at`] and credential verifiers that inspect a
/// claim set before an identity exists.
pub fn value_at<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = document;

    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_roles_deduplicated_in_order() {
        let identity = Identity::new(
            "alice",
            vec!["admin".into(), "user".into(), "admin".into()],
            Value::Null,
        );
        assert_eq!(identity.roles(), &["admin".to_string(), "user".to_string()]);
    }

    #[test]
    fn test_anonymous_identity() {
        let identity = Identity::anonymous();
        assert!(identity.is_anonymous());
        assert!(identity.has_role(UNAUTHENTICATED_ROLE));
        assert_eq!(identity.name(), "anonymous");
        assert!(identity.claims().as_object().is_some_and(|m| m.is_empty()));
    }

    #[test]
    fn test_authenticated_identity_is_not_anonymous() {
        let identity = Identity::new("bob", vec!["user".into()], Value::Null);
        assert!(!identity.is_anonymous());
    }

    #[test]
    fn test_claim_at_direct_field() {
        let identity = Identity::new("alice", vec![], json!({"tenant": "acme"}));
        assert_eq!(identity.claim_at("tenant"), Some(&json!("acme")));
        assert_eq!(identity.claim_at("missing"), None);
    }

    #[test]
    fn test_claim_at_nested_and_indexed() {
        let identity = Identity::new(
            "alice",
            vec![],
            json!({"org": {"unit": "research"}, "groups": ["dev", "ops"]}),
        );
        assert_eq!(identity.claim_at("org.unit"), Some(&json!("research")));
        assert_eq!(identity.claim_at("groups.1"), Some(&json!("ops")));
        assert_eq!(identity.claim_at("groups.x"), None);
        assert_eq!(identity.claim_at("org.unit.deeper"), None);
    }
}
