//! Pluggable authentication mechanisms.
//!
//! A mechanism inspects one request and either produces an [`Identity`],
//! declines because no credentials of its kind were presented, or rejects the
//! credentials it found. Mechanisms are tried strictly in configuration
//! order; the first to authenticate wins and later mechanisms never run. When
//! none authenticates, the request proceeds with the anonymous identity and
//! may still be rejected downstream if the matched pipeline or the access
//! manager requires authentication.

use std::sync::Arc;

use async_trait::async_trait;

use portcullis_core::{Identity, RequestContext};

pub mod bearer;
pub mod static_realm;

pub use bearer::{BearerTokenMechanism, VerificationKey};
pub use static_realm::StaticRealmMechanism;

// =============================================================================
// Mechanism Trait
// =============================================================================

/// Result of one mechanism inspecting one request.
#[derive(Debug)]
pub enum AuthOutcome {
    /// The mechanism verified credentials and produced an identity.
    Authenticated(Identity),

    /// The request carries no credentials of this mechanism's kind.
    NotAttempted,

    /// Credentials of this mechanism's kind were presented but failed
    /// verification. The chain falls through to the next mechanism.
    Rejected(String),
}

/// A pluggable authentication strategy.
#[async_trait]
pub trait AuthMechanism: Send + Sync {
    /// Mechanism name, for logs.
    fn name(&self) -> &str;

    /// Inspect the request and try to produce an identity.
    async fn authenticate(&self, request: &RequestContext) -> AuthOutcome;
}

// =============================================================================
// Mechanism Chain
// =============================================================================

/// Ordered trial of configured mechanisms; first success wins.
///
/// The trial is sequential per request — never parallelized — to preserve
/// deterministic first-match semantics and avoid redundant cryptographic
/// verification.
pub struct MechanismChain {
    mechanisms: Vec<Arc<dyn AuthMechanism>>,
}

impl MechanismChain {
    /// Create a chain trying mechanisms in the given order.
    pub fn new(mechanisms: Vec<Arc<dyn AuthMechanism>>) -> Self {
        Self { mechanisms }
    }

    /// Number of configured mechanisms.
    pub fn len(&self) -> usize {
        self.mechanisms.len()
    }

    /// `true` when no mechanisms are configured (every request is anonymous).
    pub fn is_empty(&self) -> bool {
        self.mechanisms.is_empty()
    }

    /// Authenticate the request, falling back to the anonymous identity.
    pub async fn authenticate(&self, request: &RequestContext) -> Arc<Identity> {
        for mechanism in &self.mechanisms {
            match mechanism.authenticate(request).await {
                AuthOutcome::Authenticated(identity) => {
                    tracing::debug!(
                        mechanism = mechanism.name(),
                        user = identity.name(),
                        "request authenticated"
                    );
                    return Arc::new(identity);
                }
                AuthOutcome::NotAttempted => {}
                AuthOutcome::Rejected(reason) => {
                    tracing::debug!(
                        mechanism = mechanism.name(),
                        reason = %reason,
                        "credentials rejected, falling through"
                    );
                }
            }
        }

        Arc::new(Identity::anonymous())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portcullis_core::Method;
    use serde_json::json;

    struct FixedMechanism {
        name: &'static str,
        outcome: fn() -> AuthOutcome,
    }

    #[async_trait]
    impl AuthMechanism for FixedMechanism {
        fn name(&self) -> &str {
            self.name
        }

        async fn authenticate(&self, _request: &RequestContext) -> AuthOutcome {
            (self.outcome)()
        }
    }

    fn identity_for(name: &str) -> AuthOutcome {
        AuthOutcome::Authenticated(Identity::new(name, vec!["user".into()], json!({})))
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let chain = MechanismChain::new(vec![
            Arc::new(FixedMechanism {
                name: "skip",
                outcome: || AuthOutcome::NotAttempted,
            }),
            Arc::new(FixedMechanism {
                name: "first",
                outcome: || identity_for("from-first"),
            }),
            Arc::new(FixedMechanism {
                name: "second",
                outcome: || identity_for("from-second"),
            }),
        ]);

        let ctx = RequestContext::new(Method::Get, "/x");
        let identity = chain.authenticate(&ctx).await;
        assert_eq!(identity.name(), "from-first");
    }

    #[tokio::test]
    async fn test_rejection_falls_through() {
        let chain = MechanismChain::new(vec![
            Arc::new(FixedMechanism {
                name: "rejecting",
                outcome: || AuthOutcome::Rejected("bad signature".into()),
            }),
            Arc::new(FixedMechanism {
                name: "accepting",
                outcome: || identity_for("fallback"),
            }),
        ]);

        let ctx = RequestContext::new(Method::Get, "/x");
        let identity = chain.authenticate(&ctx).await;
        assert_eq!(identity.name(), "fallback");
    }

    #[tokio::test]
    async fn test_no_success_yields_anonymous() {
        let chain = MechanismChain::new(vec![Arc::new(FixedMechanism {
            name: "skip",
            outcome: || AuthOutcome::NotAttempted,
        })]);

        let ctx = RequestContext::new(Method::Get, "/x");
        let identity = chain.authenticate(&ctx).await;
        assert!(identity.is_anonymous());
    }

    #[tokio::test]
    async fn test_empty_chain_yields_anonymous() {
        let chain = MechanismChain::new(Vec::new());
        assert!(chain.is_empty());
        let ctx = RequestContext::new(Method::Get, "/x");
        assert!(chain.authenticate(&ctx).await.is_anonymous());
    }
}
