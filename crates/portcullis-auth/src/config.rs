//! Authentication configuration.
//!
//! Deserialized from the gateway's configuration file; validated and turned
//! into the mechanism chain once at startup. Any inconsistency here is fatal
//! before serving begins.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AuthError;
use crate::mechanism::{
    AuthMechanism, BearerTokenMechanism, MechanismChain, StaticRealmMechanism,
};

// =============================================================================
// Token Configuration
// =============================================================================

/// Configuration of the bearer token mechanism.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// HMAC verification key; must pass the strength gate.
    pub key: String,

    /// Whether presented tokens are base64url-wrapped compact JWTs.
    pub base64_encoded: bool,

    /// Signature algorithm: `HS256`, `HS384` or `HS512`.
    pub algorithm: String,

    /// Claim holding the principal name (dotted path).
    pub username_claim: String,

    /// Claim holding the role array (dotted path). Mutually exclusive with
    /// `fixed_roles`.
    pub roles_claim: Option<String>,

    /// Roles granted to every verified token. Mutually exclusive with
    /// `roles_claim`.
    pub fixed_roles: Vec<String>,

    /// Required `iss` claim, when set.
    pub issuer: Option<String>,

    /// Accepted `aud` values; empty disables audience validation.
    pub audience: Vec<String>,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            key: String::new(),
            base64_encoded: false,
            algorithm: "HS256".to_string(),
            username_claim: "sub".to_string(),
            roles_claim: None,
            fixed_roles: Vec::new(),
            issuer: None,
            audience: Vec::new(),
        }
    }
}

impl TokenConfig {
    /// Check internal consistency (the key strength gate runs separately, in
    /// [`VerificationKey::new`]).
    ///
    /// [`VerificationKey::new`]: crate::mechanism::VerificationKey::new
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.key.is_empty() {
            return Err(AuthError::invalid_config("token key is not set"));
        }
        if self.username_claim.is_empty() {
            return Err(AuthError::invalid_config("username_claim is empty"));
        }
        if self.roles_claim.is_some() && !self.fixed_roles.is_empty() {
            return Err(AuthError::invalid_config(
                "cannot set both roles_claim and fixed_roles",
            ));
        }
        if self.roles_claim.is_none() && self.fixed_roles.is_empty() {
            return Err(AuthError::invalid_config(
                "need either roles_claim or fixed_roles",
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Static User Configuration
// =============================================================================

/// One user of the static realm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticUserConfig {
    /// Login name.
    pub username: String,

    /// Password, compared verbatim.
    pub password: String,

    /// Roles granted on successful authentication.
    #[serde(default)]
    pub roles: Vec<String>,

    /// Free-form account document; becomes the identity payload that
    /// `@user.*` predicate tokens resolve against.
    #[serde(default)]
    pub properties: Value,
}

// =============================================================================
// Auth Configuration
// =============================================================================

/// Authentication section of the gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Bearer token mechanism; absent disables it.
    pub token: Option<TokenConfig>,

    /// Users of the static realm; empty disables it.
    pub users: Vec<StaticUserConfig>,
}

impl AuthConfig {
    /// Check internal consistency without building mechanisms.
    pub fn validate(&self) -> Result<(), AuthError> {
        if let Some(token) = &self.token {
            token.validate()?;
        }
        Ok(())
    }

    /// Build the ordered mechanism chain: bearer token first, then the
    /// static realm.
    ///
    /// Fails fast on any configuration problem, including a weak token key.
    pub fn build_chain(&self) -> Result<MechanismChain, AuthError> {
        let mut mechanisms: Vec<Arc<dyn AuthMechanism>> = Vec::new();

        if let Some(token) = &self.token {
            mechanisms.push(Arc::new(BearerTokenMechanism::from_config(token)?));
        }
        if !self.users.is_empty() {
            mechanisms.push(Arc::new(StaticRealmMechanism::new(self.users.clone())?));
        }

        Ok(MechanismChain::new(mechanisms))
    }
}
