//! Bearer token authentication mechanism.
//!
//! Verifies the signature of a compact JWT presented as
//! `Authorization: Bearer <token>` with a configured HMAC key, extracts the
//! principal name and roles from claims and carries the full verified claim
//! set as the identity payload for ACL predicate interpolation.
//!
//! The verification key must pass a complexity gate at configuration time;
//! a weak key is a fatal configuration error, not a warning.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde_json::Value;

use portcullis_core::{Identity, RequestContext, identity::value_at};

use crate::config::TokenConfig;
use crate::error::AuthError;

use super::{AuthMechanism, AuthOutcome};

/// Header prefix marking a bearer token.
const BEARER_PREFIX: &str = "Bearer ";

// =============================================================================
// Verification Key
// =============================================================================

/// Minimum accepted verification key length, in bytes.
pub const MIN_KEY_LENGTH: usize = 32;

/// An HMAC verification key that passed the complexity gate.
///
/// The gate requires at least one lowercase letter, one uppercase letter,
/// one digit, one non-alphanumeric symbol and [`MIN_KEY_LENGTH`] bytes.
pub struct VerificationKey {
    secret: String,
}

impl VerificationKey {
    /// Accept a key, or refuse with the first policy violation.
    pub fn new(secret: impl Into<String>) -> Result<Self, AuthError> {
        let secret = secret.into();

        if secret.len() < MIN_KEY_LENGTH {
            return Err(AuthError::weak_key(format!(
                "shorter than {MIN_KEY_LENGTH} bytes"
            )));
        }
        if !secret.chars().any(|c| c.is_ascii_lowercase()) {
            return Err(AuthError::weak_key("no lowercase letter"));
        }
        if !secret.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(AuthError::weak_key("no uppercase letter"));
        }
        if !secret.chars().any(|c| c.is_ascii_digit()) {
            return Err(AuthError::weak_key("no digit"));
        }
        if !secret.chars().any(|c| !c.is_ascii_alphanumeric()) {
            return Err(AuthError::weak_key("no symbol"));
        }

        Ok(Self { secret })
    }

    /// Raw key material.
    pub fn as_bytes(&self) -> &[u8] {
        self.secret.as_bytes()
    }
}

impl std::fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        f.write_str("VerificationKey(..)")
    }
}

// =============================================================================
// Bearer Token Mechanism
// =============================================================================

/// Token-based authentication strategy.
pub struct BearerTokenMechanism {
    decoding_key: DecodingKey,
    validation: Validation,
    base64_encoded: bool,
    username_claim: String,
    roles_claim: Option<String>,
    fixed_roles: Vec<String>,
}

impl BearerTokenMechanism {
    /// Build the mechanism from configuration.
    ///
    /// Fails fast on an inconsistent configuration or a key that does not
    /// pass the strength gate.
    pub fn from_config(config: &TokenConfig) -> Result<Self, AuthError> {
        config.validate()?;

        let key = VerificationKey::new(config.key.clone())?;
        let algorithm = parse_algorithm(&config.algorithm)?;

        let mut validation = Validation::new(algorithm);
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }
        if config.audience.is_empty() {
            validation.validate_aud = false;
        } else {
            validation.set_audience(&config.audience);
        }

        Ok(Self {
            decoding_key: DecodingKey::from_secret(key.as_bytes()),
            validation,
            base64_encoded: config.base64_encoded,
            username_claim: config.username_claim.clone(),
            roles_claim: config.roles_claim.clone(),
            fixed_roles: config.fixed_roles.clone(),
        })
    }

    fn verify(&self, token: &str) -> Result<Identity, String> {
        let decoded_token;
        let token = if self.base64_encoded {
            let bytes = URL_SAFE
                .decode(token)
                .or_else(|_| URL_SAFE_NO_PAD.decode(token))
                .map_err(|e| format!("token is not valid base64: {e}"))?;
            decoded_token =
                String::from_utf8(bytes).map_err(|_| "token is not valid UTF-8".to_string())?;
            decoded_token.as_str()
        } else {
            token
        };

        let claims = decode::<Value>(token, &self.decoding_key, &self.validation)
            .map_err(|e| e.to_string())?
            .claims;

        let username = value_at(&claims, &self.username_claim)
            .and_then(Value::as_str)
            .ok_or_else(|| format!("claim '{}' missing or not a string", self.username_claim))?
            .to_string();

        let mut roles: Vec<String> = match &self.roles_claim {
            Some(claim) => value_at(&claims, claim)
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(ToString::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            None => Vec::new(),
        };
        roles.extend(self.fixed_roles.iter().cloned());

        Ok(Identity::new(username, roles, claims))
    }
}

#[async_trait]
impl AuthMechanism for BearerTokenMechanism {
    fn name(&self) -> &str {
        "bearerToken"
    }

    async fn authenticate(&self, request: &RequestContext) -> AuthOutcome {
        let Some(token) = request
            .header("authorization")
            .and_then(|h| h.strip_prefix(BEARER_PREFIX))
            .filter(|t| !t.is_empty())
        else {
            return AuthOutcome::NotAttempted;
        };

        match self.verify(token) {
            Ok(identity) => AuthOutcome::Authenticated(identity),
            Err(reason) => AuthOutcome::Rejected(reason),
        }
    }
}

fn parse_algorithm(name: &str) -> Result<Algorithm, AuthError> {
    match name {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        other => Err(AuthError::invalid_config(format!(
            "unsupported token algorithm '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use portcullis_core::Method;
    use serde_json::json;
    use std::time::{SystemTime, UNIX_EPOCH};

    const TEST_KEY: &str = "C0mpl3x@JWT!Key$With@UpperAndLowercase";

    // -------------------------------------------------------------------------
    // Test Helpers
    // -------------------------------------------------------------------------

    fn test_config() -> TokenConfig {
        TokenConfig {
            key: TEST_KEY.to_string(),
            roles_claim: Some("roles".to_string()),
            ..TokenConfig::default()
        }
    }

    fn mint(claims: &Value, key: &str) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(key.as_bytes()),
        )
        .unwrap()
    }

    fn claims_for(sub: &str) -> Value {
        let exp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
            + 3600;
        json!({"sub": sub, "roles": ["user"], "tenant": "acme", "exp": exp})
    }

    fn request_with_token(token: &str) -> RequestContext {
        let mut headers = IndexMap::new();
        headers.insert("Authorization".to_string(), format!("Bearer {token}"));
        RequestContext::with_parts(Method::Get, "/x", headers, IndexMap::new())
    }

    // -------------------------------------------------------------------------
    // Key Strength Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_weak_key_rejected() {
        assert!(matches!(
            VerificationKey::new("simplepassword123").unwrap_err(),
            AuthError::WeakKey { .. }
        ));
    }

    #[test]
    fn test_complex_key_accepted() {
        assert!(VerificationKey::new(TEST_KEY).is_ok());
    }

    #[test]
    fn test_each_policy_rule_enforced() {
        // Long enough but missing one character class each.
        let no_upper = "c0mpl3x@jwt!key$with@all-lowercase!!";
        let no_digit = "Complex@JWT!Key$With@UpperAndLowercase";
        let no_symbol = "C0mpl3xJWTKeyWithUpperAndLowercase123";
        for key in [no_upper, no_digit, no_symbol] {
            assert!(
                matches!(VerificationKey::new(key), Err(AuthError::WeakKey { .. })),
                "key should be rejected: {key}"
            );
        }
    }

    #[test]
    fn test_weak_key_refuses_mechanism_startup() {
        let config = TokenConfig {
            key: "simplepassword123".to_string(),
            ..test_config()
        };
        assert!(matches!(
            BearerTokenMechanism::from_config(&config),
            Err(AuthError::WeakKey { .. })
        ));
    }

    // -------------------------------------------------------------------------
    // Authentication Tests
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_valid_token_authenticates() {
        let mechanism = BearerTokenMechanism::from_config(&test_config()).unwrap();
        let token = mint(&claims_for("alice"), TEST_KEY);

        let outcome = mechanism.authenticate(&request_with_token(&token)).await;
        let AuthOutcome::Authenticated(identity) = outcome else {
            panic!("expected authentication, got {outcome:?}");
        };
        assert_eq!(identity.name(), "alice");
        assert!(identity.has_role("user"));
        assert_eq!(identity.claim_at("tenant"), Some(&json!("acme")));
    }

    #[tokio::test]
    async fn test_bad_signature_rejected() {
        let mechanism = BearerTokenMechanism::from_config(&test_config()).unwrap();
        let token = mint(
            &claims_for("alice"),
            "Another0ne!Different$SigningKey#Here99",
        );

        let outcome = mechanism.authenticate(&request_with_token(&token)).await;
        assert!(matches!(outcome, AuthOutcome::Rejected(_)));
    }

    #[tokio::test]
    async fn test_missing_header_not_attempted() {
        let mechanism = BearerTokenMechanism::from_config(&test_config()).unwrap();
        let ctx = RequestContext::new(Method::Get, "/x");
        assert!(matches!(
            mechanism.authenticate(&ctx).await,
            AuthOutcome::NotAttempted
        ));
    }

    #[tokio::test]
    async fn test_missing_username_claim_rejected() {
        let mechanism = BearerTokenMechanism::from_config(&test_config()).unwrap();
        let exp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
            + 3600;
        let token = mint(&json!({"roles": ["user"], "exp": exp}), TEST_KEY);

        let outcome = mechanism.authenticate(&request_with_token(&token)).await;
        assert!(matches!(outcome, AuthOutcome::Rejected(_)));
    }

    #[tokio::test]
    async fn test_fixed_roles() {
        let config = TokenConfig {
            roles_claim: None,
            fixed_roles: vec!["service".to_string()],
            ..test_config()
        };
        let mechanism = BearerTokenMechanism::from_config(&config).unwrap();
        let token = mint(&claims_for("svc-account"), TEST_KEY);

        let outcome = mechanism.authenticate(&request_with_token(&token)).await;
        let AuthOutcome::Authenticated(identity) = outcome else {
            panic!("expected authentication");
        };
        assert_eq!(identity.roles(), &["service".to_string()]);
    }

    #[tokio::test]
    async fn test_base64_encoded_token() {
        let config = TokenConfig {
            base64_encoded: true,
            ..test_config()
        };
        let mechanism = BearerTokenMechanism::from_config(&config).unwrap();
        let compact = mint(&claims_for("alice"), TEST_KEY);
        let wrapped = URL_SAFE_NO_PAD.encode(compact.as_bytes());

        let outcome = mechanism.authenticate(&request_with_token(&wrapped)).await;
        assert!(matches!(outcome, AuthOutcome::Authenticated(_)));
    }
}
