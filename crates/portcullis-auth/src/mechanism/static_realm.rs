//! Basic authentication against users declared in configuration.
//!
//! Intended for small deployments and development: each configured user has
//! a password, roles and a free-form properties document. The properties
//! become the identity payload, which is what `@user.*` tokens in ACL
//! predicates resolve against.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;
use subtle::ConstantTimeEq;

use portcullis_core::{Identity, RequestContext};

use crate::config::StaticUserConfig;
use crate::error::AuthError;

use super::{AuthMechanism, AuthOutcome};

/// Header prefix marking Basic credentials.
const BASIC_PREFIX: &str = "Basic ";

/// Authentication against a fixed, configuration-defined user realm.
pub struct StaticRealmMechanism {
    users: Vec<StaticUserConfig>,
}

impl StaticRealmMechanism {
    /// Build the realm, rejecting duplicate usernames.
    pub fn new(users: Vec<StaticUserConfig>) -> Result<Self, AuthError> {
        for (index, user) in users.iter().enumerate() {
            if user.username.is_empty() {
                return Err(AuthError::invalid_config("user with empty username"));
            }
            if users[..index].iter().any(|u| u.username == user.username) {
                return Err(AuthError::invalid_config(format!(
                    "duplicate user '{}'",
                    user.username
                )));
            }
        }

        Ok(Self { users })
    }

    fn check(&self, username: &str, password: &str) -> Option<Identity> {
        let user = self.users.iter().find(|u| u.username == username)?;

        let presented = password.as_bytes();
        let expected = user.password.as_bytes();
        let matches = presented.len() == expected.len()
            && bool::from(presented.ct_eq(expected));
        if !matches {
            return None;
        }

        let claims = match &user.properties {
            Value::Object(_) => user.properties.clone(),
            // A non-document properties value degrades to an empty payload.
            _ => Value::Object(serde_json::Map::new()),
        };

        Some(Identity::new(
            user.username.clone(),
            user.roles.clone(),
            claims,
        ))
    }
}

#[async_trait]
impl AuthMechanism for StaticRealmMechanism {
    fn name(&self) -> &str {
        "staticRealm"
    }

    async fn authenticate(&self, request: &RequestContext) -> AuthOutcome {
        let Some(encoded) = request
            .header("authorization")
            .and_then(|h| h.strip_prefix(BASIC_PREFIX))
            .filter(|c| !c.is_empty())
        else {
            return AuthOutcome::NotAttempted;
        };

        let Ok(decoded) = STANDARD.decode(encoded) else {
            return AuthOutcome::Rejected("credentials are not valid base64".to_string());
        };
        let Ok(pair) = String::from_utf8(decoded) else {
            return AuthOutcome::Rejected("credentials are not valid UTF-8".to_string());
        };
        let Some((username, password)) = pair.split_once(':') else {
            return AuthOutcome::Rejected("malformed Basic credentials".to_string());
        };

        match self.check(username, password) {
            Some(identity) => AuthOutcome::Authenticated(identity),
            None => AuthOutcome::Rejected(format!("invalid credentials for '{username}'")),
        }
    }
}
