//! Authentication and mechanism configuration errors.

use thiserror::Error;

/// Errors raised while configuring or running authentication mechanisms.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The token verification key fails the strength policy.
    ///
    /// This is fatal at configuration time: a mechanism with a weak key
    /// refuses to start.
    #[error("Weak token verification key: {reason}")]
    WeakKey {
        /// Which part of the policy the key violates.
        reason: String,
    },

    /// A mechanism's configuration is inconsistent.
    #[error("Invalid mechanism configuration: {message}")]
    InvalidConfig {
        /// Description of the inconsistency.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `WeakKey` error.
    #[must_use]
    pub fn weak_key(reason: impl Into<String>) -> Self {
        Self::WeakKey {
            reason: reason.into(),
        }
    }

    /// Creates a new `InvalidConfig` error.
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Returns `true` if this error must abort startup.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::WeakKey { .. } | Self::InvalidConfig { .. })
    }
}
