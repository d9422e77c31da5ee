//! # portcullis-auth
//!
//! Authentication and authorization for the Portcullis gateway.
//!
//! This crate provides:
//! - Pluggable authentication mechanisms tried in order per request
//! - A bearer token mechanism with a key-strength configuration gate
//! - A static realm for configuration-defined users
//! - The ACL engine: predicate interpolation, a hand-written predicate
//!   grammar, and priority-ordered rule evaluation with default deny
//!
//! ## Modules
//!
//! - [`config`] - Authentication configuration and mechanism wiring
//! - [`error`] - Authentication error types
//! - [`mechanism`] - Mechanism trait, chain and built-in strategies
//! - [`acl`] - Access-control rules and the predicate engine

pub mod acl;
pub mod config;
pub mod error;
pub mod mechanism;

pub use acl::{AclAuthorizer, AclError, AclRule, Predicate, PredicateSyntaxError};
pub use config::{AuthConfig, StaticUserConfig, TokenConfig};
pub use error::AuthError;
pub use mechanism::{
    AuthMechanism, AuthOutcome, BearerTokenMechanism, MechanismChain, StaticRealmMechanism,
    VerificationKey,
};

/// Type alias for authentication results.
pub type AuthResult<T> = Result<T, AuthError>;
