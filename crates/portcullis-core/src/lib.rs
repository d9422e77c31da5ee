//! # portcullis-core
//!
//! Core types shared by the Portcullis gateway crates.
//!
//! This crate provides:
//! - The per-request [`RequestContext`] and its response-in-progress record
//! - The immutable authenticated [`Identity`] model
//! - Structural [`PathTemplate`] matching with variables and suffix wildcard
//! - The core error taxonomy
//!
//! ## Modules
//!
//! - [`error`] - Core error types
//! - [`identity`] - Authenticated caller model
//! - [`path_template`] - Path template parsing and matching
//! - [`request`] - Request context, methods, permissions and response state

pub mod error;
pub mod identity;
pub mod path_template;
pub mod request;

pub use error::CoreError;
pub use identity::{Identity, UNAUTHENTICATED_ROLE};
pub use path_template::{MatchPolicy, PathMatch, PathTemplate, WILDCARD_VARIABLE};
pub use request::{Method, Permission, RequestContext, RequestPhase, ResponseState};

/// Type alias for results of core operations.
pub type CoreResult<T> = Result<T, CoreError>;
