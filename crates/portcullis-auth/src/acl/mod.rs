//! Access-control engine: predicate interpolation, parsing and rule
//! evaluation.
//!
//! A request is allowed when some [`AclRule`] applicable to the caller's
//! roles and the request's permission has a predicate that evaluates `true`
//! against the request snapshot. Rule predicates are textual configuration
//! (see [`predicate`] for the grammar) and may reference identity attributes
//! through [`interpolate`] tokens such as `@user.tenant`.

pub mod authorizer;
pub mod interpolate;
pub mod predicate;

pub use authorizer::{AclAuthorizer, AclError, AclRule};
pub use interpolate::{DEFAULT_IDENTITY_PREFIX, InterpolationError, interpolate};
pub use predicate::{Predicate, PredicateSyntaxError, ValueRef};
