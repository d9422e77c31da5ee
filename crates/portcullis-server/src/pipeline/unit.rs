//! Pipeline unit capability traits.
//!
//! Every unit — service, interceptor or checker — carries a
//! [`UnitDescriptor`] naming it and declaring where and in what order it
//! runs, plus a dynamic [`PipelineUnit::resolves`] applicability check that
//! is independent of the path match (e.g. "only if content-type is X").
//!
//! This is the extension point: collaborating subsystems (store services,
//! GraphQL, ...) implement one of the capability traits and register the
//! unit at startup.

use async_trait::async_trait;
use thiserror::Error;

use portcullis_core::{CoreError, MatchPolicy, PathMatch, PathTemplate, RequestContext};

// =============================================================================
// Handler Errors
// =============================================================================

/// Failure inside a unit's handling entry point.
///
/// Caught at the executor boundary and converted to a 500-class outcome;
/// the message goes to the log, never to the response body.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Message(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HandlerError {
    /// Create an error from a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

// =============================================================================
// Unit Descriptor
// =============================================================================

/// Registration metadata shared by all unit kinds.
#[derive(Debug, Clone)]
pub struct UnitDescriptor {
    name: String,
    match_policy: MatchPolicy,
    path_template: PathTemplate,
    order: i32,
}

impl UnitDescriptor {
    /// Create a descriptor, parsing the path template.
    pub fn new(
        name: impl Into<String>,
        match_policy: MatchPolicy,
        path_template: &str,
        order: i32,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            name: name.into(),
            match_policy,
            path_template: PathTemplate::parse(path_template)?,
            order,
        })
    }

    /// Unit name; unique within the registry.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// How the path template is matched.
    pub fn match_policy(&self) -> MatchPolicy {
        self.match_policy
    }

    /// The unit's path template.
    pub fn path_template(&self) -> &PathTemplate {
        &self.path_template
    }

    /// Execution order; interceptors and checkers run ascending.
    pub fn order(&self) -> i32 {
        self.order
    }

    /// Match the request path under this unit's policy.
    pub fn matches(&self, path: &str) -> Option<PathMatch> {
        self.path_template.matches_with_policy(self.match_policy, path)
    }
}

// =============================================================================
// Capability Traits
// =============================================================================

/// Common surface of every pipeline unit.
pub trait PipelineUnit: Send + Sync {
    /// The unit's registration metadata.
    fn descriptor(&self) -> &UnitDescriptor;

    /// Dynamic applicability, independent of the path match.
    fn resolves(&self, _request: &RequestContext) -> bool {
        true
    }
}

/// The target handler a request is dispatched to; exactly one runs per
/// request.
#[async_trait]
pub trait Service: PipelineUnit {
    /// Handle the request, completing its response.
    async fn handle(&self, request: &mut RequestContext) -> Result<(), HandlerError>;
}

/// Runs before the service; may mutate the request or terminate the chain by
/// completing the response.
#[async_trait]
pub trait RequestInterceptor: PipelineUnit {
    /// Intercept before dispatch.
    async fn before_dispatch(&self, request: &mut RequestContext) -> Result<(), HandlerError>;
}

/// Runs after the service — including after an early termination — so
/// headers and observability stay consistent on every outcome.
#[async_trait]
pub trait ResponseInterceptor: PipelineUnit {
    /// Intercept after dispatch.
    async fn after_dispatch(&self, request: &mut RequestContext) -> Result<(), HandlerError>;
}

/// Runs first, for every request, ahead of any interceptor.
#[async_trait]
pub trait GlobalChecker: PipelineUnit {
    /// Vet the request; terminate the chain by completing the response.
    async fn check(&self, request: &mut RequestContext) -> Result<(), HandlerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_parses_template() {
        let d = UnitDescriptor::new("ping", MatchPolicy::Exact, "/ping", 0).unwrap();
        assert_eq!(d.name(), "ping");
        assert!(d.matches("/ping").is_some());
        assert!(d.matches("/ping/x").is_none());
    }

    #[test]
    fn test_descriptor_prefix_policy() {
        let d = UnitDescriptor::new("echo", MatchPolicy::Prefix, "/echo", 0).unwrap();
        assert!(d.matches("/echo/a/b").is_some());
    }

    #[test]
    fn test_descriptor_rejects_bad_template() {
        assert!(UnitDescriptor::new("bad", MatchPolicy::Exact, "no-slash", 0).is_err());
    }
}
