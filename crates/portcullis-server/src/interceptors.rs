//! Built-in pipeline units that are not services.

use async_trait::async_trait;

use portcullis_core::{MatchPolicy, RequestContext};

use crate::pipeline::{GlobalChecker, HandlerError, PipelineUnit, UnitDescriptor};

/// Logs every accepted request ahead of all other stages.
pub struct RequestLogChecker {
    descriptor: UnitDescriptor,
}

impl RequestLogChecker {
    pub fn new() -> Self {
        Self {
            // Runs before any other checker.
            descriptor: UnitDescriptor::new("requestLog", MatchPolicy::Prefix, "/", -100)
                .expect("literal template"),
        }
    }
}

impl Default for RequestLogChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineUnit for RequestLogChecker {
    fn descriptor(&self) -> &UnitDescriptor {
        &self.descriptor
    }
}

#[async_trait]
impl GlobalChecker for RequestLogChecker {
    async fn check(&self, request: &mut RequestContext) -> Result<(), HandlerError> {
        tracing::debug!(
            method = %request.method(),
            path = %request.path(),
            user = request.identity().map(|i| i.name().to_string()),
            "request received"
        );
        Ok(())
    }
}
