//! Liveness service.

use async_trait::async_trait;
use serde_json::json;

use portcullis_core::{MatchPolicy, RequestContext};

use crate::pipeline::{HandlerError, PipelineUnit, Service, UnitDescriptor};

/// Answers `GET /ping` with a liveness message.
pub struct PingService {
    descriptor: UnitDescriptor,
}

impl PingService {
    pub fn new() -> Self {
        Self {
            descriptor: UnitDescriptor::new("ping", MatchPolicy::Exact, "/ping", 0)
                .expect("literal template"),
        }
    }
}

impl Default for PingService {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineUnit for PingService {
    fn descriptor(&self) -> &UnitDescriptor {
        &self.descriptor
    }
}

#[async_trait]
impl Service for PingService {
    async fn handle(&self, request: &mut RequestContext) -> Result<(), HandlerError> {
        request.response_mut().complete(200, json!({"message": "pong"}));
        Ok(())
    }
}
