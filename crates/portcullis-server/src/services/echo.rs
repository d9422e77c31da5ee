//! Request-reflection service, useful for exercising the pipeline.

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use portcullis_core::{MatchPolicy, RequestContext};

use crate::pipeline::{HandlerError, PipelineUnit, Service, UnitDescriptor};

/// Reflects the request under `/echo/**` as JSON: method, path, query,
/// headers and the variables bound by the path match.
pub struct EchoService {
    descriptor: UnitDescriptor,
}

impl EchoService {
    pub fn new() -> Self {
        Self {
            descriptor: UnitDescriptor::new("echo", MatchPolicy::Prefix, "/echo", 0)
                .expect("literal template"),
        }
    }
}

impl Default for EchoService {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineUnit for EchoService {
    fn descriptor(&self) -> &UnitDescriptor {
        &self.descriptor
    }
}

#[async_trait]
impl Service for EchoService {
    async fn handle(&self, request: &mut RequestContext) -> Result<(), HandlerError> {
        let headers: Map<String, Value> = request
            .headers()
            .iter()
            .map(|(name, value)| (name.clone(), Value::String(value.clone())))
            .collect();
        let query: Map<String, Value> = request
            .query()
            .iter()
            .map(|(name, value)| (name.clone(), Value::String(value.clone())))
            .collect();
        let bindings: Map<String, Value> = request
            .match_result()
            .map(|m| {
                m.iter()
                    .map(|(name, value)| (name.to_string(), Value::String(value.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        let body = json!({
            "method": request.method().as_str(),
            "path": request.path(),
            "query": query,
            "headers": headers,
            "bindings": bindings,
            "user": request.identity().map(|i| i.name().to_string()),
        });

        request.response_mut().complete(200, body);
        Ok(())
    }
}
