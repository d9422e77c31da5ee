//! The immutable pipeline unit registry.
//!
//! Units are registered once at startup through the builder and shared
//! read-only by every request afterwards. Registration order breaks `order`
//! ties, so checker and interceptor execution is a strict total order.
//! Ambiguous service registrations — two services whose templates accept the
//! same paths under their policies — are a configuration error here, never a
//! request-time guess.

use std::sync::Arc;

use portcullis_core::CoreError;

use super::unit::{GlobalChecker, PipelineUnit, RequestInterceptor, ResponseInterceptor, Service};

/// Startup-built, read-only collection of pipeline units.
pub struct PipelineRegistry {
    checkers: Vec<Arc<dyn GlobalChecker>>,
    request_interceptors: Vec<Arc<dyn RequestInterceptor>>,
    response_interceptors: Vec<Arc<dyn ResponseInterceptor>>,
    services: Vec<Arc<dyn Service>>,
}

impl PipelineRegistry {
    /// Global checkers in execution order.
    pub fn checkers(&self) -> &[Arc<dyn GlobalChecker>] {
        &self.checkers
    }

    /// Request interceptors in execution order.
    pub fn request_interceptors(&self) -> &[Arc<dyn RequestInterceptor>] {
        &self.request_interceptors
    }

    /// Response interceptors in execution order.
    pub fn response_interceptors(&self) -> &[Arc<dyn ResponseInterceptor>] {
        &self.response_interceptors
    }

    /// Registered services.
    pub fn services(&self) -> &[Arc<dyn Service>] {
        &self.services
    }
}

/// Builder assembling the registry before the server starts.
#[derive(Default)]
pub struct PipelineRegistryBuilder {
    checkers: Vec<Arc<dyn GlobalChecker>>,
    request_interceptors: Vec<Arc<dyn RequestInterceptor>>,
    response_interceptors: Vec<Arc<dyn ResponseInterceptor>>,
    services: Vec<Arc<dyn Service>>,
}

impl PipelineRegistryBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a global checker.
    pub fn register_checker(mut self, checker: Arc<dyn GlobalChecker>) -> Self {
        self.checkers.push(checker);
        self
    }

    /// Register a request interceptor.
    pub fn register_request_interceptor(
        mut self,
        interceptor: Arc<dyn RequestInterceptor>,
    ) -> Self {
        self.request_interceptors.push(interceptor);
        self
    }

    /// Register a response interceptor.
    pub fn register_response_interceptor(
        mut self,
        interceptor: Arc<dyn ResponseInterceptor>,
    ) -> Self {
        self.response_interceptors.push(interceptor);
        self
    }

    /// Register a service.
    pub fn register_service(mut self, service: Arc<dyn Service>) -> Self {
        self.services.push(service);
        self
    }

    /// Freeze the registry.
    ///
    /// Sorts checkers and interceptors by ascending order (stable, so
    /// registration order breaks ties) and rejects duplicate unit names and
    /// structurally ambiguous service registrations.
    pub fn build(mut self) -> Result<PipelineRegistry, CoreError> {
        validate_unique_names(
            self.checkers
                .iter()
                .map(|u| u.descriptor().name())
                .chain(self.request_interceptors.iter().map(|u| u.descriptor().name()))
                .chain(self.response_interceptors.iter().map(|u| u.descriptor().name()))
                .chain(self.services.iter().map(|u| u.descriptor().name())),
        )?;

        for (index, service) in self.services.iter().enumerate() {
            for other in &self.services[index + 1..] {
                let a = service.descriptor();
                let b = other.descriptor();
                if a.match_policy() == b.match_policy()
                    && a.path_template().is_equivalent(b.path_template())
                {
                    return Err(CoreError::configuration(format!(
                        "services '{}' and '{}' match the same paths ({})",
                        a.name(),
                        b.name(),
                        a.path_template()
                    )));
                }
            }
        }

        self.checkers.sort_by_key(|u| u.descriptor().order());
        self.request_interceptors.sort_by_key(|u| u.descriptor().order());
        self.response_interceptors.sort_by_key(|u| u.descriptor().order());

        Ok(PipelineRegistry {
            checkers: self.checkers,
            request_interceptors: self.request_interceptors,
            response_interceptors: self.response_interceptors,
            services: self.services,
        })
    }
}

fn validate_unique_names<'a>(names: impl Iterator<Item = &'a str>) -> Result<(), CoreError> {
    let mut seen: Vec<&str> = Vec::new();
    for name in names {
        if seen.contains(&name) {
            return Err(CoreError::configuration(format!(
                "duplicate pipeline unit name '{name}'"
            )));
        }
        seen.push(name);
    }
    Ok(())
}
