//! Service resolution: which single service a request is dispatched to, and
//! which interceptors apply.

use std::sync::Arc;

use thiserror::Error;

use portcullis_core::{MatchPolicy, PathMatch, RequestContext};

use super::registry::PipelineRegistry;
use super::unit::{GlobalChecker, RequestInterceptor, ResponseInterceptor, Service};

/// Failure to pick exactly one service.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Two matching services are equally specific.
    ///
    /// Structurally equivalent templates are rejected at startup; this
    /// covers the residual case of distinct templates tying on one concrete
    /// path. It is answered with a server error, never a silent pick.
    #[error("ambiguous service match: '{first}' and '{second}' are equally specific for {path}")]
    AmbiguousMatch {
        first: String,
        second: String,
        path: String,
    },
}

impl PipelineRegistry {
    /// Find the single most specific service matching the request, with its
    /// path bindings.
    ///
    /// Specificity: more literal segments, then more total segments, then
    /// exact policy over prefix.
    pub fn resolve_service(
        &self,
        request: &RequestContext,
    ) -> Result<Option<(Arc<dyn Service>, PathMatch)>, ResolveError> {
        let mut candidates: Vec<(&Arc<dyn Service>, PathMatch, (usize, usize, u8))> = Vec::new();

        for service in self.services() {
            let descriptor = service.descriptor();
            let Some(path_match) = descriptor.matches(request.path()) else {
                continue;
            };
            if !service.resolves(request) {
                continue;
            }

            let (literals, segments) = descriptor.path_template().specificity();
            let exactness = match descriptor.match_policy() {
                MatchPolicy::Exact => 1,
                MatchPolicy::Prefix => 0,
            };
            candidates.push((service, path_match, (literals, segments, exactness)));
        }

        let Some(best_rank) = candidates.iter().map(|(_, _, rank)| *rank).max() else {
            return Ok(None);
        };

        let mut top = candidates
            .into_iter()
            .filter(|(_, _, rank)| *rank == best_rank);
        let Some((winner, path_match, _)) = top.next() else {
            return Ok(None);
        };

        if let Some((runner_up, _, _)) = top.next() {
            return Err(ResolveError::AmbiguousMatch {
                first: winner.descriptor().name().to_string(),
                second: runner_up.descriptor().name().to_string(),
                path: request.path().to_string(),
            });
        }

        Ok(Some((winner.clone(), path_match)))
    }

    /// Global checkers whose template matches the path and whose
    /// `resolves()` accepts the request, in execution order.
    pub fn matching_checkers(&self, request: &RequestContext) -> Vec<Arc<dyn GlobalChecker>> {
        self.checkers()
            .iter()
            .filter(|c| c.descriptor().matches(request.path()).is_some())
            .filter(|c| c.resolves(request))
            .cloned()
            .collect()
    }

    /// Request interceptors whose template matches the path and whose
    /// `resolves()` accepts the request, in execution order.
    pub fn matching_request_interceptors(
        &self,
        request: &RequestContext,
    ) -> Vec<Arc<dyn RequestInterceptor>> {
        self.request_interceptors()
            .iter()
            .filter(|i| i.descriptor().matches(request.path()).is_some())
            .filter(|i| i.resolves(request))
            .cloned()
            .collect()
    }

    /// Response interceptors whose template matches the path and whose
    /// `resolves()` accepts the request, in execution order.
    pub fn matching_response_interceptors(
        &self,
        request: &RequestContext,
    ) -> Vec<Arc<dyn ResponseInterceptor>> {
        self.response_interceptors()
            .iter()
            .filter(|i| i.descriptor().matches(request.path()).is_some())
            .filter(|i| i.resolves(request))
            .cloned()
            .collect()
    }
}
