//! Pipeline execution: drives one request through the ordered chain.
//!
//! Stage order: global checkers → request interceptors → authentication
//! gate → ACL gate → service → response interceptors. Any pre-service stage
//! may terminate the chain early by completing the response; response
//! interceptors still run afterwards so headers and observability stay
//! consistent, and their own failures are logged and swallowed so they can
//! never mask the original outcome.

use std::sync::Arc;

use uuid::Uuid;

use portcullis_auth::{AclAuthorizer, MechanismChain};
use portcullis_core::{RequestContext, RequestPhase};

use super::registry::PipelineRegistry;

/// Header carrying the gateway instance identifier on every response.
pub const INSTANCE_HEADER: &str = "x-portcullis-instance";

/// Executes the pipeline for each request against startup-built, immutable
/// collaborators.
pub struct PipelineExecutor {
    registry: Arc<PipelineRegistry>,
    mechanisms: Arc<MechanismChain>,
    authorizer: Arc<AclAuthorizer>,
    instance_id: String,
}

impl PipelineExecutor {
    /// Create an executor with a fresh per-process instance identifier.
    pub fn new(
        registry: Arc<PipelineRegistry>,
        mechanisms: Arc<MechanismChain>,
        authorizer: Arc<AclAuthorizer>,
    ) -> Self {
        Self {
            registry,
            mechanisms,
            authorizer,
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// The identifier stamped on every response.
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Drive the request to a completed response.
    pub async fn execute(&self, request: &mut RequestContext) {
        self.run_until_dispatched(request).await;

        // Response interceptors run on every outcome, early terminations and
        // failures included; a secondary failure never masks the original.
        for interceptor in self.registry.matching_response_interceptors(request) {
            if let Err(error) = interceptor.after_dispatch(request).await {
                tracing::warn!(
                    unit = interceptor.descriptor().name(),
                    error = %error,
                    "response interceptor failed"
                );
            }
        }

        request
            .response_mut()
            .set_header(INSTANCE_HEADER, self.instance_id.clone());

        if request.response().status().is_some_and(|s| s < 500) {
            request.advance(RequestPhase::Complete);
        } else {
            request.advance(RequestPhase::Error);
        }
    }

    async fn run_until_dispatched(&self, request: &mut RequestContext) {
        let identity = self.mechanisms.authenticate(request).await;
        request.attach_identity(identity.clone());
        request.advance(RequestPhase::Authenticated);

        let service = match self.registry.resolve_service(request) {
            Ok(Some((service, path_match))) => {
                request.attach_match(path_match);
                request.advance(RequestPhase::Matched);
                service
            }
            Ok(None) => {
                request
                    .response_mut()
                    .complete_with_error(404, "no service matches the request path");
                return;
            }
            Err(error) => {
                tracing::error!(error = %error, "service resolution failed");
                request
                    .response_mut()
                    .complete_with_error(500, "internal server error");
                return;
            }
        };

        for checker in self.registry.matching_checkers(request) {
            if let Err(error) = checker.check(request).await {
                tracing::error!(
                    unit = checker.descriptor().name(),
                    error = %error,
                    "global checker failed"
                );
                request
                    .response_mut()
                    .complete_with_error(500, "internal server error");
                return;
            }
            if request.response().is_complete() {
                tracing::debug!(
                    unit = checker.descriptor().name(),
                    "checker terminated the request"
                );
                return;
            }
        }

        for interceptor in self.registry.matching_request_interceptors(request) {
            if let Err(error) = interceptor.before_dispatch(request).await {
                tracing::error!(
                    unit = interceptor.descriptor().name(),
                    error = %error,
                    "request interceptor failed"
                );
                request
                    .response_mut()
                    .complete_with_error(500, "internal server error");
                return;
            }
            if request.response().is_complete() {
                tracing::debug!(
                    unit = interceptor.descriptor().name(),
                    "request interceptor terminated the request"
                );
                return;
            }
        }

        if identity.is_anonymous() && self.authorizer.is_authentication_required(request) {
            request
                .response_mut()
                .complete_with_error(401, "authentication required");
            return;
        }

        match self.authorizer.is_allowed(request, &identity) {
            Ok(true) => request.advance(RequestPhase::Authorized),
            Ok(false) => {
                request
                    .response_mut()
                    .complete_with_error(403, "access denied");
                return;
            }
            Err(error) => {
                // Attribute-resolution failures are misconfigured rules, not
                // legitimate denies; they surface as server errors.
                tracing::error!(error = %error, "ACL evaluation failed");
                request
                    .response_mut()
                    .complete_with_error(500, "internal server error");
                return;
            }
        }

        if let Err(error) = service.handle(request).await {
            tracing::error!(
                unit = service.descriptor().name(),
                error = %error,
                "service handler failed"
            );
            request
                .response_mut()
                .complete_with_error(500, "internal server error");
            return;
        }
        request.advance(RequestPhase::Dispatched);

        if !request.response().is_complete() {
            // A service that set nothing still yields a well-formed outcome.
            request.response_mut().set_status(200);
        }
    }
}
