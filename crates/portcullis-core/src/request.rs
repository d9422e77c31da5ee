//! Per-request context and response-in-progress record.
//!
//! One [`RequestContext`] is created at request entry, owned by the worker
//! serving that request and dropped at completion; it is never shared across
//! concurrent requests. The pipeline executor and its stages communicate
//! through it: authentication attaches the identity, the resolver attaches
//! the path match, and every stage may complete the response to terminate
//! the chain early.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::identity::Identity;
use crate::path_template::PathMatch;

// =============================================================================
// Method and Permission
// =============================================================================

/// HTTP request methods understood by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Head,
    Options,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Parse from the wire representation.
    pub fn parse(method: &str) -> Result<Self, CoreError> {
        match method.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            other => Err(CoreError::invalid_method(other)),
        }
    }

    /// The wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// `true` for methods that do not modify the backing store.
    pub fn is_read(&self) -> bool {
        matches!(self, Self::Get | Self::Head | Self::Options)
    }

    /// The permission an ACL rule must grant for this method.
    pub fn required_permission(&self) -> Permission {
        if self.is_read() {
            Permission::Read
        } else {
            Permission::Write
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Permission granted by an ACL rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// Allows read-class methods (GET, HEAD, OPTIONS).
    Read,
    /// Allows write-class methods (POST, PUT, PATCH, DELETE).
    Write,
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
        }
    }
}

// =============================================================================
// Request Phase
// =============================================================================

/// Lifecycle milestone of a request inside the pipeline, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Received,
    Authenticated,
    Matched,
    Authorized,
    Dispatched,
    Complete,
    Error,
}

impl RequestPhase {
    /// `true` once the request can make no further progress.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

impl std::fmt::Display for RequestPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Authenticated => "authenticated",
            Self::Matched => "matched",
            Self::Authorized => "authorized",
            Self::Dispatched => "dispatched",
            Self::Complete => "complete",
            Self::Error => "error",
        };
        write!(f, "{name}")
    }
}

// =============================================================================
// Response State
// =============================================================================

/// The response under construction for one request.
///
/// A stage completes the response by setting a status; the executor treats a
/// completed response as a request to skip all remaining pre-service stages.
#[derive(Debug, Clone, Default)]
pub struct ResponseState {
    status: Option<u16>,
    headers: Vec<(String, String)>,
    body: Option<Value>,
}

impl ResponseState {
    /// `true` once a status has been set.
    pub fn is_complete(&self) -> bool {
        self.status.is_some()
    }

    /// The status code, if set.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Set the status code, completing the response.
    pub fn set_status(&mut self, status: u16) {
        self.status = Some(status);
    }

    /// Append a header without replacing existing values.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push((name.into().to_ascii_lowercase(), value.into()));
    }

    /// Set a header, replacing any previous value.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        let lowered = name.to_ascii_lowercase();
        self.headers.retain(|(n, _)| n != &lowered);
        self.headers.push((lowered, value.into()));
    }

    /// First value of a header, if present.
    pub fn header(&self, name: &str) -> Option<&str> {
        let lowered = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(n, _)| n == &lowered)
            .map(|(_, v)| v.as_str())
    }

    /// All headers in insertion order.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// The JSON body, if any.
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Set the JSON body.
    pub fn set_body(&mut self, body: Value) {
        self.body = Some(body);
    }

    /// Complete the response with a status and JSON body.
    pub fn complete(&mut self, status: u16, body: Value) {
        self.status = Some(status);
        self.body = Some(body);
    }

    /// Complete the response with a structured error body.
    ///
    /// The body carries the status and a caller-safe message only; internal
    /// details belong in the log, never here.
    pub fn complete_with_error(&mut self, status: u16, message: &str) {
        self.complete(
            status,
            serde_json::json!({
                "status": status,
                "message": message,
            }),
        );
    }
}

// =============================================================================
// Request Context
// =============================================================================

/// Strongly-typed per-request record passed through the pipeline.
#[derive(Debug)]
pub struct RequestContext {
    method: Method,
    path: String,
    headers: IndexMap<String, String>,
    query: IndexMap<String, String>,
    identity: Option<Arc<Identity>>,
    match_result: Option<PathMatch>,
    phase: RequestPhase,
    response: ResponseState,
}

impl RequestContext {
    /// Create a context for a bare method + path (headers and query empty).
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self::with_parts(method, path, IndexMap::new(), IndexMap::new())
    }

    /// Create a context from full request parts.
    ///
    /// Header names are lowercased; lookups are case-insensitive.
    pub fn with_parts(
        method: Method,
        path: impl Into<String>,
        headers: IndexMap<String, String>,
        query: IndexMap<String, String>,
    ) -> Self {
        let headers = headers
            .into_iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value))
            .collect();

        Self {
            method,
            path: path.into(),
            headers,
            query,
            identity: None,
            match_result: None,
            phase: RequestPhase::Received,
            response: ResponseState::default(),
        }
    }

    /// The request method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// The request path (no query string).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// All request headers (names lowercased), in arrival order.
    pub fn headers(&self) -> &IndexMap<String, String> {
        &self.headers
    }

    /// Query parameter lookup.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// All query parameters in arrival order.
    pub fn query(&self) -> &IndexMap<String, String> {
        &self.query
    }

    /// The authenticated identity, once authentication has run.
    pub fn identity(&self) -> Option<&Arc<Identity>> {
        self.identity.as_ref()
    }

    /// Attach the identity produced by authentication.
    ///
    /// The identity is immutable from here on; later stages only read it.
    pub fn attach_identity(&mut self, identity: Arc<Identity>) {
        self.identity = Some(identity);
    }

    /// Template variables bound by the pipeline resolver's path match.
    pub fn match_result(&self) -> Option<&PathMatch> {
        self.match_result.as_ref()
    }

    /// Attach the resolver's path match.
    pub fn attach_match(&mut self, path_match: PathMatch) {
        self.match_result = Some(path_match);
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> RequestPhase {
        self.phase
    }

    /// Advance to a new lifecycle phase.
    pub fn advance(&mut self, phase: RequestPhase) {
        tracing::trace!(from = %self.phase, to = %phase, path = %self.path, "request phase");
        self.phase = phase;
    }

    /// The response under construction.
    pub fn response(&self) -> &ResponseState {
        &self.response
    }

    /// Mutable access to the response under construction.
    pub fn response_mut(&mut self) -> &mut ResponseState {
        &mut self.response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Method Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_method_parse_case_insensitive() {
        assert_eq!(Method::parse("get").unwrap(), Method::Get);
        assert_eq!(Method::parse("DELETE").unwrap(), Method::Delete);
        assert!(Method::parse("FETCH").is_err());
    }

    #[test]
    fn test_method_permission_mapping() {
        assert_eq!(Method::Get.required_permission(), Permission::Read);
        assert_eq!(Method::Head.required_permission(), Permission::Read);
        assert_eq!(Method::Options.required_permission(), Permission::Read);
        assert_eq!(Method::Post.required_permission(), Permission::Write);
        assert_eq!(Method::Delete.required_permission(), Permission::Write);
    }

    // -------------------------------------------------------------------------
    // Response State Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_response_completion() {
        let mut response = ResponseState::default();
        assert!(!response.is_complete());
        response.complete(200, serde_json::json!({"ok": true}));
        assert!(response.is_complete());
        assert_eq!(response.status(), Some(200));
    }

    #[test]
    fn test_response_error_body_is_structured() {
        let mut response = ResponseState::default();
        response.complete_with_error(403, "forbidden");
        let body = response.body().unwrap();
        assert_eq!(body["status"], 403);
        assert_eq!(body["message"], "forbidden");
    }

    #[test]
    fn test_set_header_replaces() {
        let mut response = ResponseState::default();
        response.add_header("X-Test", "a");
        response.set_header("x-test", "b");
        assert_eq!(response.header("X-TEST"), Some("b"));
        assert_eq!(response.headers().len(), 1);
    }

    // -------------------------------------------------------------------------
    // Request Context Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_header_lookup_case_insensitive() {
        let mut headers = IndexMap::new();
        headers.insert("Authorization".to_string(), "Bearer abc".to_string());
        let ctx = RequestContext::with_parts(Method::Get, "/x", headers, IndexMap::new());
        assert_eq!(ctx.header("authorization"), Some("Bearer abc"));
        assert_eq!(ctx.header("AUTHORIZATION"), Some("Bearer abc"));
    }

    #[test]
    fn test_identity_attachment() {
        let mut ctx = RequestContext::new(Method::Get, "/x");
        assert!(ctx.identity().is_none());
        ctx.attach_identity(Arc::new(Identity::anonymous()));
        assert!(ctx.identity().is_some_and(|i| i.is_anonymous()));
    }

    #[test]
    fn test_phase_progression() {
        let mut ctx = RequestContext::new(Method::Get, "/x");
        assert_eq!(ctx.phase(), RequestPhase::Received);
        assert!(!ctx.phase().is_terminal());
        ctx.advance(RequestPhase::Complete);
        assert!(ctx.phase().is_terminal());
    }
}
