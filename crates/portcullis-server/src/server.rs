//! HTTP wiring: one axum funnel into the pipeline executor, and the server
//! builder assembling the immutable engine at startup.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use indexmap::IndexMap;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use portcullis_auth::AclAuthorizer;
use portcullis_core::{Method, RequestContext, ResponseState};

use crate::config::AppConfig;
use crate::interceptors::RequestLogChecker;
use crate::pipeline::{
    GlobalChecker, PipelineExecutor, PipelineRegistryBuilder, RequestInterceptor,
    ResponseInterceptor, Service,
};
use crate::services::{EchoService, PingService};

// =============================================================================
// HTTP Funnel
// =============================================================================

/// Shared handler state: the startup-built executor.
#[derive(Clone)]
pub struct AppState {
    executor: Arc<PipelineExecutor>,
}

/// Build the axum application.
///
/// Every request funnels through one fallback handler — path matching
/// belongs to the pipeline resolver, not to axum routes.
pub fn build_app(executor: Arc<PipelineExecutor>) -> Router {
    Router::new()
        .fallback(gateway_entry)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { executor })
}

async fn gateway_entry(
    State(state): State<AppState>,
    request: axum::extract::Request,
) -> Response {
    let method = match Method::parse(request.method().as_str()) {
        Ok(method) => method,
        Err(error) => {
            tracing::debug!(error = %error, "unsupported method");
            let mut response = ResponseState::default();
            response.complete_with_error(400, "unsupported method");
            return render(&response);
        }
    };

    let path = request.uri().path().to_string();

    let mut headers: IndexMap<String, String> = IndexMap::new();
    for (name, value) in request.headers() {
        if let Ok(value) = value.to_str() {
            headers.insert(name.as_str().to_string(), value.to_string());
        }
    }

    let mut query: IndexMap<String, String> = IndexMap::new();
    if let Some(raw) = request.uri().query() {
        for (name, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            query.insert(name.into_owned(), value.into_owned());
        }
    }

    let mut context = RequestContext::with_parts(method, path, headers, query);
    state.executor.execute(&mut context).await;
    render(context.response())
}

/// Render the pipeline's response record as an HTTP response.
fn render(response: &ResponseState) -> Response {
    let status = response
        .status()
        .and_then(|s| StatusCode::from_u16(s).ok())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut rendered = match response.body() {
        Some(body) => (status, axum::Json(body.clone())).into_response(),
        None => status.into_response(),
    };

    for (name, value) in response.headers() {
        if let (Ok(name), Ok(value)) = (
            axum::http::HeaderName::from_bytes(name.as_bytes()),
            axum::http::HeaderValue::from_str(value),
        ) {
            rendered.headers_mut().insert(name, value);
        }
    }

    rendered
}

// =============================================================================
// Server Builder
// =============================================================================

/// Assembles configuration, pipeline units and the ACL engine into a
/// runnable server.
///
/// All collaborators are constructed here, once, and passed explicitly — no
/// global registries.
pub struct ServerBuilder {
    config: AppConfig,
    units: PipelineRegistryBuilder,
}

impl ServerBuilder {
    /// Start from default configuration and an empty registry.
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
            units: PipelineRegistryBuilder::new(),
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    /// Register the built-in units: request logging, ping and echo.
    pub fn with_default_units(self) -> Self {
        self.register_checker(Arc::new(RequestLogChecker::new()))
            .register_service(Arc::new(PingService::new()))
            .register_service(Arc::new(EchoService::new()))
    }

    /// Register a service.
    pub fn register_service(mut self, service: Arc<dyn Service>) -> Self {
        self.units = self.units.register_service(service);
        self
    }

    /// Register a global checker.
    pub fn register_checker(mut self, checker: Arc<dyn GlobalChecker>) -> Self {
        self.units = self.units.register_checker(checker);
        self
    }

    /// Register a request interceptor.
    pub fn register_request_interceptor(
        mut self,
        interceptor: Arc<dyn RequestInterceptor>,
    ) -> Self {
        self.units = self.units.register_request_interceptor(interceptor);
        self
    }

    /// Register a response interceptor.
    pub fn register_response_interceptor(
        mut self,
        interceptor: Arc<dyn ResponseInterceptor>,
    ) -> Self {
        self.units = self.units.register_response_interceptor(interceptor);
        self
    }

    /// Validate everything and freeze the engine.
    ///
    /// Any configuration problem — weak token key, bad predicate grammar,
    /// ambiguous services — fails here, before the listener opens.
    pub fn build(self) -> anyhow::Result<PortcullisServer> {
        self.config.validate().map_err(anyhow::Error::msg)?;

        let mechanisms = Arc::new(self.config.auth.build_chain()?);
        let authorizer = Arc::new(AclAuthorizer::new(self.config.acl.rules.clone())?);
        let registry = Arc::new(self.units.build()?);

        let executor = Arc::new(PipelineExecutor::new(registry, mechanisms, authorizer));

        tracing::info!(
            instance = executor.instance_id(),
            rules = self.config.acl.rules.len(),
            "gateway engine built"
        );

        Ok(PortcullisServer {
            addr: self.config.addr(),
            app: build_app(executor),
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A built, runnable gateway.
pub struct PortcullisServer {
    addr: SocketAddr,
    app: Router,
}

impl PortcullisServer {
    /// The assembled application, for driving requests in tests.
    pub fn router(&self) -> Router {
        self.app.clone()
    }

    /// Bind and serve until shutdown.
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
