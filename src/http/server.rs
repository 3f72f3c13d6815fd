//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Collect route registrations for the handler shapes
//! - Validate configuration before anything is bound
//! - Create the Axum Router with dispatch-wrapped handlers
//! - Wire up middleware (request id, tracing, optional timeout)
//! - Bind the listener, install signal handlers and serve

use std::error::Error as StdError;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{routing::MethodRouter, Router};
use serde::Serialize;
use thiserror::Error;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{validate_config, ConfigError, ServerConfig};
use crate::dispatch::{Classify, Dispatcher, Fault, SqlStateClassifier};
use crate::http::endpoint::Endpoint;
use crate::http::file::FileResponse;
use crate::http::request::{FormRequest, JsonRequest, QueryRequest};
use crate::http::request_id::MakeRequestUuidV4;
use crate::http::response::{Envelope, Redirect};
use crate::lifecycle::signals;

/// Error type for starting and running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to install signal handlers: {0}")]
    Signals(#[source] std::io::Error),

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// JSON-over-HTTP server.
///
/// ```ignore
/// let server = Server::new(ServerConfig::new("0.0.0.0:8080", 3))?
///     .handle("/hi", hello)
///     .handle_get("/search", search);
/// server.listen().await?;
/// ```
pub struct Server {
    config: ServerConfig,
    dispatcher: Dispatcher,
    routes: Vec<(String, Endpoint)>,
}

impl Server {
    /// Validate `config`. A non-positive retry budget is rejected here, before
    /// any connection can be accepted.
    pub fn new(config: ServerConfig) -> Result<Self, ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;
        let dispatcher = Dispatcher::from_config(&config)?;
        Ok(Self {
            config,
            dispatcher,
            routes: Vec::new(),
        })
    }

    /// Decide which otherwise unclassified handler faults are transient.
    pub fn with_classifier(mut self, classifier: impl Classify) -> Self {
        self.dispatcher = self.dispatcher.with_classifier(classifier);
        self
    }

    /// Retry faults whose source chain holds a driver error `E` carrying one
    /// of the configured `dispatch.transient_sqlstates`.
    pub fn with_sqlstate_classifier<E>(self, extract: fn(&E) -> Option<&str>) -> Self
    where
        E: StdError + 'static,
    {
        let codes = self.config.dispatch.transient_sqlstates.clone();
        self.with_classifier(SqlStateClassifier::new(extract).with_codes(codes))
    }

    /// Register an endpoint. Paths use axum syntax; registering the same path
    /// twice panics when the router is built.
    pub fn route(mut self, path: impl Into<String>, endpoint: Endpoint) -> Self {
        self.routes.push((path.into(), endpoint));
        self
    }

    /// JSON body in, envelope out.
    pub fn handle<F, Fut, T>(self, path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(JsonRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Envelope<T>, Fault>> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        self.route(path, Endpoint::json(handler))
    }

    /// JSON body in, file download out.
    pub fn handle_file<F, Fut>(self, path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(JsonRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<FileResponse, Fault>> + Send + 'static,
    {
        self.route(path, Endpoint::json_file(handler))
    }

    /// Multipart form in, envelope out.
    pub fn handle_form<F, Fut, T>(self, path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(FormRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Envelope<T>, Fault>> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        self.route(path, Endpoint::form(handler))
    }

    /// Multipart form in, file download out.
    pub fn handle_form_file<F, Fut>(self, path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(FormRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<FileResponse, Fault>> + Send + 'static,
    {
        self.route(path, Endpoint::form_file(handler))
    }

    /// Query string in, envelope out.
    pub fn handle_get<F, Fut, T>(self, path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(QueryRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Envelope<T>, Fault>> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        self.route(path, Endpoint::query(handler))
    }

    /// Query string in, file download out.
    pub fn handle_get_file<F, Fut>(self, path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(QueryRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<FileResponse, Fault>> + Send + 'static,
    {
        self.route(path, Endpoint::query_file(handler))
    }

    /// Query string in, redirect out.
    pub fn handle_get_redirect<F, Fut>(self, path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(QueryRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Redirect, Fault>> + Send + 'static,
    {
        self.route(path, Endpoint::query_redirect(handler))
    }

    /// Plain axum handler, bypassing the dispatch loop.
    pub fn handle_origin(self, path: impl Into<String>, router: MethodRouter) -> Self {
        self.route(path, Endpoint::raw(router))
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn into_router(self) -> Router {
        let dispatcher = Arc::new(self.dispatcher);

        let mut router = Router::new();
        for (path, endpoint) in self.routes {
            tracing::debug!(path = %path, shape = endpoint.shape(), "Registering route");
            router = router.route(&path, endpoint.into_method_router(dispatcher.clone()));
        }

        if let Some(secs) = self.config.listener.request_timeout_secs {
            router = router.layer(TimeoutLayer::new(Duration::from_secs(secs)));
        }

        router.layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV4))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
    }

    /// Serve on `listener` until `shutdown` resolves.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            max_tries = self.dispatcher.max_tries().get(),
            routes = self.routes.len(),
            "HTTP server starting"
        );

        let app = self
            .into_router()
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Bind the configured address and serve until the process is terminated.
    ///
    /// SIGHUP, SIGINT, SIGTERM and SIGQUIT are logged and end the process with
    /// exit status 5.
    pub async fn listen(self) -> Result<(), ServerError> {
        let address = self.config.listener.socket_address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| ServerError::Bind { address, source })?;

        signals::exit_on_termination().map_err(ServerError::Signals)?;

        self.run(listener, std::future::pending())
            .await
            .map_err(ServerError::Serve)
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .field("routes", &self.routes)
            .finish()
    }
}
