//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the axum Router: proxy surface plus local session endpoints
//! - Wire up middleware (request ID, tracing, timeout, body limit)
//! - Start background session tasks (freshness monitor, store watcher)
//! - Bind to the listener and shut down gracefully

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::GatewayConfig;
use crate::gateway::{ForwardingEngine, GatewayError};
use crate::http::request::{
    into_forward_request, propagate_request_id_layer, request_id, set_request_id_layer,
};
use crate::lifecycle::startup::build_session;
use crate::session::{
    watcher, FreshnessMonitor, InvalidationReason, SessionInvalidator, StoreWatcher, TokenStore,
};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ForwardingEngine>,
    pub store: Arc<TokenStore>,
    pub invalidator: SessionInvalidator,
    pub prefix: String,
    pub max_body_size: usize,
}

/// Session summary returned by `GET /session`.
#[derive(Debug, Serialize)]
pub struct SessionStatus {
    pub authenticated: bool,
    pub display_name: Option<String>,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    store: Arc<TokenStore>,
    invalidator: SessionInvalidator,
}

impl HttpServer {
    /// Create a server with the session store described by the configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let (_, invalidator) = build_session(&config.session);
        Self::with_session(config, invalidator)
    }

    /// Create a server around an existing session.
    pub fn with_session(
        config: GatewayConfig,
        invalidator: SessionInvalidator,
    ) -> Result<Self, GatewayError> {
        let engine = Arc::new(ForwardingEngine::new(&config, invalidator.clone())?);
        let store = invalidator.store().clone();

        let state = AppState {
            engine,
            store: store.clone(),
            invalidator: invalidator.clone(),
            prefix: config.proxy.prefix.clone(),
            max_body_size: config.proxy.max_body_size,
        };

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config,
            store,
            invalidator,
        })
    }

    /// Build the axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let prefix = config.proxy.prefix.clone();
        // Leave room for the diagnostic probe after a backend timeout.
        let deadline = Duration::from_secs(config.backend.request_timeout_secs)
            + Duration::from_millis(config.backend.probe_timeout_ms)
            + Duration::from_secs(1);

        Router::new()
            .route(&format!("{}/{{*path}}", prefix), any(proxy_handler))
            .route(&format!("{}/", prefix), any(proxy_handler))
            .route(&prefix, any(proxy_handler))
            .route("/session", get(session_status).delete(logout))
            .with_state(state)
            // Innermost: `Timeout` needs a defaultable response body, which the
            // limit layer's body is not.
            .layer(RequestBodyLimitLayer::new(config.proxy.max_body_size))
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id_layer())
                    .layer(TraceLayer::new_for_http())
                    .layer(propagate_request_id_layer())
                    .layer(TimeoutLayer::new(deadline)),
            )
    }

    /// Run the server on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            backend = %self.config.backend.base_url,
            prefix = %self.config.proxy.prefix,
            "HTTP server starting"
        );

        if self.config.session.freshness_interval_secs > 0 {
            let monitor = FreshnessMonitor::new(
                self.invalidator.clone(),
                Duration::from_secs(self.config.session.freshness_interval_secs),
            );
            tokio::spawn(monitor.run(shutdown.resubscribe()));
        }

        // Dropping the handle stops the watch, so it lives as long as `run`.
        let _store_watch = match self.store.persisted_path() {
            Some(path) if self.config.session.watch_store => {
                let (store_watcher, changes) = StoreWatcher::new(path);
                match store_watcher.run() {
                    Ok(handle) => {
                        tokio::spawn(watcher::follow_changes(
                            self.store.clone(),
                            self.invalidator.clone(),
                            changes,
                        ));
                        Some(handle)
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Session store watcher unavailable");
                        None
                    }
                }
            }
            _ => None,
        };

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// The session store this server forwards with.
    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }
}

/// Forward any method below the proxy prefix.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let request_id = request_id(&request);
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        "Proxying request"
    );

    let forward = match into_forward_request(request, &state.prefix, state.max_body_size).await {
        Ok(forward) => forward,
        Err(e) => {
            tracing::warn!(request_id = %request_id, path = %path, error = %e, "Rejected request");
            return e.into_response();
        }
    };

    match state.engine.forward(forward).await {
        Ok(response) => {
            tracing::info!(
                request_id = %request_id,
                method = %method,
                path = %path,
                status = %response.status,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Relayed response"
            );
            response.into_response()
        }
        Err(e) => {
            tracing::warn!(
                request_id = %request_id,
                method = %method,
                path = %path,
                kind = e.kind(),
                error = %e,
                "Forward failed"
            );
            e.into_response()
        }
    }
}

async fn session_status(State(state): State<AppState>) -> Json<SessionStatus> {
    let session = state.store.snapshot();
    Json(SessionStatus {
        authenticated: session.is_authenticated(),
        display_name: session.display_name.clone(),
    })
}

async fn logout(State(state): State<AppState>) -> StatusCode {
    state
        .invalidator
        .invalidate_async(InvalidationReason::Logout)
        .await;
    StatusCode::NO_CONTENT
}
