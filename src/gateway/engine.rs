//! Forwarding engine: one inbound call, one backend round trip.
//!
//! # Algorithm
//! ```text
//! resolve endpoint          (MalformedRequest on unsafe paths)
//!   → sanitize request headers, drop inbound Authorization
//!   → attach Bearer token if the store holds a locally valid one
//!   → dispatch once
//!       transport error → FailureClassifier
//!       401             → invalidate session, AuthRequired
//!       204             → empty success
//!       otherwise       → sanitize response headers, relay
//! ```
//!
//! Relaying the logout path also invalidates the session, whatever the
//! backend said. Successful answers on capture paths establish one.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::header::{HeaderValue, AUTHORIZATION};
use axum::http::{HeaderMap, StatusCode};

use crate::config::GatewayConfig;
use crate::gateway::capture::{session_from_auth_response, AuthRoutes};
use crate::gateway::classifier::{FailureClassifier, TransportFailure};
use crate::gateway::types::{ForwardRequest, ForwardResponse, GatewayError};
use crate::observability::metrics;
use crate::routing::{EndpointResolver, ExecutionContext};
use crate::security::headers::{sanitize_request, sanitize_response};
use crate::session::{InvalidationReason, SessionInvalidator, TokenStore};

/// Orchestrates forwarded round trips. Shared by every request task.
#[derive(Debug, Clone)]
pub struct ForwardingEngine {
    client: reqwest::Client,
    resolver: EndpointResolver,
    store: Arc<TokenStore>,
    invalidator: SessionInvalidator,
    classifier: FailureClassifier,
    auth_routes: AuthRoutes,
}

impl ForwardingEngine {
    /// Build an engine for `config`, sharing `invalidator`'s token store.
    pub fn new(config: &GatewayConfig, invalidator: SessionInvalidator) -> Result<Self, GatewayError> {
        let resolver = EndpointResolver::new(&config.backend.base_url, &config.proxy.prefix)
            .map_err(|e| GatewayError::Setup(e.to_string()))?;

        // Redirects are relayed, not followed: one call, one response.
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(config.backend.request_timeout_secs))
            .no_proxy()
            .build()
            .map_err(|e| GatewayError::Setup(format!("HTTP client: {}", e)))?;

        let classifier = FailureClassifier::new(
            client.clone(),
            resolver
                .probe_url(&config.backend.probe_path)
                .map_err(|e| GatewayError::Setup(e.to_string()))?,
            Duration::from_millis(config.backend.probe_timeout_ms),
        );

        Ok(Self {
            client,
            resolver,
            store: invalidator.store().clone(),
            invalidator,
            classifier,
            auth_routes: AuthRoutes::new(&config.session.capture_paths, &config.session.logout_path),
        })
    }

    pub fn resolver(&self) -> &EndpointResolver {
        &self.resolver
    }

    pub fn invalidator(&self) -> &SessionInvalidator {
        &self.invalidator
    }

    /// Forward one request and relay the answer.
    pub async fn forward(&self, request: ForwardRequest) -> Result<ForwardResponse, GatewayError> {
        let start = Instant::now();
        let method = request.method.to_string();
        let is_logout = self.auth_routes.is_logout(&request.path);

        let result = self.round_trip(&request).await;

        if is_logout {
            self.invalidator.invalidate_async(InvalidationReason::Logout).await;
        }

        match &result {
            Ok(response) => metrics::record_request(&method, response.status.as_u16(), "relayed", start),
            Err(e) => metrics::record_request(&method, e.status().as_u16(), e.kind(), start),
        }
        result
    }

    async fn round_trip(&self, request: &ForwardRequest) -> Result<ForwardResponse, GatewayError> {
        // 1. Resolve
        let url = self.resolver.resolve(
            ExecutionContext::Server,
            &request.path,
            request.query.as_deref(),
        )?;

        // 2. Sanitize and authorize
        let headers = self.outbound_headers(&request.headers);

        tracing::debug!(
            method = %request.method,
            url = %url,
            authorized = headers.contains_key(AUTHORIZATION),
            "Forwarding request"
        );

        // 3. Dispatch once
        let mut builder = self
            .client
            .request(request.method.clone(), url.clone())
            .headers(headers);
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => return Err(self.transport_failure(&e, &url).await),
        };

        let status = response.status();
        tracing::debug!(status = %status, url = %url, "Backend responded");

        // 4. Unauthorized
        if status == StatusCode::UNAUTHORIZED {
            self.invalidator
                .invalidate_async(InvalidationReason::Unauthorized)
                .await;
            return Err(GatewayError::AuthRequired {
                redirect_to: self.invalidator.sign_in_path().to_string(),
            });
        }

        let headers = sanitize_response(response.headers());

        // 5. No content
        if status == StatusCode::NO_CONTENT {
            return Ok(ForwardResponse::empty(status, headers));
        }

        // 6. Relay
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => return Err(self.transport_failure(&e, &url).await),
        };

        if status.is_success() && self.auth_routes.is_capture(&request.path) {
            self.capture_session(&body, request.body.as_deref()).await;
        }

        Ok(ForwardResponse {
            status,
            headers,
            body,
        })
    }

    fn outbound_headers(&self, inbound: &HeaderMap) -> HeaderMap {
        let mut headers = sanitize_request(inbound);
        headers.remove(AUTHORIZATION);

        let session = self.store.snapshot();
        match session.token.as_deref() {
            Some(token) if session.is_authenticated() => {
                match HeaderValue::from_str(&format!("Bearer {}", token)) {
                    Ok(value) => {
                        headers.insert(AUTHORIZATION, value);
                    }
                    Err(_) => tracing::warn!("Stored token is not a valid header value; omitting"),
                }
            }
            Some(_) => tracing::debug!("Stored token expired locally; omitting Authorization"),
            None => {}
        }
        headers
    }

    async fn transport_failure(&self, err: &reqwest::Error, url: &url::Url) -> GatewayError {
        let failure = TransportFailure::from_reqwest(err);
        tracing::error!(url = %url, kind = ?failure.kind, error = %failure.message, "Upstream error");
        let classified = self.classifier.classify(failure).await;
        tracing::warn!(kind = classified.kind(), "Transport failure classified");
        classified
    }

    async fn capture_session(&self, response_body: &[u8], request_body: Option<&[u8]>) {
        match session_from_auth_response(response_body, request_body) {
            Ok(session) => {
                let display_name = session.display_name.clone();
                let store = self.store.clone();
                // Persisting writes a file.
                match tokio::task::spawn_blocking(move || store.establish(session)).await {
                    Ok(Ok(())) => tracing::info!(display_name = ?display_name, "Session established"),
                    Ok(Err(e)) => tracing::error!(error = %e, "Failed to persist session"),
                    Err(e) => tracing::error!(error = %e, "Session capture task failed"),
                }
            }
            Err(e) => tracing::warn!(error = %e, "Authentication response carried no usable session"),
        }
    }
}
