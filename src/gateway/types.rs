//! Request, response, and error types of one forwarded round trip.

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::routing::ResolveError;

/// Errors surfaced to the caller of the forwarding engine.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Rejected locally; never reached the backend.
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// The backend answered 401. The session is already cleared.
    #[error("Authentication required")]
    AuthRequired { redirect_to: String },

    /// The backend is up but this call could not be completed.
    #[error("Network error: Unable to connect to the specific API endpoint. The server appears to be running.")]
    EndpointUnreachable { cause: String },

    /// Neither the call nor the liveness probe reached the backend.
    #[error("Network error: Unable to connect to the server. Please check if the backend is running and accessible.")]
    BackendUnreachable { cause: String },

    /// Something between the caller and the backend refused a cross-origin call.
    #[error("CORS error: Cross-Origin request blocked. Please check backend CORS configuration.")]
    CorsBlocked { cause: String },

    /// A non-empty response body was not the expected JSON.
    #[error("Response body could not be decoded: {0}")]
    DecodeFailure(String),

    /// The gateway itself could not be built from its configuration.
    #[error("Gateway setup failed: {0}")]
    Setup(String),
}

impl GatewayError {
    /// Status returned to the inbound caller.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::AuthRequired { .. } => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Low-level cause, when there is one.
    pub fn details(&self) -> Option<&str> {
        match self {
            GatewayError::EndpointUnreachable { cause }
            | GatewayError::BackendUnreachable { cause }
            | GatewayError::CorsBlocked { cause } => Some(cause),
            GatewayError::MalformedRequest(reason)
            | GatewayError::DecodeFailure(reason)
            | GatewayError::Setup(reason) => Some(reason),
            GatewayError::AuthRequired { .. } => None,
        }
    }

    /// Label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::MalformedRequest(_) => "malformed_request",
            GatewayError::AuthRequired { .. } => "auth_required",
            GatewayError::EndpointUnreachable { .. } => "endpoint_unreachable",
            GatewayError::BackendUnreachable { .. } => "backend_unreachable",
            GatewayError::CorsBlocked { .. } => "cors_blocked",
            GatewayError::DecodeFailure(_) => "decode_failure",
            GatewayError::Setup(_) => "setup",
        }
    }
}

impl From<ResolveError> for GatewayError {
    fn from(e: ResolveError) -> Self {
        GatewayError::MalformedRequest(e.to_string())
    }
}

/// One inbound call, ready to forward.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub method: Method,
    /// Catch-all suffix below the proxy prefix, still percent-encoded.
    pub path: String,
    /// Raw query string without the leading `?`.
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl ForwardRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// The relayed backend answer.
#[derive(Debug, Clone)]
pub struct ForwardResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ForwardResponse {
    /// Successful result with no body.
    pub fn empty(status: StatusCode, headers: HeaderMap) -> Self {
        Self {
            status,
            headers,
            body: Bytes::new(),
        }
    }

    /// Decode the body as JSON.
    ///
    /// `204` and blank bodies are an empty success (`None`); anything else that
    /// does not parse is a `DecodeFailure`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<Option<T>, GatewayError> {
        if self.status == StatusCode::NO_CONTENT || self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice(&self.body)
            .map(Some)
            .map_err(|e| GatewayError::DecodeFailure(e.to_string()))
    }
}
