//! Response handling and transformation.
//!
//! # Responsibilities
//! - Turn a relayed `ForwardResponse` into an axum response
//! - Map `GatewayError` to the caller-facing JSON error body
//!
//! # Error Body
//! ```text
//! { "error": "...", "details": "...", "redirect": "/auth/sign-in" }
//! ```
//! `details` and `redirect` are omitted when absent.

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::gateway::{ForwardResponse, GatewayError};

/// JSON body returned when the gateway itself fails a call.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

impl From<&GatewayError> for ErrorBody {
    fn from(err: &GatewayError) -> Self {
        let error = match err {
            GatewayError::EndpointUnreachable { .. }
            | GatewayError::BackendUnreachable { .. }
            | GatewayError::CorsBlocked { .. } => "Proxy request failed".to_string(),
            other => other.to_string(),
        };
        let details = match err {
            GatewayError::EndpointUnreachable { cause }
            | GatewayError::BackendUnreachable { cause }
            | GatewayError::CorsBlocked { cause } => Some(format!("{} ({})", err, cause)),
            other => other.details().map(str::to_string),
        };
        let redirect = match err {
            GatewayError::AuthRequired { redirect_to } => Some(redirect_to.clone()),
            _ => None,
        };
        Self {
            error,
            details,
            redirect,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status(), Json(ErrorBody::from(&self))).into_response()
    }
}

impl IntoResponse for ForwardResponse {
    fn into_response(self) -> Response {
        let mut response = if self.status == StatusCode::NO_CONTENT {
            Response::new(Body::empty())
        } else {
            Response::new(Body::from(self.body))
        };
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
