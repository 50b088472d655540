//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) as early as possible
//! - Turn an inbound axum request into a `ForwardRequest`
//!
//! # Design Decisions
//! - An ID supplied by the caller is kept; otherwise one is generated
//! - The catch-all suffix is taken from the raw URI, still percent-encoded,
//!   so the backend sees exactly what the caller sent
//! - GET and HEAD never carry a body

use axum::body::{to_bytes, Body};
use axum::http::{HeaderName, HeaderValue, Method, Request};
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use uuid::Uuid;

use crate::gateway::{ForwardRequest, GatewayError};

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Generates UUID v4 request IDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuidV4;

impl MakeRequestId for MakeRequestUuidV4 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Layer that stamps inbound requests with an ID.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuidV4> {
    SetRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID), MakeRequestUuidV4)
}

/// Layer that copies the ID onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID))
}

/// Read the request ID stamped by the layer, for log correlation.
pub fn request_id<B>(request: &Request<B>) -> String {
    request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Build a `ForwardRequest` from an inbound request below `prefix`.
pub async fn into_forward_request(
    request: Request<Body>,
    prefix: &str,
    max_body_size: usize,
) -> Result<ForwardRequest, GatewayError> {
    let (parts, body) = request.into_parts();

    let path = parts
        .uri
        .path()
        .strip_prefix(prefix)
        .ok_or_else(|| GatewayError::MalformedRequest(format!("path outside {}", prefix)))?
        .to_string();
    if !path.is_empty() && !path.starts_with('/') {
        // `/api/proxyfoo` is not below `/api/proxy`.
        return Err(GatewayError::MalformedRequest(format!("path outside {}", prefix)));
    }

    let body = if parts.method == Method::GET || parts.method == Method::HEAD {
        None
    } else {
        let bytes = to_bytes(body, max_body_size)
            .await
            .map_err(|e| GatewayError::MalformedRequest(format!("unreadable body: {}", e)))?;
        (!bytes.is_empty()).then_some(bytes)
    };

    Ok(ForwardRequest {
        method: parts.method,
        path,
        query: parts.uri.query().map(str::to_string),
        headers: parts.headers,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn strips_prefix_and_keeps_raw_query() {
        let request = Request::builder()
            .method("POST")
            .uri("http://localhost/api/proxy/api/tasks/?q=a%20b")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"title":"x"}"#))
            .unwrap();

        let forward = into_forward_request(request, "/api/proxy", 1024).await.unwrap();
        assert_eq!(forward.method, Method::POST);
        assert_eq!(forward.path, "/api/tasks/");
        assert_eq!(forward.query.as_deref(), Some("q=a%20b"));
        assert_eq!(forward.body.as_deref(), Some(&br#"{"title":"x"}"#[..]));
    }

    #[tokio::test]
    async fn get_never_carries_body() {
        let request = Request::builder()
            .uri("/api/proxy/api/tasks")
            .body(Body::from("ignored"))
            .unwrap();
        let forward = into_forward_request(request, "/api/proxy", 1024).await.unwrap();
        assert!(forward.body.is_none());
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let request = Request::builder()
            .method("PUT")
            .uri("/api/proxy/api/tasks/1")
            .body(Body::from(vec![b'a'; 64]))
            .unwrap();
        let err = into_forward_request(request, "/api/proxy", 16).await.unwrap_err();
        assert!(matches!(err, GatewayError::MalformedRequest(_)));
    }

    #[tokio::test]
    async fn sibling_prefix_is_rejected() {
        let request = Request::builder()
            .uri("/api/proxyfoo/x")
            .body(Body::empty())
            .unwrap();
        assert!(into_forward_request(request, "/api/proxy", 16).await.is_err());
    }

    #[test]
    fn generated_ids_are_uuids() {
        let request = Request::builder().body(()).unwrap();
        let id = MakeRequestUuidV4.make_request_id(&request).unwrap();
        let text = id.header_value().to_str().unwrap();
        assert!(Uuid::parse_str(text).is_ok());
    }
}
