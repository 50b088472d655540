//! Header sanitization between the client leg and the backend leg.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers in both directions
//! - Strip headers injected by load balancers and CDNs on the inbound leg
//! - Never relay `set-cookie` from the backend
//! - Default the outbound `content-type` to JSON
//!
//! # Design Decisions
//! - The exclusion sets are static data; the filter is one loop
//! - `HeaderMap` names are already lowercase, so matching is case-insensitive
//! - Every value of a retained name is kept in order (duplicates survive)
//! - Both passes are idempotent

use axum::http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};

/// Headers never forwarded from the client to the backend.
pub const REQUEST_EXCLUDED: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "upgrade",
    "host",
    "accept-encoding",
    "content-length",
    "content-encoding",
    "transfer-encoding",
    "x-forwarded-host",
    "x-forwarded-proto",
    "x-forwarded-for",
    "x-forwarded-server",
    "x-original-host",
    "x-real-ip",
    "x-vercel-forwarded-for",
    "x-vercel-id",
    "x-amzn-trace-id",
    "cf-ray",
    "cf-connecting-ip",
];

/// Headers never relayed from the backend to the client.
pub const RESPONSE_EXCLUDED: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "upgrade",
    "content-length",
    "content-encoding",
    "transfer-encoding",
    "set-cookie",
];

const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Direction a header set travels in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client → backend.
    Outbound,
    /// Backend → client.
    Inbound,
}

impl Direction {
    fn excluded(self) -> &'static [&'static str] {
        match self {
            Direction::Outbound => REQUEST_EXCLUDED,
            Direction::Inbound => RESPONSE_EXCLUDED,
        }
    }
}

/// Returns true if `name` may not cross the gateway in `direction`.
pub fn is_excluded(name: &HeaderName, direction: Direction) -> bool {
    let name = name.as_str();
    direction
        .excluded()
        .iter()
        .any(|excluded| excluded.eq_ignore_ascii_case(name))
}

fn filter(headers: &HeaderMap, direction: Direction) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers.iter() {
        if !is_excluded(name, direction) {
            out.append(name.clone(), value.clone());
        }
    }
    out
}

/// Sanitize client headers for the backend leg.
pub fn sanitize_request(headers: &HeaderMap) -> HeaderMap {
    let mut out = filter(headers, Direction::Outbound);
    if !out.contains_key(CONTENT_TYPE) {
        out.insert(CONTENT_TYPE, HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
    }
    out
}

/// Sanitize backend headers for the client leg.
pub fn sanitize_response(headers: &HeaderMap) -> HeaderMap {
    filter(headers, Direction::Inbound)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.append(
                HeaderName::from_bytes(k.as_bytes()).unwrap(),
                HeaderValue::from_str(v).unwrap(),
            );
        }
        map
    }

    #[test]
    fn strips_infrastructure_headers() {
        let inbound = headers(&[
            ("Host", "localhost:3000"),
            ("Connection", "keep-alive"),
            ("X-Forwarded-For", "10.0.0.1"),
            ("CF-Ray", "abc"),
            ("Accept", "application/json"),
            ("X-Custom", "kept"),
        ]);

        let out = sanitize_request(&inbound);
        for name in REQUEST_EXCLUDED {
            assert!(!out.contains_key(*name), "{} leaked", name);
        }
        assert_eq!(out.get("accept").unwrap(), "application/json");
        assert_eq!(out.get("x-custom").unwrap(), "kept");
    }

    #[test]
    fn defaults_content_type_only_when_absent() {
        let out = sanitize_request(&HeaderMap::new());
        assert_eq!(out.get(CONTENT_TYPE).unwrap(), "application/json");

        let out = sanitize_request(&headers(&[("Content-Type", "text/plain")]));
        assert_eq!(out.get_all(CONTENT_TYPE).iter().count(), 1);
        assert_eq!(out.get(CONTENT_TYPE).unwrap(), "text/plain");
    }

    #[test]
    fn response_never_carries_set_cookie() {
        let backend = headers(&[
            ("Set-Cookie", "session=1"),
            ("SET-COOKIE", "other=2"),
            ("Content-Length", "10"),
            ("Content-Type", "application/json"),
            ("ETag", "\"v1\""),
        ]);

        let out = sanitize_response(&backend);
        assert!(!out.contains_key("set-cookie"));
        assert!(!out.contains_key("content-length"));
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn sanitizing_twice_is_a_no_op() {
        let inbound = headers(&[
            ("Host", "example.com"),
            ("Accept", "*/*"),
            ("X-Trace", "1"),
            ("X-Trace", "2"),
        ]);
        let once = sanitize_request(&inbound);
        assert_eq!(sanitize_request(&once), once);

        let backend = headers(&[("Vary", "Origin"), ("Set-Cookie", "a=b"), ("Vary", "Accept")]);
        let once = sanitize_response(&backend);
        assert_eq!(sanitize_response(&once), once);
    }

    #[test]
    fn duplicate_values_survive_in_order() {
        let backend = headers(&[("Vary", "Origin"), ("Vary", "Accept")]);
        let out = sanitize_response(&backend);
        let values: Vec<_> = out.get_all("vary").iter().collect();
        assert_eq!(values, vec!["Origin", "Accept"]);
    }
}
