//! Untrusted bearer-token claim decoding and local expiry judgement.
//!
//! The token's middle segment is base64url JSON. Nothing here checks a
//! signature or issuer: the backend stays the authority for every call, and
//! this judge only decides whether a token is worth attaching at all.
//!
//! Any decode problem makes the token invalid (fail-closed).

use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors produced while decoding a token's claims.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClaimsError {
    #[error("token must have 3 dot-separated segments, found {0}")]
    Segments(usize),

    #[error("claims segment is not base64: {0}")]
    Base64(String),

    #[error("claims segment is not a JSON object with an integer 'exp': {0}")]
    Json(String),
}

/// Claims read from a token. Only `exp` is interpreted.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TokenClaims {
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,

    #[serde(default)]
    pub sub: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Decode the claims segment of `token`.
pub fn decode_claims(token: &str) -> Result<TokenClaims, ClaimsError> {
    let segments: Vec<&str> = token.trim().split('.').collect();
    if segments.len() != 3 {
        return Err(ClaimsError::Segments(segments.len()));
    }

    let payload = segments[1].trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| STANDARD_NO_PAD.decode(payload))
        .map_err(|e| ClaimsError::Base64(e.to_string()))?;

    serde_json::from_slice(&bytes).map_err(|e| ClaimsError::Json(e.to_string()))
}

/// Current time in epoch seconds.
pub fn now_epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// Judge `token` against the given clock reading.
///
/// A token expiring exactly at `now` is already expired.
pub fn is_valid_at(token: &str, now: i64) -> bool {
    match decode_claims(token) {
        Ok(claims) => claims.exp > now,
        Err(e) => {
            tracing::debug!(error = %e, "Token claims undecodable, treating as expired");
            false
        }
    }
}

/// Judge `token` against the system clock.
pub fn is_valid(token: &str) -> bool {
    is_valid_at(token, now_epoch_secs())
}

#[cfg(test)]
pub(crate) fn encode_test_token(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.signature", header, payload)
}
