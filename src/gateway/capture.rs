//! Session capture from authentication responses.
//!
//! A successful sign-in or sign-up answer looks like
//! `{ "token": "...", "user": { "full_name": "...", "name": "..." } }`.
//! The token and a display name are lifted out into the token store; the
//! response itself is relayed untouched.

use serde::Deserialize;

use crate::gateway::types::GatewayError;
use crate::session::Session;

#[derive(Debug, Deserialize)]
struct AuthPayload {
    token: String,
    #[serde(default)]
    user: Option<UserPayload>,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SignUpRequest {
    #[serde(default)]
    name: Option<String>,
}

/// Which forwarded paths carry session side effects.
#[derive(Debug, Clone)]
pub struct AuthRoutes {
    capture_paths: Vec<String>,
    logout_path: String,
}

fn normalize(path: &str) -> &str {
    path.trim_matches('/')
}

impl AuthRoutes {
    pub fn new(capture_paths: &[String], logout_path: &str) -> Self {
        Self {
            capture_paths: capture_paths
                .iter()
                .map(|p| normalize(p).to_string())
                .filter(|p| !p.is_empty())
                .collect(),
            logout_path: normalize(logout_path).to_string(),
        }
    }

    /// Successful answers on this path establish a session.
    pub fn is_capture(&self, path: &str) -> bool {
        let path = normalize(path);
        self.capture_paths.iter().any(|p| p == path)
    }

    /// Relaying this path ends the session.
    pub fn is_logout(&self, path: &str) -> bool {
        !self.logout_path.is_empty() && normalize(path) == self.logout_path
    }
}

/// Build a session from an authentication response body.
///
/// The display name prefers `user.full_name`, then `user.name`, then the
/// `name` the caller submitted when signing up.
pub fn session_from_auth_response(
    response_body: &[u8],
    request_body: Option<&[u8]>,
) -> Result<Session, GatewayError> {
    let payload: AuthPayload = serde_json::from_slice(response_body)
        .map_err(|e| GatewayError::DecodeFailure(e.to_string()))?;
    if payload.token.trim().is_empty() {
        return Err(GatewayError::DecodeFailure("empty token".to_string()));
    }

    let display_name = payload
        .user
        .and_then(|u| u.full_name.or(u.name))
        .or_else(|| {
            request_body
                .and_then(|body| serde_json::from_slice::<SignUpRequest>(body).ok())
                .and_then(|req| req.name)
        })
        .filter(|n| !n.trim().is_empty());

    Ok(Session::new(payload.token, display_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_full_name() {
        let session = session_from_auth_response(
            br#"{"token":"t","user":{"full_name":"Ada Lovelace","name":"ada"}}"#,
            None,
        )
        .unwrap();
        assert_eq!(session.token.as_deref(), Some("t"));
        assert_eq!(session.display_name.as_deref(), Some("Ada Lovelace"));
    }

    #[test]
    fn falls_back_to_submitted_name() {
        let session = session_from_auth_response(
            br#"{"token":"t","user":{"id":1}}"#,
            Some(br#"{"email":"a@b.c","password":"x","name":"Ada"}"#),
        )
        .unwrap();
        assert_eq!(session.display_name.as_deref(), Some("Ada"));
    }

    #[test]
    fn missing_token_is_decode_failure() {
        let err = session_from_auth_response(br#"{"user":{"name":"x"}}"#, None).unwrap_err();
        assert!(matches!(err, GatewayError::DecodeFailure(_)));
    }

    #[test]
    fn route_matching_ignores_slashes() {
        let routes = AuthRoutes::new(&["api/auth/sign-in".to_string()], "/api/auth/logout");
        assert!(routes.is_capture("/api/auth/sign-in/"));
        assert!(!routes.is_capture("api/auth/sign-in-later"));
        assert!(routes.is_logout("api/auth/logout"));
        assert!(!routes.is_logout("api/tasks"));
    }
}
