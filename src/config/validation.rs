//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate the backend origin and value ranges (timeouts > 0)
//! - Check path shapes (prefix, probe path, sign-in path)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match Url::parse(&config.backend.base_url) {
        Ok(url) => {
            if url.scheme() != "http" && url.scheme() != "https" {
                errors.push(ValidationError::new(
                    "backend.base_url",
                    format!("unsupported scheme '{}'", url.scheme()),
                ));
            }
            if url.query().is_some() || url.fragment().is_some() {
                errors.push(ValidationError::new(
                    "backend.base_url",
                    "must not carry a query or fragment",
                ));
            }
        }
        Err(e) => errors.push(ValidationError::new("backend.base_url", e.to_string())),
    }

    if !config.backend.probe_path.starts_with('/') {
        errors.push(ValidationError::new("backend.probe_path", "must start with '/'"));
    }
    if config.backend.probe_timeout_ms == 0 {
        errors.push(ValidationError::new("backend.probe_timeout_ms", "must be greater than 0"));
    }
    if config.backend.request_timeout_secs == 0 {
        errors.push(ValidationError::new("backend.request_timeout_secs", "must be greater than 0"));
    }

    let prefix = &config.proxy.prefix;
    if !prefix.starts_with('/') || (prefix.len() > 1 && prefix.ends_with('/')) {
        errors.push(ValidationError::new(
            "proxy.prefix",
            "must start with '/' and have no trailing '/'",
        ));
    }
    if config.proxy.max_body_size == 0 {
        errors.push(ValidationError::new("proxy.max_body_size", "must be greater than 0"));
    }

    if !config.session.sign_in_path.starts_with('/') {
        errors.push(ValidationError::new("session.sign_in_path", "must start with '/'"));
    }

    if config.listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
