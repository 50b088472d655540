//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Default backend origin when neither the config file nor the environment sets one.
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// The single backend origin all traffic is forwarded to.
    pub backend: BackendConfig,

    /// Inbound proxy surface.
    pub proxy: ProxySurfaceConfig,

    /// Bearer-token session handling.
    pub session: SessionConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:3000".to_string(),
        }
    }
}

/// Backend origin configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the task API (scheme, host, port, optional path).
    pub base_url: String,

    /// Liveness endpoint probed after a transport failure.
    pub probe_path: String,

    /// Upper bound on the diagnostic probe in milliseconds.
    pub probe_timeout_ms: u64,

    /// Total time allowed for one forwarded round trip in seconds.
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BACKEND_URL.to_string(),
            probe_path: "/health".to_string(),
            probe_timeout_ms: 2000,
            request_timeout_secs: 30,
        }
    }
}

/// Inbound same-origin surface.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxySurfaceConfig {
    /// Path prefix under which every method is forwarded.
    pub prefix: String,

    /// Maximum inbound or relayed body size in bytes.
    pub max_body_size: usize,
}

impl Default for ProxySurfaceConfig {
    fn default() -> Self {
        Self {
            prefix: "/api/proxy".to_string(),
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// File holding the persisted token and display name. In-memory when unset.
    pub store_path: Option<String>,

    /// Sign-in entry point carried by navigation signals.
    pub sign_in_path: String,

    /// Forwarded paths whose successful responses establish a session.
    pub capture_paths: Vec<String>,

    /// Forwarded path that ends the session once relayed.
    pub logout_path: String,

    /// Interval of the background freshness check in seconds (0 disables it).
    pub freshness_interval_secs: u64,

    /// Watch the store file for changes made by other processes.
    pub watch_store: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            store_path: None,
            sign_in_path: "/auth/sign-in".to_string(),
            capture_paths: vec![
                "api/auth/sign-in".to_string(),
                "api/auth/sign-up".to_string(),
            ],
            logout_path: "api/auth/logout".to_string(),
            freshness_interval_secs: 30,
            watch_store: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
