//! Authenticated forwarding gateway for the task API.
//!
//! A same-origin proxy that relays calls to one backend origin, sanitizes
//! headers in both directions, and owns the bearer-token session.

pub mod config;
pub mod gateway;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod security;
pub mod session;

pub use config::GatewayConfig;
pub use gateway::{ForwardRequest, ForwardResponse, ForwardingEngine, GatewayError};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use session::{SessionInvalidator, TokenStore};
