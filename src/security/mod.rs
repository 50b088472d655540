//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request:
//!     → headers.rs (strip hop-by-hop and infrastructure headers)
//!     → Forwarded to the backend
//!
//! Backend response:
//!     → headers.rs (strip hop-by-hop headers and set-cookie)
//!     → Relayed to the caller
//! ```
//!
//! # Design Decisions
//! - No trust in client-supplied forwarding or tracing headers
//! - Cookie-based sessions are never proxied

pub mod headers;

pub use headers::{sanitize_request, sanitize_response};
