//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum setup, middleware)
//!     → request.rs (request ID, ForwardRequest extraction)
//!     → gateway engine (forward to backend)
//!     → response.rs (relay or JSON error body)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeRequestUuidV4, X_REQUEST_ID};
pub use response::ErrorBody;
pub use server::{HttpServer, SessionStatus};
