//! Forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! ForwardRequest (from the HTTP layer)
//!     → engine.rs (resolve, sanitize, authorize, dispatch)
//!     → classifier.rs (only when dispatch fails without a response)
//!     → capture.rs (sign-in / sign-up answers populate the session)
//!     → ForwardResponse or GatewayError (types.rs)
//! ```
//!
//! # Design Decisions
//! - One inbound request, one backend call, one relayed response
//! - No retries; the liveness probe is diagnostic only
//! - Authentication failures clear the session before they surface

pub mod capture;
pub mod classifier;
pub mod engine;
pub mod types;

pub use classifier::{FailureClassifier, FailureKind, ProbeOutcome, TransportFailure};
pub use engine::ForwardingEngine;
pub use types::{ForwardRequest, ForwardResponse, GatewayError};
