//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request (catch-all suffix, raw query)
//!     → resolver.rs (validate suffix, join with backend base URL)
//!     → Return: backend Url or ResolveError
//! ```
//!
//! # Design Decisions
//! - Exactly one backend; no route table
//! - Deterministic: same input always resolves to the same URL
//! - Unsafe paths are rejected before any I/O

pub mod resolver;

pub use resolver::{EndpointResolver, ExecutionContext, ResolveError};
