//! Bearer-token session subsystem.
//!
//! # Data Flow
//! ```text
//! Sign-in / sign-up response (captured by the forwarding engine)
//!     → store.rs (establish: persist + swap + Established event)
//!
//! Every forwarded request:
//!     → store.rs (wait-free snapshot)
//!     → claims.rs (local expiry judgement, fail-closed)
//!
//! Logout, backend 401, freshness.rs, watcher.rs:
//!     → invalidator.rs
//!     → store.rs (clear both fields + Invalidated event with sign-in path)
//! ```
//!
//! # Design Decisions
//! - The store is the only shared mutable state in the gateway
//! - Claims are never trusted; the backend remains the authority
//! - Invalidation is idempotent

pub mod claims;
pub mod freshness;
pub mod invalidator;
pub mod store;
pub mod watcher;

pub use claims::{decode_claims, is_valid, ClaimsError, TokenClaims};
pub use freshness::FreshnessMonitor;
pub use invalidator::SessionInvalidator;
pub use store::{
    FilePersistence, InvalidationReason, MemoryPersistence, Session, SessionEvent,
    SessionPersistence, StoreError, TokenStore,
};
pub use watcher::StoreWatcher;
