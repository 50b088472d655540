//! Startup orchestration.
//!
//! Builds the session subsystem from configuration in dependency order:
//! persistence → token store → invalidator.

use std::sync::Arc;

use crate::config::SessionConfig;
use crate::session::{FilePersistence, SessionInvalidator, TokenStore};

/// Open the token store described by `config`.
pub fn open_store(config: &SessionConfig) -> TokenStore {
    match &config.store_path {
        Some(path) => {
            tracing::info!(path = %path, "Using file-backed session store");
            TokenStore::new(Box::new(FilePersistence::new(path)))
        }
        None => {
            tracing::info!("Using in-memory session store");
            TokenStore::in_memory()
        }
    }
}

/// Store plus the invalidator every session-ending path shares.
pub fn build_session(config: &SessionConfig) -> (Arc<TokenStore>, SessionInvalidator) {
    let store = Arc::new(open_store(config));
    let invalidator = SessionInvalidator::new(store.clone(), config.sign_in_path.clone());
    (store, invalidator)
}
