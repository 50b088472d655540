//! Session invalidation.
//!
//! Every path that ends a session goes through [`SessionInvalidator::invalidate`]:
//! explicit logout, a backend 401, the freshness check, and the store watcher.

use std::sync::Arc;

use crate::observability::metrics;
use crate::session::store::{InvalidationReason, TokenStore};

/// Clears the token store and signals navigation to the sign-in entry point.
#[derive(Debug, Clone)]
pub struct SessionInvalidator {
    store: Arc<TokenStore>,
    sign_in_path: String,
}

impl SessionInvalidator {
    pub fn new(store: Arc<TokenStore>, sign_in_path: impl Into<String>) -> Self {
        Self {
            store,
            sign_in_path: sign_in_path.into(),
        }
    }

    /// Where callers are sent once their session is gone.
    pub fn sign_in_path(&self) -> &str {
        &self.sign_in_path
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    /// Clear the session. Returns `true` only for the call that actually
    /// cleared it; later or concurrent calls are no-ops.
    pub fn invalidate(&self, reason: InvalidationReason) -> bool {
        let cleared = self.store.clear(reason, &self.sign_in_path);
        if cleared {
            tracing::info!(
                reason = %reason,
                redirect = %self.sign_in_path,
                "Session invalidated"
            );
            metrics::record_invalidation(reason.as_str());
        } else {
            tracing::debug!(reason = %reason, "Session already cleared");
        }
        cleared
    }

    /// [`invalidate`](Self::invalidate) on the blocking pool, for async callers.
    pub async fn invalidate_async(&self, reason: InvalidationReason) -> bool {
        let invalidator = self.clone();
        match tokio::task::spawn_blocking(move || invalidator.invalidate(reason)).await {
            Ok(cleared) => cleared,
            Err(e) => {
                tracing::error!(error = %e, reason = %reason, "Invalidation task failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::claims::{encode_test_token, now_epoch_secs};
    use crate::session::store::{Session, SessionEvent};
    use serde_json::json;

    #[test]
    fn invalidation_carries_sign_in_path() {
        let store = Arc::new(TokenStore::in_memory());
        let token = encode_test_token(&json!({"exp": now_epoch_secs() + 60}));
        store.establish(Session::new(token, Some("Ada".into()))).unwrap();
        let mut events = store.subscribe();

        let invalidator = SessionInvalidator::new(store.clone(), "/login");
        assert!(invalidator.invalidate(InvalidationReason::Logout));
        assert!(!invalidator.invalidate(InvalidationReason::ExternalSignal));

        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::Invalidated {
                reason: InvalidationReason::Logout,
                redirect_to: "/login".into(),
            }
        );
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn concurrent_invalidations_clear_exactly_once() {
        let store = Arc::new(TokenStore::in_memory());
        let token = encode_test_token(&json!({"exp": now_epoch_secs() + 60}));
        store.establish(Session::new(token, Some("Ada".into()))).unwrap();
        let invalidator = SessionInvalidator::new(store.clone(), "/auth/sign-in");

        let readers_done = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let reader = {
            let store = store.clone();
            let done = readers_done.clone();
            std::thread::spawn(move || {
                while !done.load(std::sync::atomic::Ordering::SeqCst) {
                    let snapshot = store.snapshot();
                    assert_eq!(
                        snapshot.token.is_some(),
                        snapshot.display_name.is_some(),
                        "partially cleared session observed"
                    );
                }
            })
        };

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let invalidator = invalidator.clone();
                std::thread::spawn(move || invalidator.invalidate(InvalidationReason::Unauthorized))
            })
            .collect();
        let cleared = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|cleared| *cleared)
            .count();

        readers_done.store(true, std::sync::atomic::Ordering::SeqCst);
        reader.join().unwrap();

        assert_eq!(cleared, 1);
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn async_invalidation_removes_persisted_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let store = Arc::new(TokenStore::new(Box::new(
            crate::session::store::FilePersistence::new(&path),
        )));
        let token = encode_test_token(&json!({"exp": now_epoch_secs() + 60}));
        store.establish(Session::new(token, None)).unwrap();
        assert!(path.exists());

        let invalidator = SessionInvalidator::new(store.clone(), "/auth/sign-in");
        assert!(invalidator.invalidate_async(InvalidationReason::Logout).await);
        assert!(!invalidator.invalidate_async(InvalidationReason::Logout).await);
        assert!(!path.exists());
        assert!(store.snapshot().is_empty());
    }
}
