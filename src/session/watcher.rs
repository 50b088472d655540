//! Session file watcher for cross-process signals.
//!
//! When another gateway, CLI, or tool sharing the same store file logs out,
//! the file disappears; when it signs in, the file is rewritten. Either change
//! is synced into the local store through a change notification, not polling.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::session::invalidator::SessionInvalidator;
use crate::session::store::{InvalidationReason, SyncOutcome, TokenStore};

/// Watches the persisted session and forwards change notifications.
pub struct StoreWatcher {
    path: PathBuf,
    change_tx: mpsc::UnboundedSender<()>,
}

impl StoreWatcher {
    /// Create a watcher for `path`.
    ///
    /// Returns the watcher and a receiver that yields once per observed change.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<()>) {
        let (change_tx, change_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                change_tx,
            },
            change_rx,
        )
    }

    /// Start watching. The returned handle must be kept alive.
    ///
    /// The parent directory is watched because the store file is replaced by
    /// rename and removed on logout.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.change_tx.clone();
        let file_name = self.path.file_name().map(|n| n.to_os_string());

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let touches_store = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if touches_store
                        && (event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove())
                    {
                        let _ = tx.send(());
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default(),
        )?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Session store watcher started");
        Ok(watcher)
    }
}

/// Apply one observed change to the local store.
///
/// A signal that arrives after the local session is already gone is a no-op.
pub fn apply_change(store: &Arc<TokenStore>, invalidator: &SessionInvalidator) {
    match store.sync_from_persistence() {
        Ok(SyncOutcome::Unchanged) => {}
        Ok(SyncOutcome::Adopted) => {
            tracing::info!("Adopted session written by another process");
        }
        Ok(SyncOutcome::ClearedExternally) => {
            invalidator.invalidate(InvalidationReason::ExternalSignal);
        }
        Err(e) => {
            tracing::warn!(error = %e, "Unreadable session store after external change");
        }
    }
}

/// Drain change notifications until the channel closes.
pub async fn follow_changes(
    store: Arc<TokenStore>,
    invalidator: SessionInvalidator,
    mut changes: mpsc::UnboundedReceiver<()>,
) {
    while changes.recv().await.is_some() {
        let store = store.clone();
        let invalidator = invalidator.clone();
        // The sync reads the store file.
        if let Err(e) = tokio::task::spawn_blocking(move || apply_change(&store, &invalidator)).await {
            tracing::error!(error = %e, "Session store sync task failed");
        }
    }
}
