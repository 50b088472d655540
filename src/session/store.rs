//! Token store: the single owner of the bearer-token session.
//!
//! # Responsibilities
//! - Hold the current `Session` (token + display name)
//! - Persist it so other processes sharing the file observe the same session
//! - Publish change events to subscribers
//!
//! # Design Decisions
//! - Readers load an `Arc<Session>` snapshot through `ArcSwap` (wait-free)
//! - Writers serialize on one mutex and swap a whole new `Session`, so both
//!   fields change together from any reader's point of view
//! - Clearing an already-empty store is a no-op and emits nothing
//! - Writes and syncs do blocking file I/O; async callers run them on the
//!   blocking pool

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::session::claims;

/// Errors from the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("session store is not valid JSON: {0}")]
    Format(#[from] serde_json::Error),
}

/// The persisted bearer-token session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(default, rename = "user_name", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Session {
    pub fn new(token: impl Into<String>, display_name: Option<String>) -> Self {
        Self {
            token: Some(token.into()),
            display_name,
        }
    }

    /// True when neither field is set.
    pub fn is_empty(&self) -> bool {
        self.token.is_none() && self.display_name.is_none()
    }

    /// A token is present and the local judge accepts it.
    pub fn is_authenticated(&self) -> bool {
        self.token.as_deref().map(claims::is_valid).unwrap_or(false)
    }
}

/// Why a session was cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationReason {
    /// The caller logged out explicitly.
    Logout,
    /// The backend answered 401.
    Unauthorized,
    /// The freshness check found the token expired or undecodable.
    Expired,
    /// Another process cleared the shared store.
    ExternalSignal,
}

impl InvalidationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvalidationReason::Logout => "logout",
            InvalidationReason::Unauthorized => "unauthorized",
            InvalidationReason::Expired => "expired",
            InvalidationReason::ExternalSignal => "external_signal",
        }
    }
}

impl std::fmt::Display for InvalidationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Change notification published by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A session was stored.
    Established { display_name: Option<String> },
    /// The session was cleared; callers should navigate to `redirect_to`.
    Invalidated {
        reason: InvalidationReason,
        redirect_to: String,
    },
}

/// Where the session lives between process restarts.
pub trait SessionPersistence: Send + Sync + std::fmt::Debug {
    /// Read the persisted session. A missing record is an empty session.
    fn load(&self) -> Result<Session, StoreError>;

    /// Persist both fields together.
    fn save(&self, session: &Session) -> Result<(), StoreError>;

    /// Remove both fields together.
    fn clear(&self) -> Result<(), StoreError>;

    /// File backing the store, if any.
    fn path(&self) -> Option<&Path> {
        None
    }
}

/// Process-local persistence, lost on exit.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    inner: Mutex<Session>,
}

impl SessionPersistence for MemoryPersistence {
    fn load(&self) -> Result<Session, StoreError> {
        Ok(self.inner.lock().expect("memory store mutex poisoned").clone())
    }

    fn save(&self, session: &Session) -> Result<(), StoreError> {
        *self.inner.lock().expect("memory store mutex poisoned") = session.clone();
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.inner.lock().expect("memory store mutex poisoned") = Session::default();
        Ok(())
    }
}

/// JSON file persistence shared by every process pointed at the same path.
#[derive(Debug, Clone)]
pub struct FilePersistence {
    path: PathBuf,
}

impl FilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SessionPersistence for FilePersistence {
    fn load(&self) -> Result<Session, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Session::default()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Session::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, session: &Session) -> Result<(), StoreError> {
        // Write-then-rename so readers never see half a record.
        let tmp = self.path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            serde_json::to_writer(&mut file, session)?;
            file.flush()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// Outcome of re-reading the persisted record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Persisted and local state already agree.
    Unchanged,
    /// Another process stored a different session; it was adopted.
    Adopted,
    /// Another process cleared the session while it was set locally.
    ClearedExternally,
}

/// Owner of the session. Cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct TokenStore {
    current: ArcSwap<Session>,
    write_lock: Mutex<()>,
    persistence: Box<dyn SessionPersistence>,
    events: broadcast::Sender<SessionEvent>,
}

impl TokenStore {
    /// Create a store and load whatever the persistence layer already holds.
    ///
    /// An unreadable record starts the store empty.
    pub fn new(persistence: Box<dyn SessionPersistence>) -> Self {
        let initial = persistence.load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Discarding unreadable persisted session");
            Session::default()
        });
        let (events, _) = broadcast::channel(16);
        Self {
            current: ArcSwap::from_pointee(initial),
            write_lock: Mutex::new(()),
            persistence,
            events,
        }
    }

    /// In-memory store, initially empty.
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryPersistence::default()))
    }

    /// Snapshot of the current session.
    pub fn snapshot(&self) -> Arc<Session> {
        self.current.load_full()
    }

    /// The stored token, if any.
    pub fn token(&self) -> Option<String> {
        self.current.load().token.clone()
    }

    /// The stored display name, if any.
    pub fn display_name(&self) -> Option<String> {
        self.current.load().display_name.clone()
    }

    /// Present and locally valid.
    pub fn is_authenticated(&self) -> bool {
        self.current.load().is_authenticated()
    }

    /// File backing the store, if any.
    pub fn persisted_path(&self) -> Option<&Path> {
        self.persistence.path()
    }

    /// Subscribe to change events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Store a freshly authenticated session, replacing any previous one.
    pub fn establish(&self, session: Session) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().expect("token store mutex poisoned");
        self.persistence.save(&session)?;
        let display_name = session.display_name.clone();
        self.current.store(Arc::new(session));
        let _ = self.events.send(SessionEvent::Established { display_name });
        Ok(())
    }

    /// Clear both fields in one step.
    ///
    /// Returns `false` when the store was already empty; nothing is published
    /// in that case. The in-memory session is cleared even if the persisted
    /// record cannot be removed.
    pub fn clear(&self, reason: InvalidationReason, redirect_to: &str) -> bool {
        let _guard = self.write_lock.lock().expect("token store mutex poisoned");
        if self.current.load().is_empty() {
            return false;
        }
        if let Err(e) = self.persistence.clear() {
            tracing::error!(error = %e, "Failed to remove persisted session");
        }
        self.current.store(Arc::new(Session::default()));
        let _ = self.events.send(SessionEvent::Invalidated {
            reason,
            redirect_to: redirect_to.to_string(),
        });
        true
    }

    /// Re-read the persisted record after another process touched it.
    ///
    /// An external clear is reported but not applied here; the caller routes
    /// it through the invalidator so the navigation signal fires.
    pub fn sync_from_persistence(&self) -> Result<SyncOutcome, StoreError> {
        // Read under the lock so a concurrent sign-in cannot slip between the
        // read and the comparison.
        let _guard = self.write_lock.lock().expect("token store mutex poisoned");
        let persisted = self.persistence.load()?;
        let local = self.current.load_full();
        if *local == persisted {
            return Ok(SyncOutcome::Unchanged);
        }
        if persisted.token.is_none() {
            return Ok(if local.is_empty() {
                SyncOutcome::Unchanged
            } else {
                SyncOutcome::ClearedExternally
            });
        }
        let display_name = persisted.display_name.clone();
        self.current.store(Arc::new(persisted));
        let _ = self.events.send(SessionEvent::Established { display_name });
        Ok(SyncOutcome::Adopted)
    }
}
