//! Session identifier persistence.
//!
//! The remote service issues an opaque session id on its responses; the client stores it
//! and sends it back on every later request. The id is never generated or inspected here.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Opaque session identifier issued by the remote service.
pub type SessionId = String;

/// Persisted single-slot store for the session id. Last writer wins.
pub trait SessionStore: Send + Sync {
    /// Current id, or None on first use or after `clear`. Never fails.
    fn get(&self) -> Option<SessionId>;
    /// Overwrite the stored id.
    fn save(&self, id: &str);
    /// Remove the stored id.
    fn clear(&self);
}

/// Stores the id in a single file (e.g. ~/.chatline/session_id), surviving restarts.
///
/// IO failures are logged and swallowed: a store that cannot write degrades to a
/// client without session continuity rather than failing the chat.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self) -> Option<SessionId> {
        let s = std::fs::read_to_string(&self.path).ok()?;
        let t = s.trim().to_string();
        if t.is_empty() {
            None
        } else {
            Some(t)
        }
    }

    fn save(&self, id: &str) {
        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                log::warn!("creating session directory {}: {}", parent.display(), e);
                return;
            }
        }
        if let Err(e) = std::fs::write(&self.path, id) {
            log::warn!("writing session id to {}: {}", self.path.display(), e);
        }
    }

    fn clear(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("removing session file {}: {}", self.path.display(), e),
        }
    }
}

/// In-process store; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    inner: Mutex<Option<SessionId>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with an id (e.g. restored by the embedder).
    pub fn with_id(id: impl Into<SessionId>) -> Self {
        Self {
            inner: Mutex::new(Some(id.into())),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self) -> Option<SessionId> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn save(&self, id: &str) {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner()) = Some(id.to_string());
    }

    fn clear(&self) {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

/// The session handed to a coordinator at construction. All reads and writes of the
/// session id go through here.
#[derive(Clone)]
pub struct SessionContext {
    store: Arc<dyn SessionStore>,
}

impl SessionContext {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySessionStore::new()))
    }

    /// Id to attach to the next request, if one has been issued.
    pub fn current(&self) -> Option<SessionId> {
        self.store.get()
    }

    /// Record the id carried by a response. Responses without one (or with an empty one)
    /// leave the stored id alone.
    pub fn adopt(&self, issued: Option<&str>) {
        match issued.map(str::trim).filter(|s| !s.is_empty()) {
            Some(id) => {
                log::debug!("adopting session id from response");
                self.store.save(id);
            }
            None => log::debug!("response carried no session id"),
        }
    }

    /// Drop the stored id (explicit logout).
    pub fn forget(&self) {
        log::debug!("clearing stored session id");
        self.store.clear();
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("has_id", &self.store.get().is_some())
            .finish()
    }
}
