//! Durable storage for the id of the active game.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use derive_more::{Display, Error};
use tracing::{debug, info, instrument, warn};

use crate::api::SessionId;

/// Key under which the session id is persisted.
pub const SESSION_KEY: &str = "maths-game:game_id";

/// Storage error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Session store error: {} at {}:{}", message, file, line)]
pub struct StoreError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl StoreError {
    /// Creates a new store error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

/// Persists the active session id across restarts.
///
/// Implementations never touch the network and write through on every
/// `save`/`clear`.
pub trait SessionStore: Send + Sync {
    /// Reads the persisted id, if any, without validating it.
    fn load(&self) -> Result<Option<SessionId>, StoreError>;

    /// Persists `session_id`, overwriting any previous value.
    fn save(&self, session_id: &str) -> Result<(), StoreError>;

    /// Removes any persisted id.
    fn clear(&self) -> Result<(), StoreError>;
}

/// Session store backed by a small JSON key/value file.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Creates a store writing to `path`. The file is created lazily.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn new(path: impl AsRef<Path>) -> Self {
        debug!("Creating file session store");
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(StoreError::new(format!(
                    "Failed to read '{}': {}",
                    self.path.display(),
                    e
                )));
            }
        };
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content).map_err(|e| {
            StoreError::new(format!("Corrupt session file '{}': {}", self.path.display(), e))
        })
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::new(format!("Failed to create '{}': {}", parent.display(), e))
            })?;
        }
        let content = serde_json::to_string_pretty(entries)
            .map_err(|e| StoreError::new(format!("Failed to encode session file: {}", e)))?;
        std::fs::write(&self.path, content).map_err(|e| {
            StoreError::new(format!("Failed to write '{}': {}", self.path.display(), e))
        })
    }
}

impl SessionStore for FileSessionStore {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn load(&self) -> Result<Option<SessionId>, StoreError> {
        let session_id = self.read_entries()?.remove(SESSION_KEY);
        debug!(found = session_id.is_some(), "Loaded persisted session");
        Ok(session_id)
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn save(&self, session_id: &str) -> Result<(), StoreError> {
        // Keep unrelated keys intact; a corrupt file is simply replaced.
        let mut entries = self.read_entries().unwrap_or_else(|e| {
            warn!(error = %e, "Replacing unreadable session file");
            BTreeMap::new()
        });
        entries.insert(SESSION_KEY.to_string(), session_id.to_string());
        self.write_entries(&entries)?;
        info!(session_id, "Session persisted");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn clear(&self) -> Result<(), StoreError> {
        let mut entries = match self.read_entries() {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Discarding unreadable session file");
                BTreeMap::new()
            }
        };
        if entries.remove(SESSION_KEY).is_none() && !self.path.exists() {
            debug!("Nothing to clear");
            return Ok(());
        }
        if entries.is_empty() {
            match std::fs::remove_file(&self.path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(StoreError::new(format!(
                        "Failed to remove '{}': {}",
                        self.path.display(),
                        e
                    )));
                }
            }
        } else {
            self.write_entries(&entries)?;
        }
        info!("Session cleared");
        Ok(())
    }
}

/// In-process session store for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    slot: Mutex<Option<SessionId>>,
}

impl MemorySessionStore {
    /// Creates an empty store.
    #[instrument]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `session_id`.
    #[instrument]
    pub fn with_session(session_id: impl Into<SessionId> + std::fmt::Debug) -> Self {
        Self {
            slot: Mutex::new(Some(session_id.into())),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<SessionId>> {
        self.slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<SessionId>, StoreError> {
        Ok(self.slot().clone())
    }

    fn save(&self, session_id: &str) -> Result<(), StoreError> {
        *self.slot() = Some(session_id.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.slot() = None;
        Ok(())
    }
}

impl<S: SessionStore + ?Sized> SessionStore for std::sync::Arc<S> {
    fn load(&self) -> Result<Option<SessionId>, StoreError> {
        (**self).load()
    }

    fn save(&self, session_id: &str) -> Result<(), StoreError> {
        (**self).save(session_id)
    }

    fn clear(&self) -> Result<(), StoreError> {
        (**self).clear()
    }
}
