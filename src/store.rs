//! Session persistence between runs.
//!
//! TRADE-OFFS
//! ==========
//! The stored copy is a convenience, not an authority: the hosted service
//! can revoke it at any time, and a stale copy simply fails its next refresh.
//! Store failures are therefore logged by callers rather than aborting an
//! otherwise successful sign-in.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::supabase::types::Session;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("session file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("session file is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),
}

pub trait SessionStore: Send + Sync {
    /// Previously saved session, if any.
    fn load(&self) -> Result<Option<Session>, StoreError>;
    fn save(&self, session: &Session) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}

/// Keeps the session for the lifetime of the process only.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Option<Session>>,
}

impl SessionStore for MemoryStore {
    fn load(&self) -> Result<Option<Session>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone())
    }

    fn save(&self, session: &Session) -> Result<(), StoreError> {
        *self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = None;
        Ok(())
    }
}

/// JSON file on disk. A missing file means "no session".
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileStore {
    fn load(&self) -> Result<Option<Session>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(body) => Ok(Some(serde_json::from_str(&body)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, session: &Session) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let body = serde_json::to_string_pretty(session)?;
        std::fs::write(&self.path, body)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
