//! Persisted chat identity: the last display name and a stable anonymous id.
//!
//! The user id is generated once (UUID v4) and then reused for every join,
//! so other participants can tell a returning user apart from a new one
//! with the same name.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;

/// Storage for the chat identity.
pub trait IdentityStore: Send + Sync + 'static {
    /// The last saved display name, if any.
    fn username(&self) -> Option<String>;

    /// Remember `name` as the display name.
    fn save_username(&self, name: &str) -> Result<()>;

    /// The anonymous user id, created on first use.
    fn user_id(&self) -> Result<String>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredIdentity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
}

fn new_user_id() -> String {
    Uuid::new_v4().to_string()
}

/// In-process store; forgets everything on drop.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    inner: Mutex<StoredIdentity>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed a user id, e.g. one restored from elsewhere.
    pub fn with_user_id(user_id: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(StoredIdentity {
                username: None,
                user_id: Some(user_id.into()),
            }),
        }
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn username(&self) -> Option<String> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .username
            .clone()
    }

    fn save_username(&self, name: &str) -> Result<()> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .username = Some(name.to_string());
        Ok(())
    }

    fn user_id(&self) -> Result<String> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(inner.user_id.get_or_insert_with(new_user_id).clone())
    }
}

/// JSON file store (`{"username": ..., "userId": ...}`).
///
/// The file is read once on [`open`](FileIdentityStore::open) and rewritten
/// on every change. An unreadable or corrupt file starts a fresh identity.
#[derive(Debug)]
pub struct FileIdentityStore {
    path: PathBuf,
    inner: Mutex<StoredIdentity>,
}

impl FileIdentityStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let stored = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!(path = %path.display(), "ignoring corrupt identity file: {e}");
                StoredIdentity::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoredIdentity::default(),
            Err(e) => {
                warn!(path = %path.display(), "cannot read identity file: {e}");
                StoredIdentity::default()
            }
        };
        Self {
            path,
            inner: Mutex::new(stored),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, stored: &StoredIdentity) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(stored)?)?;
        debug!(path = %self.path.display(), "identity saved");
        Ok(())
    }
}

impl IdentityStore for FileIdentityStore {
    fn username(&self) -> Option<String> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .username
            .clone()
    }

    fn save_username(&self, name: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.username.as_deref() == Some(name) {
            return Ok(());
        }
        inner.username = Some(name.to_string());
        self.persist(&inner)
    }

    fn user_id(&self) -> Result<String> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(id) = &inner.user_id {
            return Ok(id.clone());
        }
        let id = new_user_id();
        inner.user_id = Some(id.clone());
        self.persist(&inner)?;
        Ok(id)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("live-match-identity-{}", Uuid::new_v4()))
            .join(name)
    }

    #[test]
    fn memory_user_id_is_stable() {
        let store = MemoryIdentityStore::new();
        let first = store.user_id().unwrap();
        assert_eq!(store.user_id().unwrap(), first);
        assert!(Uuid::parse_str(&first).is_ok());
    }

    #[test]
    fn memory_username_round_trip() {
        let store = MemoryIdentityStore::new();
        assert_eq!(store.username(), None);
        store.save_username("alice").unwrap();
        assert_eq!(store.username().as_deref(), Some("alice"));
    }

    #[test]
    fn seeded_user_id_is_kept() {
        let store = MemoryIdentityStore::with_user_id("u-1");
        assert_eq!(store.user_id().unwrap(), "u-1");
    }

    #[test]
    fn file_store_survives_reopen() {
        let path = temp_path("identity.json");

        let store = FileIdentityStore::open(&path);
        store.save_username("bob").unwrap();
        let id = store.user_id().unwrap();
        drop(store);

        let reopened = FileIdentityStore::open(&path);
        assert_eq!(reopened.username().as_deref(), Some("bob"));
        assert_eq!(reopened.user_id().unwrap(), id);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"userId\""));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn corrupt_file_starts_fresh() {
        let path = temp_path("identity.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"{not json").unwrap();

        let store = FileIdentityStore::open(&path);
        assert_eq!(store.username(), None);
        assert!(!store.user_id().unwrap().is_empty());

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
