//! Durable storage for the signed-in session.
//!
//! The session is stored as one entry per fixed key, mirroring what the
//! web client keeps in local storage. Purging removes every current key and
//! every legacy key an older client version may have written.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::types::User;

/// Storage keys for session data.
pub mod keys {
    /// Key for the bearer token.
    pub const AUTH_TOKEN: &str = "auth_token";

    /// Key for the JSON-encoded user profile.
    pub const USER: &str = "user";

    /// Keys written by older clients. Only ever removed, never read.
    pub const LEGACY: &[&str] = &["token"];
}

/// Errors raised by a [`SessionStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing storage failed.
    #[error("session storage I/O error: {0}")]
    Io(#[from] io::Error),

    /// A stored entry could not be decoded.
    #[error("corrupt session entry: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Session data as persisted between runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    /// Raw bearer token.
    pub token: String,
    /// Profile of the signed-in user.
    pub user: User,
}

/// Durable key/value storage for the session.
pub trait SessionStore: Send + Sync {
    /// Load the persisted session, if a complete one exists.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read or an entry is corrupt.
    fn load(&self) -> Result<Option<StoredSession>, StoreError>;

    /// Persist `session`, replacing whatever was stored.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be written.
    fn save(&self, session: &StoredSession) -> Result<(), StoreError>;

    /// Remove every session key, including legacy ones.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing entry cannot be removed.
    fn purge(&self) -> Result<(), StoreError>;
}

impl<S: SessionStore + ?Sized> SessionStore for Arc<S> {
    fn load(&self) -> Result<Option<StoredSession>, StoreError> {
        (**self).load()
    }

    fn save(&self, session: &StoredSession) -> Result<(), StoreError> {
        (**self).save(session)
    }

    fn purge(&self) -> Result<(), StoreError> {
        (**self).purge()
    }
}

/// Decode the two entries into a session; both must be present.
fn decode(
    token: Option<String>,
    user: Option<String>,
) -> Result<Option<StoredSession>, StoreError> {
    match (token, user) {
        (Some(token), Some(user)) if !token.trim().is_empty() => Ok(Some(StoredSession {
            token: token.trim().to_string(),
            user: serde_json::from_str(&user)?,
        })),
        _ => Ok(None),
    }
}

// =============================================================================
// FileSessionStore
// =============================================================================

/// Stores each key as a file inside a directory.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    /// Create a store rooted at `dir`. The directory is created on first save.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the session files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(self.dir.join(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.dir.join(key);
        std::fs::write(&path, value)?;
        restrict_permissions(&path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match std::fs::remove_file(self.dir.join(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<StoredSession>, StoreError> {
        decode(self.read(keys::AUTH_TOKEN)?, self.read(keys::USER)?)
    }

    fn save(&self, session: &StoredSession) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir)?;
        let user = serde_json::to_string(&session.user)?;
        self.write(keys::USER, &user)?;
        self.write(keys::AUTH_TOKEN, &session.token)?;
        for key in keys::LEGACY {
            self.remove(key)?;
        }
        Ok(())
    }

    fn purge(&self) -> Result<(), StoreError> {
        for key in [keys::AUTH_TOKEN, keys::USER].iter().chain(keys::LEGACY) {
            self.remove(key)?;
        }
        Ok(())
    }
}

/// The token file is readable by the owner only.
#[cfg(unix)]
fn restrict_permissions(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> io::Result<()> {
    Ok(())
}

// =============================================================================
// MemorySessionStore
// =============================================================================

/// In-memory store, for tests and embedders that manage persistence themselves.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a raw entry, e.g. a legacy key left behind by an older client.
    #[must_use]
    pub fn with_entry(self, key: &str, value: &str) -> Self {
        self.entries.lock().insert(key.to_string(), value.to_string());
        self
    }

    /// Whether any entry is stored under `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<StoredSession>, StoreError> {
        let entries = self.entries.lock();
        decode(
            entries.get(keys::AUTH_TOKEN).cloned(),
            entries.get(keys::USER).cloned(),
        )
    }

    fn save(&self, session: &StoredSession) -> Result<(), StoreError> {
        let user = serde_json::to_string(&session.user)?;
        let mut entries = self.entries.lock();
        entries.insert(keys::USER.to_string(), user);
        entries.insert(keys::AUTH_TOKEN.to_string(), session.token.clone());
        for key in keys::LEGACY {
            entries.remove(*key);
        }
        Ok(())
    }

    fn purge(&self) -> Result<(), StoreError> {
        let mut entries = self.entries.lock();
        entries.remove(keys::AUTH_TOKEN);
        entries.remove(keys::USER);
        for key in keys::LEGACY {
            entries.remove(*key);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use shopfront_core::{Email, UserId, UserRole};

    use super::*;

    fn stored() -> StoredSession {
        StoredSession {
            token: "tok-123".to_string(),
            user: User {
                id: UserId::new(1),
                email: Email::parse("ada@example.com").unwrap(),
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                phone: None,
                address: None,
                role: UserRole::User,
                created_at: None,
            },
        }
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("session"));

        assert_eq!(store.load().unwrap(), None);
        store.save(&stored()).unwrap();
        assert_eq!(store.load().unwrap(), Some(stored()));
    }

    #[test]
    fn test_file_store_purge_removes_legacy_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        store.save(&stored()).unwrap();
        std::fs::write(dir.path().join("token"), "old-token").unwrap();

        store.purge().unwrap();

        assert!(!dir.path().join(keys::AUTH_TOKEN).exists());
        assert!(!dir.path().join(keys::USER).exists());
        assert!(!dir.path().join("token").exists());
        // Purging twice is fine.
        store.purge().unwrap();
    }

    #[test]
    fn test_file_store_missing_user_is_no_session() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(keys::AUTH_TOKEN), "tok").unwrap();
        let store = FileSessionStore::new(dir.path());
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_file_store_corrupt_user() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(keys::AUTH_TOKEN), "tok").unwrap();
        std::fs::write(dir.path().join(keys::USER), "{not json").unwrap();
        let store = FileSessionStore::new(dir.path());
        assert!(matches!(store.load(), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_memory_store_purge() {
        let store = MemorySessionStore::new().with_entry("token", "legacy");
        store.save(&stored()).unwrap();
        assert!(!store.contains("token"));

        let store = MemorySessionStore::new().with_entry("token", "legacy");
        store.purge().unwrap();
        assert!(!store.contains("token"));
        assert_eq!(store.load().unwrap(), None);
    }
}
