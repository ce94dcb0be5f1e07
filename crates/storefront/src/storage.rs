//! Durable local key/value storage.
//!
//! The shop keeps a handful of values on the device itself: the serialized
//! cart, the device identifier and (for the admin) the auth session. Values
//! are plain strings under fixed keys.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;

/// Fixed storage keys.
pub mod keys {
    /// Serialized cart lines.
    pub const CART: &str = "cart";
    /// Per-device identifier used to tie anonymous orders to this device.
    pub const DEVICE_ID: &str = "device_id";
    /// Persisted admin auth session.
    pub const AUTH_SESSION: &str = "auth_session";
}

/// Errors from a [`LocalStore`].
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid storage key: {0:?}")]
    InvalidKey(String),
}

/// Synchronous string store surviving process restarts.
pub trait LocalStore: Send + Sync {
    /// Value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Erase `key`. Erasing a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be removed.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

impl<S: LocalStore + ?Sized> LocalStore for Arc<S> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}

fn check_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

/// One file per key under a data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> Result<PathBuf, StorageError> {
        check_key(key)?;
        Ok(self.dir.join(key))
    }
}

impl LocalStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path(key)?) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path(key)?;
        // Atomic replace
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path(key)?) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// In-memory store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        check_key(key)?;
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        check_key(key)?;
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        check_key(key)?;
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("data")).unwrap();

        assert_eq!(store.get(keys::CART).unwrap(), None);
        store.set(keys::CART, "[]").unwrap();
        assert_eq!(store.get(keys::CART).unwrap().as_deref(), Some("[]"));

        // Values survive reopening the directory
        let reopened = FileStore::open(store.dir()).unwrap();
        assert_eq!(reopened.get(keys::CART).unwrap().as_deref(), Some("[]"));

        reopened.remove(keys::CART).unwrap();
        reopened.remove(keys::CART).unwrap();
        assert_eq!(store.get(keys::CART).unwrap(), None);
    }

    #[test]
    fn test_rejects_path_like_keys() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.set("../cart", "x"),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(store.get("").is_err());
    }
}
