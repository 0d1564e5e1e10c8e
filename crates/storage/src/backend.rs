// crates/storage/src/backend.rs
//! The three backing stores behind the router.
//!
//! - `SecureStore` - device keychain stand-in: per-value size ceiling,
//!   absent keys reported as errors (keychain semantics)
//! - `GeneralStore` - unlimited file-per-key local store
//! - `BrowserStore` - in-memory map used in browser-like environments
//!
//! All keys reaching a store are already normalized by the router.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::StorageError;

/// Async get/set/delete over string keys and string values. Structured
/// values are the caller's responsibility to serialize.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Store name for logging.
    fn name(&self) -> &'static str;
}

/// Per-value ceiling of the secure store, and the router's size-routing
/// threshold: anything larger goes to the general store.
pub const SECURE_VALUE_LIMIT: usize = 2048;

/// Keychain-style store: size-limited, and a missing key is an error
/// rather than `None`, which is exactly what lets the router treat
/// "absent" and "broken" with one fallback path.
pub struct SecureStore {
    dir: PathBuf,
    value_limit: usize,
}

impl SecureStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            value_limit: SECURE_VALUE_LIMIT,
        }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

#[async_trait]
impl KeyValueStore for SecureStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let value = tokio::fs::read_to_string(self.path(key))
            .await
            .map_err(|e| StorageError::io(self.name(), key, e))?;
        Ok(Some(value))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if value.len() > self.value_limit {
            return Err(StorageError::ValueTooLarge {
                store: self.name(),
                key: key.to_string(),
                len: value.len(),
                limit: self.value_limit,
            });
        }
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StorageError::io(self.name(), key, e))?;
        tokio::fs::write(self.path(key), value)
            .await
            .map_err(|e| StorageError::io(self.name(), key, e))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(self.name(), key, e)),
        }
    }

    fn name(&self) -> &'static str {
        "secure"
    }
}

/// Unlimited general-purpose local store, file per key. Absent keys are
/// `Ok(None)`.
pub struct GeneralStore {
    dir: PathBuf,
}

impl GeneralStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

#[async_trait]
impl KeyValueStore for GeneralStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match tokio::fs::read_to_string(self.path(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(self.name(), key, e)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StorageError::io(self.name(), key, e))?;
        tokio::fs::write(self.path(key), value)
            .await
            .map_err(|e| StorageError::io(self.name(), key, e))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(self.name(), key, e)),
        }
    }

    fn name(&self) -> &'static str {
        "general"
    }
}

/// localStorage stand-in for browser-like environments. Never persists
/// across process restarts.
#[derive(Default)]
pub struct BrowserStore {
    map: RwLock<HashMap<String, String>>,
}

impl BrowserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for BrowserStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.map.read() {
            Ok(map) => Ok(map.get(key).cloned()),
            Err(e) => {
                tracing::error!("browser store lock poisoned on get: {e}");
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        match self.map.write() {
            Ok(mut map) => {
                map.insert(key.to_string(), value.to_string());
                Ok(())
            }
            Err(e) => {
                tracing::error!("browser store lock poisoned on set: {e}");
                Err(StorageError::io(
                    self.name(),
                    key,
                    std::io::Error::other("lock poisoned"),
                ))
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        if let Ok(mut map) = self.map.write() {
            map.remove(key);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "browser"
    }
}
