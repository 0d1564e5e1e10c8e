// crates/storage/src/router.rs
//! Per-call backend selection with transparent fallback.
//!
//! Policy: a browser-like environment always uses the browser store.
//! Otherwise values over the secure store's ceiling go straight to the
//! general store; everything else prefers the secure store but falls back
//! to the general store on any secure-store error, including plain
//! absence. Deletes never raise.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::backend::{
    BrowserStore, GeneralStore, KeyValueStore, SecureStore, SECURE_VALUE_LIMIT,
};
use crate::error::StorageError;
use crate::key::normalize_key;

/// Where the process is running; decides whether the browser store owns
/// all traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Native,
    Browser,
}

/// The unified key-value front over the three backends.
pub struct StorageRouter {
    secure: Arc<dyn KeyValueStore>,
    general: Arc<dyn KeyValueStore>,
    browser: Arc<dyn KeyValueStore>,
    env: Environment,
}

impl StorageRouter {
    pub fn new(
        secure: Arc<dyn KeyValueStore>,
        general: Arc<dyn KeyValueStore>,
        browser: Arc<dyn KeyValueStore>,
        env: Environment,
    ) -> Self {
        Self {
            secure,
            general,
            browser,
            env,
        }
    }

    /// Disk-backed router rooted at `root`, the standard native setup.
    pub fn on_disk(root: &Path) -> Self {
        Self::new(
            Arc::new(SecureStore::new(root.join("secure"))),
            Arc::new(GeneralStore::new(root.join("general"))),
            Arc::new(BrowserStore::new()),
            Environment::Native,
        )
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let key = normalize_key(key)?;
        if self.env == Environment::Browser {
            return self.browser.get(&key).await;
        }

        match self.secure.get(&key).await {
            Ok(Some(value)) => Ok(Some(value)),
            Ok(None) => self.general.get(&key).await,
            Err(e) => {
                if !e.is_not_found() {
                    debug!(%key, "secure store get failed, falling back: {e}");
                }
                self.general.get(&key).await
            }
        }
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let key = normalize_key(key)?;
        if self.env == Environment::Browser {
            return self.browser.set(&key, value).await;
        }

        if value.len() > SECURE_VALUE_LIMIT {
            return self.general.set(&key, value).await;
        }

        match self.secure.set(&key, value).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(%key, "secure store set failed, falling back: {e}");
                self.general.set(&key, value).await
            }
        }
    }

    /// Best-effort delete across every backend a value could live in.
    /// Deleting something that never existed is success.
    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let key = normalize_key(key)?;
        if self.env == Environment::Browser {
            let _ = self.browser.delete(&key).await;
            return Ok(());
        }

        if let Err(e) = self.secure.delete(&key).await {
            debug!(%key, "secure store delete failed: {e}");
        }
        if let Err(e) = self.general.delete(&key).await {
            debug!(%key, "general store delete failed: {e}");
        }
        Ok(())
    }

    /// Write directly to the unlimited store, bypassing size routing.
    /// Session payloads routinely exceed the secure ceiling, so the
    /// repository forces them here.
    pub async fn set_unrouted(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let key = normalize_key(key)?;
        if self.env == Environment::Browser {
            return self.browser.set(&key, value).await;
        }
        self.general.set(&key, value).await
    }

    /// Read the unlimited store first, then fall through the routed path.
    pub async fn get_unrouted_first(&self, key: &str) -> Result<Option<String>, StorageError> {
        let normalized = normalize_key(key)?;
        if self.env == Environment::Browser {
            return self.browser.get(&normalized).await;
        }
        if let Some(value) = self.general.get(&normalized).await? {
            return Ok(Some(value));
        }
        match self.secure.get(&normalized).await {
            Ok(value) => Ok(value),
            Err(e) => {
                if !e.is_not_found() {
                    debug!(key = %normalized, "secure store get failed: {e}");
                }
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn native_router(dir: &TempDir) -> StorageRouter {
        StorageRouter::on_disk(dir.path())
    }

    #[tokio::test]
    async fn small_values_land_in_secure_store() {
        let dir = TempDir::new().unwrap();
        let router = native_router(&dir);

        router.set("small", "hello").await.unwrap();
        assert!(dir.path().join("secure").join("small").exists());
        assert_eq!(router.get("small").await.unwrap(), Some("hello".into()));
    }

    #[tokio::test]
    async fn large_values_route_to_general_store() {
        let dir = TempDir::new().unwrap();
        let router = native_router(&dir);
        let big = "x".repeat(SECURE_VALUE_LIMIT + 1);

        router.set("big", &big).await.unwrap();
        assert!(dir.path().join("general").join("big").exists());
        assert!(!dir.path().join("secure").join("big").exists());
        assert_eq!(router.get("big").await.unwrap(), Some(big));
    }

    #[tokio::test]
    async fn get_falls_back_to_general_when_secure_is_empty() {
        let dir = TempDir::new().unwrap();
        let router = native_router(&dir);
        let big = "y".repeat(SECURE_VALUE_LIMIT + 1);

        // Only present in the general store; secure get errors (absent)
        // and the router must recover transparently.
        router.set("only-general", &big).await.unwrap();
        assert_eq!(router.get("only-general").await.unwrap(), Some(big));
    }

    #[tokio::test]
    async fn missing_key_is_none_not_error() {
        let dir = TempDir::new().unwrap();
        let router = native_router(&dir);
        assert_eq!(router.get("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_never_raises() {
        let dir = TempDir::new().unwrap();
        let router = native_router(&dir);
        router.delete("never-existed").await.unwrap();

        router.set("k", "v").await.unwrap();
        router.delete("k").await.unwrap();
        assert_eq!(router.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn invalid_key_is_a_hard_error() {
        let dir = TempDir::new().unwrap();
        let router = native_router(&dir);
        assert!(router.get("   ").await.is_err());
        assert!(router.set("", "v").await.is_err());
        assert!(router.delete("\n").await.is_err());
    }

    #[tokio::test]
    async fn browser_environment_pins_all_traffic() {
        let dir = TempDir::new().unwrap();
        let router = StorageRouter::new(
            Arc::new(SecureStore::new(dir.path().join("secure"))),
            Arc::new(GeneralStore::new(dir.path().join("general"))),
            Arc::new(BrowserStore::new()),
            Environment::Browser,
        );

        router.set("k", "v").await.unwrap();
        assert!(!dir.path().join("secure").join("k").exists());
        assert!(!dir.path().join("general").join("k").exists());
        assert_eq!(router.get("k").await.unwrap(), Some("v".into()));
    }

    #[tokio::test]
    async fn unrouted_write_bypasses_size_routing() {
        let dir = TempDir::new().unwrap();
        let router = native_router(&dir);

        router.set_unrouted("sess", "tiny").await.unwrap();
        assert!(dir.path().join("general").join("sess").exists());
        assert_eq!(
            router.get_unrouted_first("sess").await.unwrap(),
            Some("tiny".into())
        );
    }

    #[tokio::test]
    async fn unrouted_first_read_still_finds_secure_values() {
        let dir = TempDir::new().unwrap();
        let router = native_router(&dir);

        router.set("k", "v").await.unwrap(); // lands in secure
        assert_eq!(
            router.get_unrouted_first("k").await.unwrap(),
            Some("v".into())
        );
    }
}
