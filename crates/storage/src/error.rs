// crates/storage/src/error.rs
use thiserror::Error;

/// Errors raised by the key-value backends.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid storage key: {reason}")]
    InvalidKey { reason: String },

    #[error("Key not found in {store}: {key}")]
    KeyNotFound { store: &'static str, key: String },

    #[error("Value for {key} is {len} bytes, over the {limit}-byte limit of {store}")]
    ValueTooLarge {
        store: &'static str,
        key: String,
        len: usize,
        limit: usize,
    },

    #[error("IO error in {store} for key {key}: {source}")]
    Io {
        store: &'static str,
        key: String,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    pub fn invalid_key(reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            reason: reason.into(),
        }
    }

    /// Classify an IO error from a backing file store. `NotFound` becomes
    /// the structured variant so the router's fallback can act on it.
    pub fn io(store: &'static str, key: impl Into<String>, source: std::io::Error) -> Self {
        let key = key.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::KeyNotFound { store, key },
            _ => Self::Io { store, key, source },
        }
    }

    /// True for the "key simply wasn't there" case.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound { .. })
    }
}
