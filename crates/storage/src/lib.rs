// crates/storage/src/lib.rs
//! Unified key-value persistence over three heterogeneous backing stores.
//!
//! Provides:
//! - [`KeyValueStore`] - the async get/set/delete contract
//! - [`SecureStore`] / [`GeneralStore`] / [`BrowserStore`] - the backends
//! - [`StorageRouter`] - per-call backend selection with fallback
//! - [`chunk`] - fixed-size chunking for values that outgrow a backend

pub mod backend;
pub mod chunk;
pub mod error;
pub mod key;
pub mod router;

pub use backend::{BrowserStore, GeneralStore, KeyValueStore, SecureStore};
pub use error::StorageError;
pub use key::normalize_key;
pub use router::{Environment, StorageRouter};
