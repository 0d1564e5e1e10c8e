// crates/sessions/src/file_cache.rs
//! Consumed platform interface for opportunistic document caching.

use async_trait::async_trait;

/// Downloads a remote document into the local cache.
///
/// Failure must never block session storage, so the contract is
/// `Option<local path>` rather than a `Result`.
#[async_trait]
pub trait FileCache: Send + Sync {
    async fn download(&self, url: &str) -> Option<String>;
}

/// Cache that never caches; used when no network stack is wired in.
pub struct NoopFileCache;

#[async_trait]
impl FileCache for NoopFileCache {
    async fn download(&self, _url: &str) -> Option<String> {
        None
    }
}
