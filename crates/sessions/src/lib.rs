// crates/sessions/src/lib.rs
//! Canonical on-device session persistence.
//!
//! The true record for a session lives under `session_<id>`; the capped
//! most-recent-first indexes are just id lists, treated as self-healing
//! caches that never imply the record exists. This crate owns all index
//! writes.

pub mod analytics;
pub mod error;
pub mod file_cache;
pub mod index;
pub mod keys;
pub mod repository;
pub mod summarize;

pub use analytics::{AnalyticsAggregator, AnalyticsReport};
pub use error::RepoError;
pub use file_cache::{FileCache, NoopFileCache};
pub use repository::SessionRepository;
