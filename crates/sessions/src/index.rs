// crates/sessions/src/index.rs
//! Capped most-recent-first id lists.
//!
//! Entries are inserted at the head, deduplicated by id, and never
//! reordered on access. An unreadable or malformed index reads as empty:
//! an empty history beats crashing the caller.

use mizan_storage::{StorageError, StorageRouter};
use tracing::warn;

/// Read an index, degrading to empty on absence or malformed JSON.
pub async fn read_index(router: &StorageRouter, key: &str) -> Vec<String> {
    match router.get(key).await {
        Ok(Some(raw)) => match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(ids) => ids,
            Err(e) => {
                warn!(index = %key, "malformed index, treating as empty: {e}");
                Vec::new()
            }
        },
        Ok(None) => Vec::new(),
        Err(e) => {
            warn!(index = %key, "index read failed, treating as empty: {e}");
            Vec::new()
        }
    }
}

pub async fn write_index(
    router: &StorageRouter,
    key: &str,
    ids: &[String],
) -> Result<(), StorageError> {
    let json = serde_json::to_string(ids).unwrap_or_else(|_| "[]".to_string());
    router.set(key, &json).await
}

/// Head-insert `id`, dedup by id, then truncate to `cap`. Callers hold the
/// repository's index lock so the read-modify-write is serialized.
pub async fn head_insert(
    router: &StorageRouter,
    key: &str,
    id: &str,
    cap: usize,
) -> Result<(), StorageError> {
    let mut ids = read_index(router, key).await;
    ids.retain(|existing| existing != id);
    ids.insert(0, id.to_string());
    ids.truncate(cap);
    write_index(router, key, &ids).await
}

/// Remove `id` from the index if present.
pub async fn remove_id(
    router: &StorageRouter,
    key: &str,
    id: &str,
) -> Result<(), StorageError> {
    let mut ids = read_index(router, key).await;
    let before = ids.len();
    ids.retain(|existing| existing != id);
    if ids.len() == before {
        return Ok(());
    }
    write_index(router, key, &ids).await
}
