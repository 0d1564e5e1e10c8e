// crates/storage/src/chunk.rs
//! Fixed-size chunking so arbitrarily large values can ride through the
//! size-limited backend.
//!
//! Layout: `<key>_chunks` holds the chunk count; each chunk lives under
//! `<key>_chunk_<i>`. Reassembly fails soft (`None`) if any chunk is
//! missing.

use tracing::warn;

use crate::error::StorageError;
use crate::key::normalize_key_reserving;
use crate::router::StorageRouter;

/// Chunk payload size in bytes. Chunks split on char boundaries, so a
/// chunk may be up to three bytes short of this.
pub const CHUNK_SIZE: usize = 2000;

/// Headroom reserved on the base key for the `_chunk_<i>` suffix.
const SUFFIX_RESERVE: usize = 16;

/// Split `value` into chunks and store them under suffixed keys.
pub async fn set_chunked(
    router: &StorageRouter,
    key: &str,
    value: &str,
) -> Result<(), StorageError> {
    let base = normalize_key_reserving(key, SUFFIX_RESERVE)?;
    let chunks = split_chunks(value);

    router
        .set(&format!("{base}_chunks"), &chunks.len().to_string())
        .await?;
    for (i, chunk) in chunks.iter().enumerate() {
        router.set(&format!("{base}_chunk_{i}"), chunk).await?;
    }
    Ok(())
}

/// Reassemble a chunked value. Returns `None` if the count record or any
/// chunk is missing or unreadable.
pub async fn get_chunked(
    router: &StorageRouter,
    key: &str,
) -> Result<Option<String>, StorageError> {
    let base = normalize_key_reserving(key, SUFFIX_RESERVE)?;

    let count = match router.get(&format!("{base}_chunks")).await? {
        Some(raw) => match raw.trim().parse::<usize>() {
            Ok(n) => n,
            Err(_) => {
                warn!(key = %base, "chunk count record is not a number: {raw:?}");
                return Ok(None);
            }
        },
        None => return Ok(None),
    };

    let mut value = String::with_capacity(count * CHUNK_SIZE);
    for i in 0..count {
        match router.get(&format!("{base}_chunk_{i}")).await? {
            Some(chunk) => value.push_str(&chunk),
            None => {
                warn!(key = %base, chunk = i, "missing chunk, value unrecoverable");
                return Ok(None);
            }
        }
    }
    Ok(Some(value))
}

/// Remove a chunked value and its count record. Best-effort.
pub async fn delete_chunked(router: &StorageRouter, key: &str) -> Result<(), StorageError> {
    let base = normalize_key_reserving(key, SUFFIX_RESERVE)?;
    let count = match router.get(&format!("{base}_chunks")).await? {
        Some(raw) => raw.trim().parse::<usize>().unwrap_or(0),
        None => 0,
    };
    for i in 0..count {
        router.delete(&format!("{base}_chunk_{i}")).await?;
    }
    router.delete(&format!("{base}_chunks")).await
}

/// Split on char boundaries so no chunk exceeds [`CHUNK_SIZE`] bytes.
fn split_chunks(value: &str) -> Vec<String> {
    if value.is_empty() {
        return vec![String::new()];
    }
    let mut chunks = Vec::new();
    let mut current = String::with_capacity(CHUNK_SIZE);
    for c in value.chars() {
        if current.len() + c.len_utf8() > CHUNK_SIZE {
            chunks.push(std::mem::replace(
                &mut current,
                String::with_capacity(CHUNK_SIZE),
            ));
        }
        current.push(c);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn split_respects_size_and_boundaries() {
        let value = "ش".repeat(3000); // 2 bytes per char
        let chunks = split_chunks(&value);
        assert!(chunks.iter().all(|c| c.len() <= CHUNK_SIZE));
        let rejoined: String = chunks.concat();
        assert_eq!(rejoined, value);
    }

    #[test]
    fn split_empty_value_is_one_empty_chunk() {
        assert_eq!(split_chunks(""), vec![String::new()]);
    }

    #[tokio::test]
    async fn chunked_roundtrip() {
        let dir = TempDir::new().unwrap();
        let router = StorageRouter::on_disk(dir.path());
        let value = "abc".repeat(4000); // 12000 bytes → 6 chunks

        set_chunked(&router, "bigval", &value).await.unwrap();
        let back = get_chunked(&router, "bigval").await.unwrap();
        assert_eq!(back, Some(value));
    }

    #[tokio::test]
    async fn missing_chunk_fails_soft() {
        let dir = TempDir::new().unwrap();
        let router = StorageRouter::on_disk(dir.path());
        let value = "abc".repeat(4000);

        set_chunked(&router, "bigval", &value).await.unwrap();
        router.delete("bigval_chunk_2").await.unwrap();

        assert_eq!(get_chunked(&router, "bigval").await.unwrap(), None);
    }

    #[tokio::test]
    async fn absent_value_is_none() {
        let dir = TempDir::new().unwrap();
        let router = StorageRouter::on_disk(dir.path());
        assert_eq!(get_chunked(&router, "nothing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_chunked_removes_everything() {
        let dir = TempDir::new().unwrap();
        let router = StorageRouter::on_disk(dir.path());
        let value = "abc".repeat(4000);

        set_chunked(&router, "bigval", &value).await.unwrap();
        delete_chunked(&router, "bigval").await.unwrap();
        assert_eq!(get_chunked(&router, "bigval").await.unwrap(), None);
    }
}
