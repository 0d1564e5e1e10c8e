// crates/storage/src/key.rs
//! Key normalization for the most restrictive backend.
//!
//! The secure store is keychain-backed on device and rejects exotic keys,
//! so every key is sanitized once at the router boundary: disallowed
//! characters become `_`, a leading digit gets a prefix, and overlong keys
//! are truncated with a marker suffix.

use crate::error::StorageError;

/// Hard cap from the secure store's key-length limit.
pub const MAX_KEY_LEN: usize = 100;

/// Suffix appended when a key had to be truncated.
const TRUNCATION_MARKER: &str = "_tr";

/// Sanitize a raw key, rejecting keys that are empty after trimming.
pub fn normalize_key(raw: &str) -> Result<String, StorageError> {
    normalize_key_reserving(raw, 0)
}

/// Like [`normalize_key`] but leaves `reserve` bytes of headroom under the
/// length cap, for callers that append their own suffixes (chunking).
pub fn normalize_key_reserving(raw: &str, reserve: usize) -> Result<String, StorageError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(StorageError::invalid_key("key is empty"));
    }

    let mut key: String = trimmed
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if key.starts_with(|c: char| c.is_ascii_digit()) {
        key.insert_str(0, "k_");
    }

    let cap = MAX_KEY_LEN.saturating_sub(reserve);
    if key.len() > cap {
        // All chars are ASCII after sanitization, so byte truncation is safe.
        key.truncate(cap.saturating_sub(TRUNCATION_MARKER.len()));
        key.push_str(TRUNCATION_MARKER);
    }

    Ok(key)
}
