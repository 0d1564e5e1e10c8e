// crates/sessions/src/error.rs
use mizan_storage::StorageError;
use thiserror::Error;

/// Errors surfaced by the session repository.
#[derive(Debug, Error)]
pub enum RepoError {
    /// Caller bug: bad input to a repository call. Never retried.
    #[error("Validation failed: {reason}")]
    Validation { reason: String },

    #[error("Storage backend error: {0}")]
    Storage(#[from] StorageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RepoError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }
}

/// Reject empty/whitespace session ids before touching storage.
pub fn require_session_id(id: &str) -> Result<(), RepoError> {
    if id.trim().is_empty() {
        return Err(RepoError::validation("session id is empty"));
    }
    Ok(())
}
