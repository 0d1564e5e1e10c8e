// crates/sync/src/error.rs
use thiserror::Error;

/// Message fragments the server uses for unknown sessions. The API returns
/// localized error text, so both languages must match. Kept alongside the
/// structured 404 check as a compatibility fallback for endpoints that
/// answer 200/500 with a message body.
const NOT_FOUND_PATTERNS: [&str; 3] = [
    "session not found",
    "الجلسة غير موجودة",
    "لم يتم العثور على الجلسة",
];

/// Errors from the remote analysis API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP {status} from {endpoint}: {message}")]
    Status {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Malformed response body: {0}")]
    Body(#[from] serde_json::Error),
}

impl ApiError {
    /// Whether this error means the server does not know the session.
    /// Status 404 is authoritative; otherwise fall back to matching the
    /// known message text in either language.
    pub fn is_not_found(&self) -> bool {
        match self {
            ApiError::Status {
                status, message, ..
            } => {
                if *status == 404 {
                    return true;
                }
                let lowered = message.to_lowercase();
                NOT_FOUND_PATTERNS.iter().any(|p| lowered.contains(p))
            }
            _ => false,
        }
    }
}
