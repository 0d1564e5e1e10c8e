// crates/sync/src/backend.rs
//! The remote analysis API seam.
//!
//! The job tracker and sync coordinator talk to this trait, never to
//! reqwest directly, so tests can drive the polling state machine with a
//! scripted backend.

use async_trait::async_trait;
use mizan_types::{AnalysisTerm, Session, SessionStatus, UploadReceipt};

use crate::error::ApiError;

/// Remote analysis service operations the core consumes.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// `GET /session/{id}` - status of one analysis.
    async fn session_status(&self, session_id: &str) -> Result<SessionStatus, ApiError>;

    /// `GET /session/{id}/terms` - supplementary term fetch for sessions
    /// whose status carries a timestamp but no results yet.
    async fn session_terms(&self, session_id: &str) -> Result<Vec<AnalysisTerm>, ApiError>;

    /// `POST /upload` - multipart contract upload.
    async fn upload_contract(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadReceipt, ApiError>;

    /// `GET /sessions?device_id=` - the remote session collection for one
    /// install.
    async fn sessions_for_device(&self, device_id: &str) -> Result<Vec<Session>, ApiError>;

    /// `POST /save-session` - upload one local session.
    async fn save_session(&self, session: &Session) -> Result<(), ApiError>;

    /// Existence probe: succeeds iff the server knows the session. Used
    /// for the early not-found short-circuit.
    async fn probe_session(&self, session_id: &str) -> Result<(), ApiError>;
}

/// Normalize a possibly-prefixed temporary id to the server's bare form.
///
/// Strips `session_` only when the remainder is UUID-shaped; locally
/// minted `session_<ts>_<random>` ids are not, and go through unchanged.
pub fn normalize_session_id(session_id: &str) -> &str {
    if let Some(rest) = session_id.strip_prefix("session_") {
        if uuid::Uuid::parse_str(rest).is_ok() {
            return rest;
        }
    }
    session_id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_prefix_from_uuid_shaped_ids() {
        let id = "session_6fa459ea-ee8a-3ca4-894e-db77e160355e";
        assert_eq!(
            normalize_session_id(id),
            "6fa459ea-ee8a-3ca4-894e-db77e160355e"
        );
    }

    #[test]
    fn keeps_locally_minted_ids_unchanged() {
        let id = "session_1724900000000_ab12cd34";
        assert_eq!(normalize_session_id(id), id);
    }

    #[test]
    fn keeps_bare_ids_unchanged() {
        assert_eq!(normalize_session_id("abc"), "abc");
        assert_eq!(
            normalize_session_id("6fa459ea-ee8a-3ca4-894e-db77e160355e"),
            "6fa459ea-ee8a-3ca4-894e-db77e160355e"
        );
    }
}
