// crates/types/src/wire.rs
//! Remote analysis API bodies, limited to the fields the core reads.
//!
//! The wire format is otherwise opaque; `#[serde(default)]` keeps parsing
//! tolerant of whatever else the server sends.

use serde::{Deserialize, Serialize};

use crate::session::AnalysisTerm;

/// `GET /session/{id}` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    #[serde(default)]
    pub analysis_results: Vec<AnalysisTerm>,
    #[serde(default)]
    pub analysis_timestamp: Option<String>,
    #[serde(default)]
    pub compliance_percentage: Option<f32>,
}

impl SessionStatus {
    /// Terminal success requires both the timestamp and a non-empty term
    /// list; a bare timestamp triggers one supplementary terms fetch before
    /// the poller concludes "not yet".
    pub fn is_complete(&self) -> bool {
        self.has_timestamp() && !self.analysis_results.is_empty()
    }

    pub fn has_timestamp(&self) -> bool {
        self.analysis_timestamp
            .as_deref()
            .is_some_and(|ts| !ts.is_empty())
    }
}

/// `POST /upload` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub session_id: String,
    #[serde(default)]
    pub analysis_results: Option<Vec<AnalysisTerm>>,
}
