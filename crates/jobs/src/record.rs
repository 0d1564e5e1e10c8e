// crates/jobs/src/record.rs
//! Durable job and upload state, serialized minus live handles so both
//! trackers can be reconstructed after process suspension.

use serde::{Deserialize, Serialize};

/// Key holding the serialized active-job map.
pub const ACTIVE_JOBS_KEY: &str = "active_analysis_jobs";
/// Key holding the serialized active-upload map.
pub const ACTIVE_UPLOADS_KEY: &str = "activeBackgroundUploads";
/// Key holding the OS background-processing registrations.
pub const ACTIVE_PROCESSING_KEY: &str = "activeBackgroundProcessing";

/// One tracked analysis, persisted without its polling handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub session_id: String,
    pub started_at: String,
    pub retry_count: u32,
    pub max_retries: u32,
}

impl JobRecord {
    pub fn new(session_id: impl Into<String>, max_retries: u32) -> Self {
        Self {
            session_id: session_id.into(),
            started_at: chrono::Utc::now().to_rfc3339(),
            retry_count: 0,
            max_retries,
        }
    }
}

/// One tracked background upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub id: String,
    pub session_id: String,
    pub file_path: String,
    pub file_name: String,
    pub started_at: String,
    pub retry_count: u32,
}
