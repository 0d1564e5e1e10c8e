// crates/sessions/src/keys.rs
//! Persisted key layout. Multiple indexes exist for historical reasons and
//! are kept independently consistent; union/dedup on read is mandatory.

pub const SESSIONS_INDEX: &str = "sessions_index";
pub const OFFLINE_INDEX: &str = "offline_analyses_index";

/// Cap of the general sessions index.
pub const SESSIONS_INDEX_CAP: usize = 100;
/// Cap of the offline-analyses index.
pub const OFFLINE_INDEX_CAP: usize = 50;
/// Cap of the device-scoped session list.
pub const DEVICE_INDEX_CAP: usize = 50;

pub fn session_key(id: &str) -> String {
    format!("session_{id}")
}

pub fn offline_key(session_id: &str) -> String {
    format!("offline_analysis_{session_id}")
}

pub fn offline_summary_id(session_id: &str) -> String {
    format!("offline_{session_id}")
}

pub fn restoration_key(session_id: &str) -> String {
    format!("restoration_{session_id}")
}

pub fn device_index_key(device_id: &str) -> String {
    format!("device_sessions_{device_id}")
}
