// crates/sync/src/lib.rs
//! Remote reconciliation: the analysis API client, the per-install device
//! identity, and the local-priority sync coordinator.

pub mod backend;
pub mod coordinator;
pub mod device;
pub mod error;
pub mod http;

pub use backend::{normalize_session_id, AnalysisBackend};
pub use coordinator::{SyncConfig, SyncCoordinator};
pub use device::DeviceIdentity;
pub use error::ApiError;
pub use http::{HttpAnalysisBackend, HttpFileCache};
