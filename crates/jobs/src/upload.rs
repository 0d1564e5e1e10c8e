// crates/jobs/src/upload.rs
//! Background contract uploads.
//!
//! Uploads registered here survive process suspension: the record map is
//! persisted on every mutation and reloaded via [`BackgroundUploadTracker::restore`].
//! A successful upload hands the server-issued session id straight to the
//! job tracker, which takes over polling. Three failed attempts retire the
//! upload with a failure notification.

use std::collections::HashMap;
use std::sync::Arc;

use mizan_storage::StorageRouter;
use mizan_sync::AnalysisBackend;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::notify::{Notification, NotificationScheduler};
use crate::record::{UploadRecord, ACTIVE_UPLOADS_KEY};
use crate::tracker::JobTracker;
use crate::wake::WakeLock;

/// Attempts per upload before it is retired.
const MAX_UPLOAD_RETRIES: u32 = 3;

pub struct BackgroundUploadTracker {
    backend: Arc<dyn AnalysisBackend>,
    store: Arc<StorageRouter>,
    jobs: Arc<JobTracker>,
    notifier: Arc<dyn NotificationScheduler>,
    wake: Arc<WakeLock>,
    uploads: Mutex<HashMap<String, UploadRecord>>,
}

impl BackgroundUploadTracker {
    pub fn new(
        backend: Arc<dyn AnalysisBackend>,
        store: Arc<StorageRouter>,
        jobs: Arc<JobTracker>,
        notifier: Arc<dyn NotificationScheduler>,
        wake: Arc<WakeLock>,
    ) -> Self {
        Self {
            backend,
            store,
            jobs,
            notifier,
            wake,
            uploads: Mutex::new(HashMap::new()),
        }
    }

    /// Track a new upload. `session_id` is the locally-minted placeholder
    /// id; the server issues the real one on success.
    pub async fn register_upload(
        &self,
        session_id: &str,
        file_path: &str,
        file_name: &str,
    ) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let record = UploadRecord {
            id: id.clone(),
            session_id: session_id.to_string(),
            file_path: file_path.to_string(),
            file_name: file_name.to_string(),
            started_at: chrono::Utc::now().to_rfc3339(),
            retry_count: 0,
        };
        {
            let mut uploads = self.uploads.lock().await;
            uploads.insert(id.clone(), record);
            self.persist(&uploads).await;
        }
        self.wake.acquire();
        info!(upload_id = %id, %session_id, "background upload registered");
        id
    }

    /// Attempt every pending upload once. Successes hand off to the job
    /// tracker; failures age toward the retry cap.
    pub async fn process_pending(&self) {
        let pending: Vec<UploadRecord> =
            self.uploads.lock().await.values().cloned().collect();
        for record in pending {
            self.attempt(record).await;
        }
    }

    pub async fn pending_uploads(&self) -> Vec<UploadRecord> {
        self.uploads.lock().await.values().cloned().collect()
    }

    /// Reload uploads persisted by a previous process.
    pub async fn restore(&self) {
        let raw = match self.store.get(ACTIVE_UPLOADS_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return,
            Err(e) => {
                warn!("persisted upload map unreadable: {e}");
                return;
            }
        };
        let records: HashMap<String, UploadRecord> = match serde_json::from_str(&raw) {
            Ok(records) => records,
            Err(e) => {
                warn!("persisted upload map malformed: {e}");
                return;
            }
        };
        let mut restored = 0usize;
        {
            let mut uploads = self.uploads.lock().await;
            for (id, record) in records {
                if uploads.contains_key(&id) {
                    continue;
                }
                uploads.insert(id, record);
                restored += 1;
            }
        }
        for _ in 0..restored {
            self.wake.acquire();
        }
        if restored > 0 {
            info!(restored, "restored persisted background uploads");
        }
    }

    async fn attempt(&self, record: UploadRecord) {
        let bytes = match tokio::fs::read(&record.file_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(upload_id = %record.id, path = %record.file_path, "upload source unreadable: {e}");
                // An unreadable file will not heal itself; count it as a
                // failed attempt.
                self.record_failure(&record.id).await;
                return;
            }
        };

        match self.backend.upload_contract(&record.file_name, bytes).await {
            Ok(receipt) => {
                self.remove(&record.id).await;
                info!(
                    upload_id = %record.id,
                    session_id = %receipt.session_id,
                    "upload accepted, handing off to polling"
                );
                self.jobs.start_analysis(&receipt.session_id).await;
                self.wake.release();
            }
            Err(e) => {
                warn!(upload_id = %record.id, "upload attempt failed: {e}");
                self.record_failure(&record.id).await;
            }
        }
    }

    async fn record_failure(&self, upload_id: &str) {
        let retired = {
            let mut uploads = self.uploads.lock().await;
            let Some(record) = uploads.get_mut(upload_id) else {
                return;
            };
            record.retry_count += 1;
            let retired = if record.retry_count >= MAX_UPLOAD_RETRIES {
                uploads.remove(upload_id)
            } else {
                None
            };
            self.persist(&uploads).await;
            retired
        };

        if let Some(record) = retired {
            warn!(upload_id = %record.id, "upload retired after {} attempts", record.retry_count);
            self.notifier
                .schedule(Notification {
                    title: "Upload failed".to_string(),
                    body: format!("{} could not be uploaded. Please try again.", record.file_name),
                    data: serde_json::json!({
                        "session_id": record.session_id,
                        "outcome": "upload_failed",
                    }),
                })
                .await;
            self.wake.release();
        }
    }

    async fn remove(&self, upload_id: &str) {
        let mut uploads = self.uploads.lock().await;
        uploads.remove(upload_id);
        self.persist(&uploads).await;
    }

    async fn persist(&self, uploads: &HashMap<String, UploadRecord>) {
        match serde_json::to_string(uploads) {
            Ok(json) => {
                if let Err(e) = self.store.set(ACTIVE_UPLOADS_KEY, &json).await {
                    warn!("upload map persistence failed: {e}");
                }
            }
            Err(e) => warn!("upload map serialization failed: {e}"),
        }
    }
}
