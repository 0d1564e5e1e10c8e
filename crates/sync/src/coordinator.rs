// crates/sync/src/coordinator.rs
//! Local/remote reconciliation with local-priority conflict resolution.
//!
//! Local data always wins on id collision: no field-level merge is ever
//! performed. Sync is an enrichment - every entry point here degrades to
//! the local set rather than raising.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use mizan_sessions::SessionRepository;
use mizan_types::Session;
use tracing::{info, warn};

use crate::backend::AnalysisBackend;
use crate::device::DeviceIdentity;

/// Coordinator knobs; defaults match production behavior.
pub struct SyncConfig {
    /// Well-known endpoint for the connectivity probe.
    pub probe_url: String,
    /// Probe budget; an unanswered HEAD within this window means offline.
    pub probe_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            probe_url: "https://clients3.google.com/generate_204".to_string(),
            probe_timeout: Duration::from_secs(2),
        }
    }
}

pub struct SyncCoordinator {
    repo: Arc<SessionRepository>,
    device: Arc<DeviceIdentity>,
    config: SyncConfig,
    probe_client: reqwest::Client,
}

impl SyncCoordinator {
    pub fn new(
        repo: Arc<SessionRepository>,
        device: Arc<DeviceIdentity>,
        config: SyncConfig,
    ) -> Self {
        Self {
            repo,
            device,
            config,
            probe_client: reqwest::Client::new(),
        }
    }

    /// One fetch-merge-upload cycle against the remote collection.
    ///
    /// Returns false when the remote fetch fails (no partial application);
    /// individual per-session store/upload failures are logged and do not
    /// abort the cycle.
    pub async fn sync_with_backend(&self, backend: &dyn AnalysisBackend) -> bool {
        let device_id = self.device.get_or_create().await;

        let remote = match backend.sessions_for_device(&device_id).await {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!(%device_id, "remote session fetch failed, skipping sync cycle: {e}");
                return false;
            }
        };

        let local = self.repo.get_all().await;
        let local_ids: HashSet<&str> = local.iter().map(|s| s.session_id.as_str()).collect();
        let remote_ids: HashSet<&str> = remote.iter().map(|s| s.session_id.as_str()).collect();

        // Remote → local, new-to-local items only. Collisions leave the
        // local record untouched.
        let mut pulled = 0usize;
        for session in &remote {
            if local_ids.contains(session.session_id.as_str()) {
                continue;
            }
            match self.repo.store(session).await {
                Ok(()) => pulled += 1,
                Err(e) => {
                    warn!(session_id = %session.session_id, "failed to persist remote session: {e}")
                }
            }
        }

        // Local → remote, each upload independent and best-effort.
        let mut pushed = 0usize;
        for session in &local {
            if remote_ids.contains(session.session_id.as_str()) {
                continue;
            }
            match backend.save_session(session).await {
                Ok(()) => pushed += 1,
                Err(e) => {
                    warn!(session_id = %session.session_id, "session upload failed, continuing: {e}")
                }
            }
        }

        info!(%device_id, pulled, pushed, "sync cycle finished");
        true
    }

    /// HEAD probe against a well-known endpoint. Any exception, including
    /// the 2-second timeout, reads as offline.
    pub async fn check_connectivity(&self) -> bool {
        let probe = self.probe_client.head(&self.config.probe_url).send();
        match tokio::time::timeout(self.config.probe_timeout, probe).await {
            Ok(Ok(resp)) => resp.status().is_success(),
            Ok(Err(e)) => {
                warn!("connectivity probe failed: {e}");
                false
            }
            Err(_) => {
                warn!("connectivity probe timed out");
                false
            }
        }
    }

    /// Local-first read: the local set is always loaded, and a sync cycle
    /// only runs when a backend is supplied and the connectivity probe
    /// passes. Never raises, never blocks past the probe timeout plus one
    /// sync cycle.
    pub async fn get_sessions_offline_first(
        &self,
        backend: Option<&dyn AnalysisBackend>,
    ) -> Vec<Session> {
        let local = self.repo.get_all().await;

        let Some(backend) = backend else {
            return local;
        };
        if !self.check_connectivity().await {
            info!("offline, serving local sessions only");
            return local;
        }
        if self.sync_with_backend(backend).await {
            return self.repo.get_all().await;
        }
        local
    }
}
