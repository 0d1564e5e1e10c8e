// crates/app/src/services.rs
//! Composition root: wires storage, sessions, sync, and job tracking into
//! one facade the embedding application talks to.

use std::sync::Arc;

use anyhow::Context;
use mizan_jobs::{
    BackgroundUploadTracker, JobTracker, JobTrackerConfig, LifecycleBus, NoopWakeSink,
    NotificationScheduler, TracingNotifier, WakeLock, WakeSink,
};
use mizan_sessions::{
    AnalyticsAggregator, AnalyticsReport, RepoError, SessionRepository,
};
use mizan_storage::StorageRouter;
use mizan_sync::{
    AnalysisBackend, DeviceIdentity, HttpAnalysisBackend, HttpFileCache, SyncConfig,
    SyncCoordinator,
};
use mizan_types::{OfflineAnalysisSummary, Session};
use tracing::info;

use crate::config::CoreConfig;

/// Key under which the embedder stashes the API bearer token.
pub const AUTH_TOKEN_KEY: &str = "auth_token";

/// Everything a host application needs, built once at startup.
pub struct CoreServices {
    store: Arc<StorageRouter>,
    repo: Arc<SessionRepository>,
    backend: Arc<dyn AnalysisBackend>,
    analytics: AnalyticsAggregator,
    sync: SyncCoordinator,
    lifecycle: LifecycleBus,
    jobs: Arc<JobTracker>,
    uploads: BackgroundUploadTracker,
    device_id: String,
}

impl CoreServices {
    /// Build with the default platform adapters: log-only notifications
    /// and no keep-awake integration.
    pub async fn init(config: CoreConfig) -> anyhow::Result<Self> {
        Self::init_with(config, Arc::new(TracingNotifier), Arc::new(NoopWakeSink)).await
    }

    /// Build with host-provided notification and keep-awake adapters.
    pub async fn init_with(
        config: CoreConfig,
        notifier: Arc<dyn NotificationScheduler>,
        wake_sink: Arc<dyn WakeSink>,
    ) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&config.data_dir)
            .await
            .with_context(|| format!("creating data dir {}", config.data_dir.display()))?;

        let store = Arc::new(StorageRouter::on_disk(&config.data_dir));

        let device = Arc::new(DeviceIdentity::new(Arc::clone(&store)));
        let device_id = device.get_or_create().await;

        let auth_token = store.get(AUTH_TOKEN_KEY).await.ok().flatten();
        let backend: Arc<dyn AnalysisBackend> =
            Arc::new(HttpAnalysisBackend::new(&config.api_base_url, auth_token));

        let file_cache = Arc::new(HttpFileCache::new(config.contracts_dir()));
        let repo = Arc::new(SessionRepository::new(
            Arc::clone(&store),
            file_cache,
            device_id.clone(),
        ));
        let analytics = AnalyticsAggregator::new(Arc::clone(&repo));
        let sync = SyncCoordinator::new(
            Arc::clone(&repo),
            device,
            SyncConfig {
                probe_url: config.probe_url.clone(),
                probe_timeout: config.probe_timeout,
            },
        );

        let lifecycle = LifecycleBus::new();
        let wake = Arc::new(WakeLock::new(wake_sink));
        let jobs = JobTracker::new(
            Arc::clone(&backend),
            Arc::clone(&repo),
            Arc::clone(&store),
            Arc::clone(&notifier),
            Arc::clone(&wake),
            lifecycle.subscribe(),
            JobTrackerConfig::default(),
        );
        let uploads = BackgroundUploadTracker::new(
            Arc::clone(&backend),
            Arc::clone(&store),
            Arc::clone(&jobs),
            notifier,
            wake,
        );

        // Pick up work interrupted by the previous process.
        jobs.restore_persisted_jobs().await;
        uploads.restore().await;

        info!(%device_id, data_dir = %config.data_dir.display(), "core services initialized");
        Ok(Self {
            store,
            repo,
            backend,
            analytics,
            sync,
            lifecycle,
            jobs,
            uploads,
            device_id,
        })
    }

    // Session persistence.

    pub async fn store_session(&self, session: &Session) -> Result<(), RepoError> {
        self.repo.store(session).await
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<Session>, RepoError> {
        self.repo.get(session_id).await
    }

    pub async fn get_all_sessions(&self) -> Vec<Session> {
        self.repo.get_all().await
    }

    pub async fn remove_session(&self, session_id: &str) -> Result<(), RepoError> {
        self.jobs.stop_analysis(session_id).await;
        self.repo.remove(session_id).await
    }

    pub async fn clear_all_sessions(&self) -> Result<(), RepoError> {
        for id in self.jobs.active_jobs().await {
            self.jobs.stop_analysis(&id).await;
        }
        self.repo.clear_all().await
    }

    pub async fn get_offline_analyses(&self) -> Vec<OfflineAnalysisSummary> {
        self.repo.get_all_offline_analyses().await
    }

    // Analysis jobs.

    pub async fn start_analysis(&self, session_id: &str) {
        self.jobs.start_analysis(session_id).await;
    }

    pub async fn stop_analysis(&self, session_id: &str) {
        self.jobs.stop_analysis(session_id).await;
    }

    pub async fn is_analyzing(&self, session_id: &str) -> bool {
        self.jobs.is_analyzing(session_id).await
    }

    pub async fn active_jobs(&self) -> Vec<String> {
        self.jobs.active_jobs().await
    }

    // Uploads.

    pub async fn register_upload(
        &self,
        session_id: &str,
        file_path: &str,
        file_name: &str,
    ) -> String {
        self.uploads
            .register_upload(session_id, file_path, file_name)
            .await
    }

    pub async fn process_pending_uploads(&self) {
        self.uploads.process_pending().await;
    }

    // Sync.

    pub async fn sync_with_backend(&self) -> bool {
        self.sync.sync_with_backend(self.backend.as_ref()).await
    }

    pub async fn get_sessions_offline_first(&self) -> Vec<Session> {
        self.sync
            .get_sessions_offline_first(Some(self.backend.as_ref()))
            .await
    }

    pub async fn check_connectivity(&self) -> bool {
        self.sync.check_connectivity().await
    }

    /// Teardown: stop every poll loop and detach the lifecycle listener.
    /// The facade is not usable afterwards.
    pub async fn shutdown(&self) {
        self.jobs.cleanup().await;
    }

    // Cross-cutting accessors.

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub async fn analytics_report(&self) -> AnalyticsReport {
        self.analytics.report().await
    }

    pub fn lifecycle(&self) -> &LifecycleBus {
        &self.lifecycle
    }

    pub fn storage(&self) -> &Arc<StorageRouter> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> CoreConfig {
        CoreConfig {
            data_dir: dir.path().to_path_buf(),
            ..CoreConfig::default()
        }
    }

    #[tokio::test]
    async fn device_id_is_stable_across_restarts() {
        let dir = TempDir::new().unwrap();

        let first = CoreServices::init(config_in(&dir)).await.unwrap();
        let id = first.device_id().to_string();
        assert!(id.starts_with("device_"));
        drop(first);

        let second = CoreServices::init(config_in(&dir)).await.unwrap();
        assert_eq!(second.device_id(), id);
    }

    #[tokio::test]
    async fn session_facade_round_trip() {
        let dir = TempDir::new().unwrap();
        let core = CoreServices::init(config_in(&dir)).await.unwrap();

        let mut session = Session::processing("abc", "contract.pdf");
        session.is_processing = false;
        core.store_session(&session).await.unwrap();

        let loaded = core.get_session("abc").await.unwrap().unwrap();
        assert_eq!(loaded.original_filename, "contract.pdf");
        assert_eq!(core.get_all_sessions().await.len(), 1);

        core.remove_session("abc").await.unwrap();
        assert!(core.get_session("abc").await.unwrap().is_none());
        assert!(core.get_all_sessions().await.is_empty());
    }

    #[tokio::test]
    async fn clear_all_leaves_an_empty_collection() {
        let dir = TempDir::new().unwrap();
        let core = CoreServices::init(config_in(&dir)).await.unwrap();

        for i in 0..3 {
            let mut s = Session::processing(format!("s{i}"), "c.pdf");
            s.is_processing = false;
            core.store_session(&s).await.unwrap();
        }
        assert_eq!(core.get_all_sessions().await.len(), 3);

        core.clear_all_sessions().await.unwrap();
        assert!(core.get_all_sessions().await.is_empty());
        assert!(core.get_offline_analyses().await.is_empty());
    }

    #[tokio::test]
    async fn analytics_reflect_stored_sessions() {
        let dir = TempDir::new().unwrap();
        let core = CoreServices::init(config_in(&dir)).await.unwrap();

        let mut done = Session::processing("done", "a.pdf");
        done.is_processing = false;
        done.analysis_timestamp = Some("2026-08-01T00:00:00Z".into());
        done.analysis_results.push(mizan_types::AnalysisTerm {
            term_id: "t".into(),
            term_text: "clause".into(),
            is_valid_sharia: true,
            sharia_issue: None,
            expert_validated: None,
            is_user_confirmed: None,
        });
        core.store_session(&done).await.unwrap();
        core.store_session(&Session::processing("pending", "b.pdf"))
            .await
            .unwrap();

        let report = core.analytics_report().await;
        assert_eq!(report.total_sessions, 2);
        assert_eq!(report.completed_sessions, 1);
        assert_eq!(report.pending_sessions, 1);
    }
}
