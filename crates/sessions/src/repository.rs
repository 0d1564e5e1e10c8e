// crates/sessions/src/repository.rs
//! The session repository: arena records plus capped indexes.
//!
//! Failure semantics: validation errors surface synchronously; write paths
//! propagate storage errors so the UI can alert; read paths degrade to
//! empty with a warning, on the grounds that an empty history is
//! preferable to crashing the caller. Index updates are serialized behind
//! one mutex so concurrent stores cannot lose each other's insertions.

use std::sync::Arc;

use mizan_storage::StorageRouter;
use mizan_types::{OfflineAnalysisSummary, RestorationRecord, Session};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{require_session_id, RepoError};
use crate::file_cache::FileCache;
use crate::index;
use crate::keys::{
    device_index_key, offline_key, restoration_key, session_key, DEVICE_INDEX_CAP,
    OFFLINE_INDEX_CAP, SESSIONS_INDEX, SESSIONS_INDEX_CAP,
};
use crate::summarize::build_summary;

pub struct SessionRepository {
    store: Arc<StorageRouter>,
    file_cache: Arc<dyn FileCache>,
    device_id: String,
    /// Serializes index read-modify-write across concurrent stores.
    index_lock: Mutex<()>,
}

impl SessionRepository {
    pub fn new(
        store: Arc<StorageRouter>,
        file_cache: Arc<dyn FileCache>,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            file_cache,
            device_id: device_id.into(),
            index_lock: Mutex::new(()),
        }
    }

    /// Persist a session and update every derived structure.
    ///
    /// Sub-steps are independent side effects executed in order: the arena
    /// record, the two indexes, the offline summary, and the restoration
    /// breadcrumb. A failure partway does not undo earlier writes; the
    /// first error encountered is surfaced after all steps have been
    /// attempted.
    pub async fn store(&self, session: &Session) -> Result<(), RepoError> {
        require_session_id(&session.session_id)?;
        let id = &session.session_id;

        let mut first_err: Option<RepoError> = None;
        let mut note = |e: RepoError| {
            warn!(session_id = %id, "store sub-step failed: {e}");
            if first_err.is_none() {
                first_err = Some(e);
            }
        };

        // Arena record. Session payloads routinely exceed the secure-store
        // ceiling, so they are forced to the unlimited backend.
        let json = serde_json::to_string(session)?;
        if let Err(e) = self.store.set_unrouted(&session_key(id), &json).await {
            note(e.into());
        }

        // Index updates, serialized.
        {
            let _guard = self.index_lock.lock().await;
            if let Err(e) = index::head_insert(
                &self.store,
                &device_index_key(&self.device_id),
                id,
                DEVICE_INDEX_CAP,
            )
            .await
            {
                note(e.into());
            }
            if let Err(e) =
                index::head_insert(&self.store, SESSIONS_INDEX, id, SESSIONS_INDEX_CAP).await
            {
                note(e.into());
            }
        }

        // Offline summary (skips itself when no document path resolves).
        if let Err(e) = self.store_offline_analysis(session, None).await {
            note(e);
        }

        // Restoration breadcrumb.
        let breadcrumb = RestorationRecord {
            session_id: id.clone(),
            original_filename: session.original_filename.clone(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        };
        match serde_json::to_string(&breadcrumb) {
            Ok(json) => {
                if let Err(e) = self.store.set(&restoration_key(id), &json).await {
                    note(e.into());
                }
            }
            Err(e) => note(e.into()),
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Derive and persist the offline analysis summary for a session.
    ///
    /// Path resolution for the source document: the supplied path, else a
    /// fetch-and-cache of the remote document, else the remote URL string
    /// itself. With no path of any kind the summary is skipped entirely,
    /// logged but not fatal.
    pub async fn store_offline_analysis(
        &self,
        session: &Session,
        local_pdf_path: Option<String>,
    ) -> Result<(), RepoError> {
        require_session_id(&session.session_id)?;

        let resolved = match local_pdf_path {
            Some(path) => Some(path),
            None => match &session.contract_url {
                Some(url) => match self.file_cache.download(url).await {
                    Some(cached) => Some(cached),
                    None => Some(url.clone()),
                },
                None => None,
            },
        };
        let Some(path) = resolved else {
            info!(
                session_id = %session.session_id,
                "no document path resolvable, skipping offline summary"
            );
            return Ok(());
        };

        let summary = build_summary(session, Some(path));
        let json = serde_json::to_string(&summary)?;
        self.store
            .set(&offline_key(&session.session_id), &json)
            .await?;

        let _guard = self.index_lock.lock().await;
        index::head_insert(
            &self.store,
            crate::keys::OFFLINE_INDEX,
            &session.session_id,
            OFFLINE_INDEX_CAP,
        )
        .await?;
        Ok(())
    }

    /// Fetch one session. Absence anywhere is `None`, never an error;
    /// corrupt payloads are logged and read as absent.
    pub async fn get(&self, session_id: &str) -> Result<Option<Session>, RepoError> {
        require_session_id(session_id)?;
        let raw = self
            .store
            .get_unrouted_first(&session_key(session_id))
            .await?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        match serde_json::from_str::<Session>(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!(%session_id, "stored session is unreadable: {e}");
                Ok(None)
            }
        }
    }

    /// All sessions listed by the general index. Individual missing or
    /// corrupt entries are skipped with a warning, never failing the call.
    pub async fn get_all(&self) -> Vec<Session> {
        let ids = index::read_index(&self.store, SESSIONS_INDEX).await;
        let mut sessions = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get(&id).await {
                Ok(Some(session)) => sessions.push(session),
                Ok(None) => warn!(session_id = %id, "indexed session missing, skipping"),
                Err(e) => warn!(session_id = %id, "indexed session unreadable, skipping: {e}"),
            }
        }
        sessions
    }

    /// All offline summaries, most recent first. Invalid or unfetchable
    /// entries are pruned from the index as a side effect.
    pub async fn get_all_offline_analyses(&self) -> Vec<OfflineAnalysisSummary> {
        let ids = index::read_index(&self.store, crate::keys::OFFLINE_INDEX).await;
        let mut summaries = Vec::with_capacity(ids.len());
        let mut keep = Vec::with_capacity(ids.len());

        for id in &ids {
            let raw = match self.store.get_unrouted_first(&offline_key(id)).await {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    warn!(session_id = %id, "offline summary missing, pruning from index");
                    continue;
                }
                Err(e) => {
                    warn!(session_id = %id, "offline summary unreadable, pruning: {e}");
                    continue;
                }
            };
            match serde_json::from_str::<OfflineAnalysisSummary>(&raw) {
                Ok(summary) if summary.is_valid() => {
                    keep.push(id.clone());
                    summaries.push(summary);
                }
                Ok(_) => warn!(session_id = %id, "offline summary invalid, pruning"),
                Err(e) => warn!(session_id = %id, "offline summary malformed, pruning: {e}"),
            }
        }

        if keep.len() != ids.len() {
            let _guard = self.index_lock.lock().await;
            if let Err(e) = index::write_index(&self.store, crate::keys::OFFLINE_INDEX, &keep).await
            {
                warn!("failed to rewrite pruned offline index: {e}");
            }
        }

        summaries.sort_by(|a, b| b.analyzed_at.cmp(&a.analyzed_at));
        summaries
    }

    /// Delete a session, its summary, its breadcrumb, and its index
    /// entries. Best-effort cleanup, not a transaction: partial failures
    /// are logged and do not roll back earlier deletions.
    pub async fn remove(&self, session_id: &str) -> Result<(), RepoError> {
        require_session_id(session_id)?;

        for key in [
            session_key(session_id),
            offline_key(session_id),
            restoration_key(session_id),
        ] {
            if let Err(e) = self.store.delete(&key).await {
                warn!(%session_id, %key, "delete failed, continuing: {e}");
            }
        }

        let _guard = self.index_lock.lock().await;
        if let Err(e) = index::remove_id(&self.store, SESSIONS_INDEX, session_id).await {
            warn!(%session_id, "sessions index cleanup failed: {e}");
        }
        if let Err(e) =
            index::remove_id(&self.store, crate::keys::OFFLINE_INDEX, session_id).await
        {
            warn!(%session_id, "offline index cleanup failed: {e}");
        }
        if let Err(e) = index::remove_id(
            &self.store,
            &device_index_key(&self.device_id),
            session_id,
        )
        .await
        {
            warn!(%session_id, "device index cleanup failed: {e}");
        }
        Ok(())
    }

    /// Remove every session listed by the general index, then drop both
    /// index keys outright. Individual failures are logged, not fatal.
    pub async fn clear_all(&self) -> Result<(), RepoError> {
        let ids = index::read_index(&self.store, SESSIONS_INDEX).await;
        for id in &ids {
            for key in [session_key(id), offline_key(id), restoration_key(id)] {
                if let Err(e) = self.store.delete(&key).await {
                    warn!(session_id = %id, %key, "bulk delete failed, continuing: {e}");
                }
            }
        }

        let _guard = self.index_lock.lock().await;
        self.store.delete(SESSIONS_INDEX).await?;
        self.store.delete(crate::keys::OFFLINE_INDEX).await?;
        info!(cleared = ids.len(), "session history cleared");
        Ok(())
    }

    /// Head-insert a session id into the indexes without writing a record.
    /// Used by the job tracker when an analysis begins.
    pub async fn touch_session_index(&self, session_id: &str) -> Result<(), RepoError> {
        require_session_id(session_id)?;
        let _guard = self.index_lock.lock().await;
        index::head_insert(&self.store, SESSIONS_INDEX, session_id, SESSIONS_INDEX_CAP).await?;
        index::head_insert(
            &self.store,
            &device_index_key(&self.device_id),
            session_id,
            DEVICE_INDEX_CAP,
        )
        .await?;
        Ok(())
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_cache::NoopFileCache;
    use crate::keys::OFFLINE_INDEX;
    use mizan_types::AnalysisTerm;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn repo(dir: &TempDir) -> SessionRepository {
        SessionRepository::new(
            Arc::new(StorageRouter::on_disk(dir.path())),
            Arc::new(NoopFileCache),
            "device_test",
        )
    }

    fn completed_session(id: &str) -> Session {
        let mut s = Session::processing(id, "contract.pdf");
        s.analysis_results = vec![AnalysisTerm {
            term_id: "t1".into(),
            term_text: "clause".into(),
            is_valid_sharia: true,
            sharia_issue: None,
            expert_validated: None,
            is_user_confirmed: None,
        }];
        s.analysis_timestamp = Some("2026-08-01T00:00:00Z".into());
        s.contract_url = Some("https://example.com/contract.pdf".into());
        s.is_processing = false;
        s
    }

    #[tokio::test]
    async fn store_then_get_roundtrips_deep_equal() {
        let dir = TempDir::new().unwrap();
        let repo = repo(&dir);
        let session = completed_session("abc");

        repo.store(&session).await.unwrap();
        let loaded = repo.get("abc").await.unwrap().unwrap();
        assert_eq!(loaded, session);
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let dir = TempDir::new().unwrap();
        let repo = repo(&dir);
        assert!(repo.get("no-such-id").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn get_empty_id_is_validation_error() {
        let dir = TempDir::new().unwrap();
        let repo = repo(&dir);
        assert!(matches!(
            repo.get("  ").await,
            Err(RepoError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn double_store_indexes_id_exactly_once() {
        let dir = TempDir::new().unwrap();
        let repo = repo(&dir);
        let session = completed_session("abc");

        repo.store(&session).await.unwrap();
        repo.store(&session).await.unwrap();

        let all = repo.get_all().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].session_id, "abc");
    }

    #[tokio::test]
    async fn index_cap_keeps_most_recent_hundred() {
        let dir = TempDir::new().unwrap();
        let repo = repo(&dir);

        for i in 0..101 {
            repo.store(&completed_session(&format!("s{i}"))).await.unwrap();
        }

        let router = StorageRouter::on_disk(dir.path());
        let ids = index::read_index(&router, SESSIONS_INDEX).await;
        assert_eq!(ids.len(), 100);
        assert_eq!(ids[0], "s100");
        assert!(!ids.contains(&"s0".to_string()));
    }

    #[tokio::test]
    async fn get_all_skips_missing_records() {
        let dir = TempDir::new().unwrap();
        let repo = repo(&dir);

        repo.store(&completed_session("a")).await.unwrap();
        repo.store(&completed_session("b")).await.unwrap();
        // Wipe b's arena record but leave the index entry.
        let router = StorageRouter::on_disk(dir.path());
        router.delete(&session_key("b")).await.unwrap();

        let all = repo.get_all().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].session_id, "a");
    }

    #[tokio::test]
    async fn offline_summaries_sorted_and_self_healing() {
        let dir = TempDir::new().unwrap();
        let repo = repo(&dir);

        let mut older = completed_session("older");
        older.analysis_timestamp = Some("2026-07-01T00:00:00Z".into());
        let mut newer = completed_session("newer");
        newer.analysis_timestamp = Some("2026-08-01T00:00:00Z".into());
        repo.store(&older).await.unwrap();
        repo.store(&newer).await.unwrap();

        // Corrupt one summary record; the next read should prune it.
        let router = StorageRouter::on_disk(dir.path());
        router.set(&offline_key("older"), "garbage").await.unwrap();

        let summaries = repo.get_all_offline_analyses().await;
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].session_id, "newer");

        let ids = index::read_index(&router, OFFLINE_INDEX).await;
        assert_eq!(ids, vec!["newer"]);
    }

    #[tokio::test]
    async fn summary_skipped_without_any_document_path() {
        let dir = TempDir::new().unwrap();
        let repo = repo(&dir);
        let mut session = completed_session("abc");
        session.contract_url = None;

        repo.store(&session).await.unwrap();
        assert!(repo.get_all_offline_analyses().await.is_empty());
        // The session itself still stored fine.
        assert!(repo.get("abc").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn remove_deletes_record_summary_and_index_entries() {
        let dir = TempDir::new().unwrap();
        let repo = repo(&dir);

        repo.store(&completed_session("abc")).await.unwrap();
        repo.remove("abc").await.unwrap();

        assert!(repo.get("abc").await.unwrap().is_none());
        assert!(repo.get_all().await.is_empty());
        assert!(repo.get_all_offline_analyses().await.is_empty());
    }

    #[tokio::test]
    async fn remove_unknown_id_is_ok() {
        let dir = TempDir::new().unwrap();
        let repo = repo(&dir);
        repo.remove("ghost").await.unwrap();
    }

    #[tokio::test]
    async fn clear_all_drops_records_and_indexes() {
        let dir = TempDir::new().unwrap();
        let repo = repo(&dir);

        repo.store(&completed_session("a")).await.unwrap();
        repo.store(&completed_session("b")).await.unwrap();
        repo.clear_all().await.unwrap();

        assert!(repo.get_all().await.is_empty());
        assert!(repo.get_all_offline_analyses().await.is_empty());
        assert!(repo.get("a").await.unwrap().is_none());
        assert!(repo.get("b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn store_rejects_empty_session_id() {
        let dir = TempDir::new().unwrap();
        let repo = repo(&dir);
        let session = completed_session(" ");
        assert!(matches!(
            repo.store(&session).await,
            Err(RepoError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn concurrent_stores_do_not_lose_index_entries() {
        let dir = TempDir::new().unwrap();
        let repo = Arc::new(repo(&dir));

        let mut handles = Vec::new();
        for i in 0..8 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                repo.store(&completed_session(&format!("c{i}"))).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert_eq!(repo.get_all().await.len(), 8);
    }

    #[tokio::test]
    async fn touch_session_index_inserts_without_record() {
        let dir = TempDir::new().unwrap();
        let repo = repo(&dir);

        repo.touch_session_index("pending-1").await.unwrap();
        let router = StorageRouter::on_disk(dir.path());
        let ids = index::read_index(&router, SESSIONS_INDEX).await;
        assert_eq!(ids, vec!["pending-1"]);
        // Self-healing read: the record doesn't exist, so get_all is empty.
        assert!(repo.get_all().await.is_empty());
    }
}
