// crates/jobs/src/tracker.rs
//! Polling state machine for in-flight analyses.
//!
//! Per tracked session: `Polling → {Complete, TimedOut, NotFound, Error}`,
//! all four terminal. Exactly one terminal notification fires per job; the
//! removal of the job from the active map is the linearization point, so a
//! late poll response or a racing stop can never double-notify.
//!
//! Polling cadence ramps from 2s toward a 15s ceiling as retries
//! accumulate in the foreground, and pins to a flat 15s in the background.
//! A lifecycle transition reschedules any in-flight sleep on the spot.
//! The active-job map is serialized (minus live handles) on backgrounding
//! and reconstructed on foregrounding, covering process restarts while
//! suspended.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use mizan_sessions::SessionRepository;
use mizan_storage::StorageRouter;
use mizan_sync::AnalysisBackend;
use mizan_types::{AnalysisTerm, Session};
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::lifecycle::AppLifecycle;
use crate::notify::{Notification, NotificationScheduler};
use crate::record::{JobRecord, ACTIVE_JOBS_KEY, ACTIVE_PROCESSING_KEY};
use crate::wake::WakeLock;

/// Tracker knobs; defaults match production behavior.
#[derive(Debug, Clone)]
pub struct JobTrackerConfig {
    /// Poll budget before a job times out.
    pub max_retries: u32,
    /// Delay before the first poll.
    pub initial_delay: Duration,
    /// Foreground schedule: `base + retry × step`, capped at `ceiling`.
    pub foreground_base: Duration,
    pub foreground_step: Duration,
    pub interval_ceiling: Duration,
    /// Flat cadence while backgrounded, regardless of retry count.
    pub background_interval: Duration,
    /// Retry count at which the one-off existence probe fires.
    pub probe_at_retry: u32,
}

impl Default for JobTrackerConfig {
    fn default() -> Self {
        Self {
            max_retries: 50,
            initial_delay: Duration::from_secs(1),
            foreground_base: Duration::from_millis(2000),
            foreground_step: Duration::from_millis(1000),
            interval_ceiling: Duration::from_millis(15000),
            background_interval: Duration::from_millis(15000),
            probe_at_retry: 5,
        }
    }
}

/// Terminal state of a tracked job.
#[derive(Debug)]
pub enum JobOutcome {
    Complete(Box<Session>),
    TimedOut,
    NotFound,
    Error,
}

/// In-memory job entry; the live handle is never persisted.
struct ActiveJob {
    record: JobRecord,
    cancel: CancellationToken,
    /// The existence probe is one-off per job.
    probed: bool,
}

/// Result of a single poll tick.
enum Tick {
    Continue,
    Terminal(JobOutcome),
    /// Job vanished from the active map (stopped or replaced); the loop
    /// exits without acting on whatever the poll returned.
    Gone,
}

pub struct JobTracker {
    backend: Arc<dyn AnalysisBackend>,
    repo: Arc<SessionRepository>,
    store: Arc<StorageRouter>,
    notifier: Arc<dyn NotificationScheduler>,
    wake: Arc<WakeLock>,
    lifecycle: watch::Receiver<AppLifecycle>,
    jobs: Mutex<HashMap<String, ActiveJob>>,
    config: JobTrackerConfig,
    shutdown: CancellationToken,
}

impl JobTracker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        backend: Arc<dyn AnalysisBackend>,
        repo: Arc<SessionRepository>,
        store: Arc<StorageRouter>,
        notifier: Arc<dyn NotificationScheduler>,
        wake: Arc<WakeLock>,
        lifecycle: watch::Receiver<AppLifecycle>,
        config: JobTrackerConfig,
    ) -> Arc<Self> {
        let tracker = Arc::new(Self {
            backend,
            repo,
            store,
            notifier,
            wake,
            lifecycle,
            jobs: Mutex::new(HashMap::new()),
            config,
            shutdown: CancellationToken::new(),
        });
        tracker.spawn_lifecycle_listener();
        tracker
    }

    /// Begin tracking an analysis. An existing job for the same id is
    /// cancelled and replaced with a fresh retry budget.
    pub async fn start_analysis(self: &Arc<Self>, session_id: &str) {
        let cancel = CancellationToken::new();
        {
            let mut jobs = self.jobs.lock().await;
            if let Some(old) = jobs.remove(session_id) {
                info!(%session_id, "replacing existing analysis job");
                old.cancel.cancel();
                self.wake.release();
            }
            jobs.insert(
                session_id.to_string(),
                ActiveJob {
                    record: JobRecord::new(session_id, self.config.max_retries),
                    cancel: cancel.clone(),
                    probed: false,
                },
            );
        }
        self.wake.acquire();

        if let Err(e) = self.repo.touch_session_index(session_id).await {
            warn!(%session_id, "index touch failed at job start: {e}");
        }
        self.register_processing(session_id).await;
        self.persist_jobs().await;

        let tracker = Arc::clone(self);
        let id = session_id.to_string();
        tokio::spawn(async move {
            tracker.poll_loop(id, cancel).await;
        });
        info!(%session_id, "analysis job started");
    }

    /// Idempotent: stopping an unknown id is a no-op. No notification
    /// fires for an explicit stop.
    pub async fn stop_analysis(&self, session_id: &str) {
        let removed = self.jobs.lock().await.remove(session_id);
        let Some(job) = removed else {
            return;
        };
        job.cancel.cancel();
        self.wake.release();
        self.unregister_processing(session_id).await;
        self.persist_jobs().await;
        info!(%session_id, "analysis job stopped");
    }

    pub async fn is_analyzing(&self, session_id: &str) -> bool {
        self.jobs.lock().await.contains_key(session_id)
    }

    pub async fn active_jobs(&self) -> Vec<String> {
        self.jobs.lock().await.keys().cloned().collect()
    }

    /// Stop every job, detach the lifecycle listener, and clear the
    /// background-processing registrations.
    pub async fn cleanup(&self) {
        let drained: Vec<(String, ActiveJob)> =
            self.jobs.lock().await.drain().collect();
        for (session_id, job) in &drained {
            job.cancel.cancel();
            self.wake.release();
            debug!(%session_id, "job cancelled during cleanup");
        }
        self.shutdown.cancel();
        self.persist_jobs().await;
        if let Err(e) = self.store.delete(ACTIVE_PROCESSING_KEY).await {
            warn!("background-processing registry cleanup failed: {e}");
        }
        info!(stopped = drained.len(), "job tracker cleaned up");
    }

    /// Reconstruct jobs present in durable storage but absent from the
    /// in-memory set, resuming their polling. Covers process restarts
    /// while backgrounded; also safe to call at startup.
    pub async fn restore_persisted_jobs(self: &Arc<Self>) {
        let raw = match self.store.get(ACTIVE_JOBS_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return,
            Err(e) => {
                warn!("persisted job map unreadable: {e}");
                return;
            }
        };
        let records: HashMap<String, JobRecord> = match serde_json::from_str(&raw) {
            Ok(records) => records,
            Err(e) => {
                warn!("persisted job map malformed: {e}");
                return;
            }
        };

        for (session_id, record) in records {
            let cancel = CancellationToken::new();
            {
                let mut jobs = self.jobs.lock().await;
                if jobs.contains_key(&session_id) {
                    continue;
                }
                jobs.insert(
                    session_id.clone(),
                    ActiveJob {
                        record,
                        cancel: cancel.clone(),
                        probed: false,
                    },
                );
            }
            self.wake.acquire();
            info!(%session_id, "restored persisted analysis job");

            let tracker = Arc::clone(self);
            let id = session_id.clone();
            tokio::spawn(async move {
                tracker.poll_loop(id, cancel).await;
            });
        }
    }

    /// Current cadence for a job with `retry` failed polls behind it.
    pub fn poll_interval(&self, retry: u32) -> Duration {
        if *self.lifecycle.borrow() == AppLifecycle::Background {
            return self.config.background_interval;
        }
        let ramped = self.config.foreground_base
            + self.config.foreground_step * retry;
        ramped.min(self.config.interval_ceiling)
    }

    async fn poll_loop(self: Arc<Self>, session_id: String, cancel: CancellationToken) {
        let mut lifecycle = self.lifecycle.clone();

        // First poll fires after a short initial delay, not immediately.
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(self.config.initial_delay) => {}
        }

        loop {
            match self.poll_once(&session_id, &cancel).await {
                Tick::Gone => return,
                Tick::Terminal(outcome) => {
                    self.finish_job(&session_id, outcome).await;
                    return;
                }
                Tick::Continue => {}
            }

            let retry = {
                let jobs = self.jobs.lock().await;
                match jobs.get(&session_id) {
                    Some(job) => job.record.retry_count,
                    None => return,
                }
            };
            if !self.wait_for_next_poll(retry, &cancel, &mut lifecycle).await {
                return;
            }
        }
    }

    /// Sleep out the interval for the current retry count. A lifecycle
    /// transition mid-sleep drops the pending timer and reschedules on the
    /// new cadence, so backgrounding takes effect immediately rather than
    /// on the next tick. Returns `false` when the job was cancelled.
    async fn wait_for_next_poll(
        &self,
        retry: u32,
        cancel: &CancellationToken,
        lifecycle: &mut watch::Receiver<AppLifecycle>,
    ) -> bool {
        let sleep = tokio::time::sleep(self.poll_interval(retry));
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = &mut sleep => return true,
                changed = lifecycle.changed() => {
                    if changed.is_err() {
                        // Bus dropped; finish out the current schedule.
                        tokio::select! {
                            _ = cancel.cancelled() => return false,
                            _ = &mut sleep => return true,
                        }
                    }
                    sleep
                        .as_mut()
                        .reset(tokio::time::Instant::now() + self.poll_interval(retry));
                }
            }
        }
    }

    async fn poll_once(&self, session_id: &str, cancel: &CancellationToken) -> Tick {
        // One-off existence probe once the retry count crosses the
        // threshold: a server that has never heard of the session should
        // not consume the remaining budget.
        let probe_due = {
            let mut jobs = self.jobs.lock().await;
            let Some(job) = jobs.get_mut(session_id) else {
                return Tick::Gone;
            };
            let due = job.record.retry_count >= self.config.probe_at_retry && !job.probed;
            if due {
                job.probed = true;
            }
            due
        };
        if probe_due {
            if let Err(e) = self.backend.probe_session(session_id).await {
                if cancel.is_cancelled() {
                    return Tick::Gone;
                }
                if e.is_not_found() {
                    info!(%session_id, "existence probe: session unknown to server");
                    return Tick::Terminal(JobOutcome::NotFound);
                }
                debug!(%session_id, "existence probe inconclusive: {e}");
            }
            if cancel.is_cancelled() {
                return Tick::Gone;
            }
        }

        match self.backend.session_status(session_id).await {
            Ok(status) => {
                if cancel.is_cancelled() {
                    return Tick::Gone;
                }
                if status.is_complete() {
                    let session = self
                        .build_completed_session(
                            session_id,
                            status.analysis_results,
                            status.analysis_timestamp,
                            status.compliance_percentage,
                        )
                        .await;
                    return Tick::Terminal(JobOutcome::Complete(Box::new(session)));
                }
                if status.has_timestamp() {
                    // Timestamp without results: one supplementary terms
                    // fetch before concluding "not yet complete".
                    match self.supplementary_terms(session_id, cancel).await {
                        SupplementaryTerms::Complete(terms) => {
                            let session = self
                                .build_completed_session(
                                    session_id,
                                    terms,
                                    status.analysis_timestamp,
                                    status.compliance_percentage,
                                )
                                .await;
                            return Tick::Terminal(JobOutcome::Complete(Box::new(session)));
                        }
                        SupplementaryTerms::NotFound => {
                            return Tick::Terminal(JobOutcome::NotFound)
                        }
                        SupplementaryTerms::Gone => return Tick::Gone,
                        SupplementaryTerms::Incomplete => {}
                    }
                }
                match self.bump_retry(session_id).await {
                    Some(count) if count >= self.config.max_retries => {
                        Tick::Terminal(JobOutcome::TimedOut)
                    }
                    Some(_) => Tick::Continue,
                    None => Tick::Gone,
                }
            }
            Err(e) => {
                if cancel.is_cancelled() {
                    return Tick::Gone;
                }
                if e.is_not_found() {
                    info!(%session_id, "status poll: session unknown to server");
                    return Tick::Terminal(JobOutcome::NotFound);
                }
                warn!(%session_id, "status poll failed: {e}");
                // A single noisy failure does not abort the job.
                match self.bump_retry(session_id).await {
                    Some(count) if count >= self.config.max_retries => {
                        Tick::Terminal(JobOutcome::Error)
                    }
                    Some(_) => Tick::Continue,
                    None => Tick::Gone,
                }
            }
        }
    }

    async fn supplementary_terms(
        &self,
        session_id: &str,
        cancel: &CancellationToken,
    ) -> SupplementaryTerms {
        match self.backend.session_terms(session_id).await {
            Ok(terms) => {
                if cancel.is_cancelled() {
                    SupplementaryTerms::Gone
                } else if terms.is_empty() {
                    SupplementaryTerms::Incomplete
                } else {
                    SupplementaryTerms::Complete(terms)
                }
            }
            Err(e) => {
                if cancel.is_cancelled() {
                    return SupplementaryTerms::Gone;
                }
                if e.is_not_found() {
                    return SupplementaryTerms::NotFound;
                }
                debug!(%session_id, "supplementary terms fetch failed: {e}");
                SupplementaryTerms::Incomplete
            }
        }
    }

    async fn bump_retry(&self, session_id: &str) -> Option<u32> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs.get_mut(session_id)?;
        job.record.retry_count += 1;
        Some(job.record.retry_count)
    }

    /// Fold the poll result into the placeholder stored at upload time,
    /// so filename, language, and document URL survive completion.
    async fn build_completed_session(
        &self,
        session_id: &str,
        terms: Vec<AnalysisTerm>,
        timestamp: Option<String>,
        compliance: Option<f32>,
    ) -> Session {
        let mut session = match self.repo.get(session_id).await {
            Ok(Some(existing)) => existing,
            _ => Session::processing(session_id, String::new()),
        };
        session.analysis_results = terms;
        if compliance.is_some() {
            session.compliance_percentage = compliance;
        }
        session.analysis_timestamp = timestamp
            .filter(|ts| !ts.is_empty())
            .or_else(|| Some(chrono::Utc::now().to_rfc3339()));
        session.is_processing = false;
        session
    }

    /// Terminal transition. Whoever removes the job from the map owns the
    /// single notification; a job already gone means a racing stop or
    /// replacement won, and nothing fires.
    async fn finish_job(&self, session_id: &str, outcome: JobOutcome) {
        let removed = self.jobs.lock().await.remove(session_id);
        let Some(job) = removed else {
            return;
        };
        job.cancel.cancel();
        self.unregister_processing(session_id).await;
        self.persist_jobs().await;

        let notification = match outcome {
            JobOutcome::Complete(session) => {
                if let Err(e) = self.repo.store(&session).await {
                    warn!(%session_id, "completed session store failed: {e}");
                }
                info!(%session_id, terms = session.analysis_results.len(), "analysis complete");
                Notification {
                    title: "Analysis complete".to_string(),
                    body: format!(
                        "{} analyzed: {} terms reviewed",
                        display_name(&session),
                        session.analysis_results.len()
                    ),
                    data: serde_json::json!({"session_id": session_id, "outcome": "complete"}),
                }
            }
            JobOutcome::TimedOut => {
                warn!(%session_id, "analysis timed out");
                Notification {
                    title: "Analysis timed out".to_string(),
                    body: "The analysis did not finish in time. Please try again.".to_string(),
                    data: serde_json::json!({"session_id": session_id, "outcome": "timeout"}),
                }
            }
            JobOutcome::NotFound => {
                warn!(%session_id, "analysis session unknown to server");
                Notification {
                    title: "Analysis unavailable".to_string(),
                    body: "The server no longer has this analysis session.".to_string(),
                    data: serde_json::json!({"session_id": session_id, "outcome": "not_found"}),
                }
            }
            JobOutcome::Error => {
                warn!(%session_id, "analysis failed after exhausting retries");
                Notification {
                    title: "Analysis failed".to_string(),
                    body: "Something went wrong while analyzing your contract.".to_string(),
                    data: serde_json::json!({"session_id": session_id, "outcome": "error"}),
                }
            }
        };
        self.notifier.schedule(notification).await;
        self.wake.release();
    }

    async fn persist_jobs(&self) {
        let snapshot: HashMap<String, JobRecord> = self
            .jobs
            .lock()
            .await
            .iter()
            .map(|(id, job)| (id.clone(), job.record.clone()))
            .collect();
        match serde_json::to_string(&snapshot) {
            Ok(json) => {
                if let Err(e) = self.store.set(ACTIVE_JOBS_KEY, &json).await {
                    warn!("job map persistence failed: {e}");
                }
            }
            Err(e) => warn!("job map serialization failed: {e}"),
        }
    }

    async fn register_processing(&self, session_id: &str) {
        let mut ids = self.read_processing().await;
        if !ids.iter().any(|id| id == session_id) {
            ids.push(session_id.to_string());
        }
        self.write_processing(&ids).await;
    }

    async fn unregister_processing(&self, session_id: &str) {
        let mut ids = self.read_processing().await;
        ids.retain(|id| id != session_id);
        self.write_processing(&ids).await;
    }

    async fn read_processing(&self) -> Vec<String> {
        match self.store.get(ACTIVE_PROCESSING_KEY).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    async fn write_processing(&self, ids: &[String]) {
        let json = serde_json::to_string(ids).unwrap_or_else(|_| "[]".to_string());
        if let Err(e) = self.store.set(ACTIVE_PROCESSING_KEY, &json).await {
            warn!("background-processing registry write failed: {e}");
        }
    }

    fn spawn_lifecycle_listener(self: &Arc<Self>) {
        let tracker = Arc::clone(self);
        let mut rx = self.lifecycle.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let state = *rx.borrow_and_update();
                        match state {
                            // Serialize the active set before the OS gets
                            // a chance to kill the process; each poll loop
                            // reschedules its own pending sleep.
                            AppLifecycle::Background => tracker.persist_jobs().await,
                            AppLifecycle::Foreground => tracker.restore_persisted_jobs().await,
                        }
                    }
                }
            }
        });
    }
}

enum SupplementaryTerms {
    Complete(Vec<AnalysisTerm>),
    Incomplete,
    NotFound,
    Gone,
}

fn display_name(session: &Session) -> &str {
    if session.original_filename.is_empty() {
        &session.session_id
    } else {
        &session.original_filename
    }
}
