// crates/sessions/src/analytics.rs
//! Read-only derived statistics over the full session set.

use std::collections::HashMap;
use std::sync::Arc;

use mizan_types::{IssueFlag, Language};
use serde::Serialize;

use crate::repository::SessionRepository;
use crate::summarize::{derive_compliance_score, derive_issue_flags};

/// Aggregate view of the stored history.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalyticsReport {
    pub total_sessions: usize,
    pub completed_sessions: usize,
    pub pending_sessions: usize,
    /// Mean compliance score over completed sessions; `None` when there
    /// are none.
    pub average_compliance: Option<f32>,
    pub sessions_by_language: HashMap<Language, usize>,
    pub flag_counts: HashMap<IssueFlag, usize>,
    /// RFC 3339 timestamp of the most recent completed analysis.
    pub latest_analysis: Option<String>,
}

/// Computes [`AnalyticsReport`]s on demand. Depends on the repository
/// only; nothing depends on it.
pub struct AnalyticsAggregator {
    repo: Arc<SessionRepository>,
}

impl AnalyticsAggregator {
    pub fn new(repo: Arc<SessionRepository>) -> Self {
        Self { repo }
    }

    pub async fn report(&self) -> AnalyticsReport {
        let sessions = self.repo.get_all().await;
        let mut report = AnalyticsReport {
            total_sessions: sessions.len(),
            ..Default::default()
        };

        let mut score_sum = 0u32;
        for session in &sessions {
            *report
                .sessions_by_language
                .entry(session.detected_language)
                .or_insert(0) += 1;

            if !session.is_complete() {
                report.pending_sessions += 1;
                continue;
            }
            report.completed_sessions += 1;

            let score = derive_compliance_score(session);
            score_sum += score as u32;
            for flag in derive_issue_flags(session, score) {
                *report.flag_counts.entry(flag).or_insert(0) += 1;
            }

            if let Some(ts) = &session.analysis_timestamp {
                if report.latest_analysis.as_deref() < Some(ts.as_str()) {
                    report.latest_analysis = Some(ts.clone());
                }
            }
        }

        if report.completed_sessions > 0 {
            report.average_compliance =
                Some(score_sum as f32 / report.completed_sessions as f32);
        }
        report
    }
}
