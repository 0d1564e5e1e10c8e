// crates/sessions/src/summarize.rs
//! Derivation of the offline analysis summary from a full session.

use mizan_types::{IssueFlag, OfflineAnalysisSummary, Session};

use crate::keys::offline_summary_id;

/// Flag thresholds on the 0–100 compliance score.
const LOW_COMPLIANCE_BELOW: u8 = 70;
const HIGHLY_COMPLIANT_AT: u8 = 90;

/// Overall compliance score. A server-supplied percentage wins (clamped to
/// 0–100); otherwise `round(100 × compliant / total)` over the effective
/// per-term judgments. An empty term list scores 0.
pub fn derive_compliance_score(session: &Session) -> u8 {
    if let Some(p) = session.compliance_percentage {
        return p.clamp(0.0, 100.0).round() as u8;
    }
    let total = session.analysis_results.len();
    if total == 0 {
        return 0;
    }
    let compliant = session
        .analysis_results
        .iter()
        .filter(|t| t.effective_compliance())
        .count();
    (100.0 * compliant as f32 / total as f32).round() as u8
}

/// Display tags for the history list.
pub fn derive_issue_flags(session: &Session, score: u8) -> Vec<IssueFlag> {
    let mut flags = Vec::new();
    if score < LOW_COMPLIANCE_BELOW {
        flags.push(IssueFlag::LowCompliance);
    }
    if session
        .analysis_results
        .iter()
        .any(|t| !t.effective_compliance())
    {
        flags.push(IssueFlag::NeedsReview);
    }
    if session
        .analysis_results
        .iter()
        .any(|t| t.has_expert_feedback())
    {
        flags.push(IssueFlag::ExpertReviewed);
    }
    if score >= HIGHLY_COMPLIANT_AT {
        flags.push(IssueFlag::HighlyCompliant);
    }
    flags
}

fn derive_summary_text(session: &Session, score: u8, issue_count: usize) -> String {
    let terms = session.analysis_results.len();
    if terms == 0 {
        return format!("Analysis of {} pending", session.original_filename);
    }
    format!(
        "{terms} terms analyzed, {issue_count} need attention, {score}% compliant"
    )
}

/// Build the summary record. `local_file_path` is whatever path resolution
/// produced upstream; the caller skips storage entirely when it is `None`.
pub fn build_summary(session: &Session, local_file_path: Option<String>) -> OfflineAnalysisSummary {
    let score = derive_compliance_score(session);
    let issue_count = session
        .analysis_results
        .iter()
        .filter(|t| !t.effective_compliance())
        .count();
    OfflineAnalysisSummary {
        id: offline_summary_id(&session.session_id),
        session_id: session.session_id.clone(),
        file_name: session.original_filename.clone(),
        compliance_score: score,
        summary_text: derive_summary_text(session, score, issue_count),
        issue_flags: derive_issue_flags(session, score),
        term_count: session.analysis_results.len(),
        issue_count,
        cached_session: Some(session.clone()),
        local_file_path,
        analyzed_at: session
            .analysis_timestamp
            .clone()
            .unwrap_or_else(|| chrono::Utc::now().to_rfc3339()),
    }
}
