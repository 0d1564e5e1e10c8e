// crates/types/src/summary.rs
//! Denormalized history projection of a [`Session`].
//!
//! Summaries are derived whenever a session is stored and never mutated
//! independently of their parent; they exist so the history screen can
//! render without loading full session payloads.

use serde::{Deserialize, Serialize};

use crate::session::Session;

/// Display tags derived from a session's compliance profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueFlag {
    #[serde(rename = "Low Compliance")]
    LowCompliance,
    #[serde(rename = "Needs Review")]
    NeedsReview,
    #[serde(rename = "Expert Reviewed")]
    ExpertReviewed,
    #[serde(rename = "Highly Compliant")]
    HighlyCompliant,
}

impl std::fmt::Display for IssueFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IssueFlag::LowCompliance => "Low Compliance",
            IssueFlag::NeedsReview => "Needs Review",
            IssueFlag::ExpertReviewed => "Expert Reviewed",
            IssueFlag::HighlyCompliant => "Highly Compliant",
        };
        f.write_str(s)
    }
}

/// Compact, display-ready projection of a session for history browsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineAnalysisSummary {
    /// `offline_<sessionId>`.
    pub id: String,
    pub session_id: String,
    pub file_name: String,
    /// 0–100.
    pub compliance_score: u8,
    pub summary_text: String,
    #[serde(default)]
    pub issue_flags: Vec<IssueFlag>,
    #[serde(default)]
    pub term_count: usize,
    #[serde(default)]
    pub issue_count: usize,
    /// Full session payload cached alongside the summary for offline opens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_session: Option<Session>,
    /// Locally cached copy of the source document, or the remote URL when
    /// caching failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_file_path: Option<String>,
    #[serde(default)]
    pub analyzed_at: String,
}

impl OfflineAnalysisSummary {
    /// Minimal validity check used by self-healing index reads: an entry
    /// without an owning session id or filename is pruned.
    pub fn is_valid(&self) -> bool {
        !self.session_id.trim().is_empty() && !self.file_name.trim().is_empty()
    }
}

/// Breadcrumb written next to each stored session so an interrupted store
/// can be diagnosed and re-driven.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestorationRecord {
    pub session_id: String,
    pub original_filename: String,
    pub stored_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_flag_wire_names_have_spaces() {
        let json = serde_json::to_string(&IssueFlag::LowCompliance).unwrap();
        assert_eq!(json, r#""Low Compliance""#);
        let back: IssueFlag = serde_json::from_str(&json).unwrap();
        assert_eq!(back, IssueFlag::LowCompliance);
    }

    #[test]
    fn summary_validity() {
        let mut s = OfflineAnalysisSummary {
            id: "offline_abc".into(),
            session_id: "abc".into(),
            file_name: "contract.pdf".into(),
            compliance_score: 80,
            summary_text: String::new(),
            issue_flags: vec![],
            term_count: 0,
            issue_count: 0,
            cached_session: None,
            local_file_path: None,
            analyzed_at: String::new(),
        };
        assert!(s.is_valid());
        s.file_name = "  ".into();
        assert!(!s.is_valid());
    }
}
