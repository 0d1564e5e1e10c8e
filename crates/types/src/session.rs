// crates/types/src/session.rs
//! Canonical analysis record for one uploaded contract.
//!
//! A `Session` is minted as a processing placeholder when an upload begins,
//! filled in when the remote analysis completes, and persisted verbatim
//! thereafter. Field names match the remote API's snake_case wire format.

use serde::{Deserialize, Serialize};

/// Detected contract language.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Arabic,
    English,
    /// Contract mixes Arabic and English clauses.
    Mixed,
    #[default]
    Unknown,
}

/// One analyzed contract term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisTerm {
    pub term_id: String,
    pub term_text: String,
    /// The analyzer's original compliance judgment. Absent on the wire
    /// means non-compliant.
    #[serde(default)]
    pub is_valid_sharia: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sharia_issue: Option<String>,
    /// Expert override of the original judgment, when a review happened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expert_validated: Option<bool>,
    /// User's own confirmation of the term.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_user_confirmed: Option<bool>,
}

impl AnalysisTerm {
    /// Compliance after overrides: expert review wins, then the user's
    /// confirmation, then the analyzer's original judgment.
    pub fn effective_compliance(&self) -> bool {
        self.expert_validated
            .or(self.is_user_confirmed)
            .unwrap_or(self.is_valid_sharia)
    }

    /// Whether an expert has reviewed this term at all.
    pub fn has_expert_feedback(&self) -> bool {
        self.expert_validated.is_some()
    }
}

/// Canonical analysis record, keyed by `session_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Server-issued UUID, or a locally-minted `session_<ts>_<random>` id
    /// for uploads the server has not yet acknowledged.
    pub session_id: String,
    #[serde(default)]
    pub original_filename: String,
    #[serde(default)]
    pub analysis_results: Vec<AnalysisTerm>,
    /// Server-supplied overall compliance, 0–100. Derived locally when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance_percentage: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_timestamp: Option<String>,
    #[serde(default)]
    pub detected_language: Language,
    /// True from upload until a terminal job state is reached.
    #[serde(default)]
    pub is_processing: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Remote URL of the source document, when the server exposes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_url: Option<String>,
}

impl Session {
    /// Placeholder record minted when an upload begins.
    pub fn processing(session_id: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            original_filename: filename.into(),
            analysis_results: Vec::new(),
            compliance_percentage: None,
            analysis_timestamp: None,
            detected_language: Language::Unknown,
            is_processing: true,
            created_at: Some(chrono::Utc::now().to_rfc3339()),
            contract_url: None,
        }
    }

    /// A session is complete iff it has both an analysis timestamp and a
    /// non-empty results list; anything less is still pending.
    pub fn is_complete(&self) -> bool {
        self.analysis_timestamp
            .as_deref()
            .is_some_and(|ts| !ts.is_empty())
            && !self.analysis_results.is_empty()
    }
}

/// Mint a temporary local session id of the form `session_<millis>_<random>`.
///
/// Used for placeholder records before the server has issued a real id.
/// Note the random part is not UUID-shaped, so id normalization leaves
/// these ids untouched when talking to the server.
pub fn mint_local_session_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let random = &uuid::Uuid::new_v4().simple().to_string()[..8];
    format!("session_{millis}_{random}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(valid: bool) -> AnalysisTerm {
        AnalysisTerm {
            term_id: "t1".into(),
            term_text: "clause".into(),
            is_valid_sharia: valid,
            sharia_issue: None,
            expert_validated: None,
            is_user_confirmed: None,
        }
    }

    #[test]
    fn effective_compliance_prefers_expert_override() {
        let mut t = term(false);
        t.expert_validated = Some(true);
        t.is_user_confirmed = Some(false);
        assert!(t.effective_compliance());
    }

    #[test]
    fn effective_compliance_falls_back_to_user_then_original() {
        let mut t = term(false);
        t.is_user_confirmed = Some(true);
        assert!(t.effective_compliance());

        let t = term(true);
        assert!(t.effective_compliance());
        let t = term(false);
        assert!(!t.effective_compliance());
    }

    #[test]
    fn completeness_requires_timestamp_and_results() {
        let mut s = Session::processing("abc", "contract.pdf");
        assert!(!s.is_complete());

        s.analysis_timestamp = Some("2026-08-01T10:00:00Z".into());
        assert!(!s.is_complete());

        s.analysis_results.push(term(true));
        assert!(s.is_complete());

        s.analysis_timestamp = Some(String::new());
        assert!(!s.is_complete());
    }

    #[test]
    fn wire_parse_tolerates_missing_fields() {
        let s: Session = serde_json::from_str(r#"{"session_id": "abc"}"#).unwrap();
        assert_eq!(s.session_id, "abc");
        assert!(s.analysis_results.is_empty());
        assert_eq!(s.detected_language, Language::Unknown);
        assert!(!s.is_processing);
    }

    #[test]
    fn local_id_shape() {
        let id = mint_local_session_id();
        assert!(id.starts_with("session_"));
        let parts: Vec<&str> = id.splitn(3, '_').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 8);
    }
}
