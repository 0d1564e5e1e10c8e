// crates/sync/src/http.rs
//! reqwest implementations of the remote seams.

use std::path::PathBuf;

use async_trait::async_trait;
use mizan_sessions::FileCache;
use mizan_types::{AnalysisTerm, Session, SessionStatus, UploadReceipt};
use tracing::{debug, warn};

use crate::backend::{normalize_session_id, AnalysisBackend};
use crate::error::ApiError;

/// HTTP client for the remote analysis API.
pub struct HttpAnalysisBackend {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpAnalysisBackend {
    pub fn new(base_url: impl Into<String>, auth_token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_token,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut req = self.client.request(method, format!("{}{path}", self.base_url));
        if let Some(token) = &self.auth_token {
            req = req.bearer_auth(token);
        }
        req
    }

    /// Map non-2xx responses into `ApiError::Status`, keeping the message
    /// body for not-found pattern matching.
    async fn check(endpoint: &str, resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = resp.text().await.unwrap_or_default();
        Err(ApiError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl AnalysisBackend for HttpAnalysisBackend {
    async fn session_status(&self, session_id: &str) -> Result<SessionStatus, ApiError> {
        let id = normalize_session_id(session_id);
        let path = format!("/session/{id}");
        let resp = self.request(reqwest::Method::GET, &path).send().await?;
        let resp = Self::check(&path, resp).await?;
        Ok(resp.json().await?)
    }

    async fn session_terms(&self, session_id: &str) -> Result<Vec<AnalysisTerm>, ApiError> {
        let id = normalize_session_id(session_id);
        let path = format!("/session/{id}/terms");
        let resp = self.request(reqwest::Method::GET, &path).send().await?;
        let resp = Self::check(&path, resp).await?;
        Ok(resp.json().await?)
    }

    async fn upload_contract(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadReceipt, ApiError> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);
        let resp = self
            .request(reqwest::Method::POST, "/upload")
            .multipart(form)
            .send()
            .await?;
        let resp = Self::check("/upload", resp).await?;
        Ok(resp.json().await?)
    }

    async fn sessions_for_device(&self, device_id: &str) -> Result<Vec<Session>, ApiError> {
        let resp = self
            .request(reqwest::Method::GET, "/sessions")
            .query(&[("device_id", device_id)])
            .send()
            .await?;
        let resp = Self::check("/sessions", resp).await?;
        Ok(resp.json().await?)
    }

    async fn save_session(&self, session: &Session) -> Result<(), ApiError> {
        let resp = self
            .request(reqwest::Method::POST, "/save-session")
            .json(session)
            .send()
            .await?;
        Self::check("/save-session", resp).await?;
        Ok(())
    }

    async fn probe_session(&self, session_id: &str) -> Result<(), ApiError> {
        self.session_status(session_id).await.map(|_| ())
    }
}

/// Download-to-disk cache for source documents. Failure is always soft.
pub struct HttpFileCache {
    client: reqwest::Client,
    cache_dir: PathBuf,
}

impl HttpFileCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            client: reqwest::Client::new(),
            cache_dir: cache_dir.into(),
        }
    }

    fn local_name(url: &str) -> String {
        let stem = url
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("document");
        let safe: String = stem
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '_' })
            .collect();
        // Prefix with a content-independent random component so distinct
        // URLs with the same trailing segment don't collide.
        format!("{}_{safe}", &uuid::Uuid::new_v4().simple().to_string()[..8])
    }
}

#[async_trait]
impl FileCache for HttpFileCache {
    async fn download(&self, url: &str) -> Option<String> {
        let resp = match self.client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                warn!(%url, status = %resp.status(), "document fetch failed");
                return None;
            }
            Err(e) => {
                warn!(%url, "document fetch failed: {e}");
                return None;
            }
        };
        let bytes = match resp.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(%url, "document body read failed: {e}");
                return None;
            }
        };

        if let Err(e) = tokio::fs::create_dir_all(&self.cache_dir).await {
            warn!("cache dir creation failed: {e}");
            return None;
        }
        let path = self.cache_dir.join(Self::local_name(url));
        match tokio::fs::write(&path, &bytes).await {
            Ok(()) => {
                debug!(%url, path = %path.display(), "document cached");
                Some(path.to_string_lossy().into_owned())
            }
            Err(e) => {
                warn!(%url, "document cache write failed: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mizan_types::Language;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn session_status_parses_wire_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/session/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "analysis_results": [
                    {"term_id": "t1", "term_text": "clause", "is_valid_sharia": true}
                ],
                "analysis_timestamp": "2026-08-01T00:00:00Z",
                "compliance_percentage": 88.0,
                "extra_field_we_ignore": {"nested": true}
            })))
            .mount(&server)
            .await;

        let backend = HttpAnalysisBackend::new(server.uri(), None);
        let status = backend.session_status("abc").await.unwrap();
        assert!(status.is_complete());
        assert_eq!(status.compliance_percentage, Some(88.0));
        assert_eq!(status.analysis_results.len(), 1);
    }

    #[tokio::test]
    async fn prefixed_uuid_ids_are_normalized_on_the_wire() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/session/6fa459ea-ee8a-3ca4-894e-db77e160355e"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let backend = HttpAnalysisBackend::new(server.uri(), None);
        backend
            .session_status("session_6fa459ea-ee8a-3ca4-894e-db77e160355e")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn http_404_classifies_as_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/session/ghost"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such thing"))
            .mount(&server)
            .await;

        let backend = HttpAnalysisBackend::new(server.uri(), None);
        let err = backend.session_status("ghost").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn arabic_error_body_classifies_as_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/session/ghost"))
            .respond_with(ResponseTemplate::new(500).set_body_string("الجلسة غير موجودة"))
            .mount(&server)
            .await;

        let backend = HttpAnalysisBackend::new(server.uri(), None);
        let err = backend.session_status("ghost").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn upload_returns_receipt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"session_id": "abc"})),
            )
            .mount(&server)
            .await;

        let backend = HttpAnalysisBackend::new(server.uri(), None);
        let receipt = backend
            .upload_contract("contract.pdf", b"%PDF-1.4".to_vec())
            .await
            .unwrap();
        assert_eq!(receipt.session_id, "abc");
    }

    #[tokio::test]
    async fn sessions_for_device_scopes_by_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sessions"))
            .and(query_param("device_id", "device_1_aa"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"session_id": "remote-1", "detected_language": "arabic"}
            ])))
            .mount(&server)
            .await;

        let backend = HttpAnalysisBackend::new(server.uri(), None);
        let sessions = backend.sessions_for_device("device_1_aa").await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session_id, "remote-1");
        assert_eq!(sessions[0].detected_language, Language::Arabic);
    }

    #[tokio::test]
    async fn save_session_posts_full_record() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/save-session"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let backend = HttpAnalysisBackend::new(server.uri(), None);
        let session = Session::processing("abc", "contract.pdf");
        backend.save_session(&session).await.unwrap();
    }

    #[tokio::test]
    async fn file_cache_downloads_to_disk() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/docs/contract.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::TempDir::new().unwrap();
        let cache = HttpFileCache::new(dir.path());
        let local = cache
            .download(&format!("{}/docs/contract.pdf", server.uri()))
            .await
            .unwrap();
        assert_eq!(std::fs::read(&local).unwrap(), b"%PDF-1.4");
    }

    #[tokio::test]
    async fn file_cache_failure_is_none() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = HttpFileCache::new(dir.path());
        assert!(cache.download("http://127.0.0.1:1/doc.pdf").await.is_none());
    }
}
