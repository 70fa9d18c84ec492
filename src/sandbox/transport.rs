//! Transport layer for the remote execution service.
//!
//! [`SandboxTransport`] is the seam between the session lifecycle logic in
//! [`super::SandboxManager`] and the wire protocol of the hosted sandbox
//! service. Production uses [`HttpTransport`]; tests inject a scripted fake.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Filesystem failures, split so callers can distinguish a missing path from
/// everything else.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum FsError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("io error: {0}")]
    Io(String),
}

/// Structured result of one remote code execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecReport {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub error: Option<ExecError>,
}

/// Runtime error raised by the executed code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecError {
    pub name: String,
    pub message: String,
    #[serde(default)]
    pub traceback: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Wire operations against the remote sandbox service.
///
/// `create` returns an opaque session handle; all other operations take that
/// handle. Transport errors are plain `anyhow` errors here; classification
/// into user-facing outcomes happens in the manager.
#[async_trait]
pub trait SandboxTransport: Send + Sync {
    async fn create(&self) -> anyhow::Result<String>;
    async fn exec(&self, session: &str, code: &str) -> anyhow::Result<ExecReport>;
    async fn read_file(&self, session: &str, path: &str) -> Result<String, FsError>;
    async fn write_file(&self, session: &str, path: &str, content: &str) -> Result<(), FsError>;
    /// Idempotent: succeeding on an already-existing directory is not an error.
    async fn make_dir(&self, session: &str, path: &str) -> Result<(), FsError>;
    async fn list_dir(&self, session: &str, path: &str) -> Result<Vec<DirEntry>, FsError>;
    async fn kill(&self, session: &str) -> anyhow::Result<()>;
}

/// HTTP client for the hosted sandbox service.
pub struct HttpTransport {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    session_id: String,
}

#[derive(Debug, Serialize)]
struct ExecRequest<'a> {
    code: &'a str,
}

#[derive(Debug, Deserialize)]
struct FileResponse {
    content: String,
}

#[derive(Debug, Serialize)]
struct WriteRequest<'a> {
    path: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct MkdirRequest<'a> {
    path: &'a str,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    entries: Vec<DirEntry>,
}

impl HttpTransport {
    pub fn new(base_url: &str, api_key: Option<&str>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(ToString::to_string),
            client: reqwest::Client::builder()
                .connect_timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> anyhow::Result<reqwest::RequestBuilder> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            anyhow::anyhow!(
                "sandbox API key not set. Set sandbox.api_key in config.toml or REAGENT_SANDBOX_API_KEY."
            )
        })?;
        Ok(req.header("Authorization", format!("Bearer {api_key}")))
    }

    async fn check(&self, response: reqwest::Response) -> anyhow::Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("sandbox service error ({status}): {}", body.trim())
    }

    async fn check_fs(&self, response: reqwest::Response, path: &str) -> Result<reqwest::Response, FsError> {
        if response.status().is_success() {
            return Ok(response);
        }
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(FsError::NotFound(path.to_string()));
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(FsError::Io(format!("{status}: {}", body.trim())))
    }
}

#[async_trait]
impl SandboxTransport for HttpTransport {
    async fn create(&self) -> anyhow::Result<String> {
        let response = self
            .authed(self.client.post(self.url("/v1/sessions")))?
            .send()
            .await?;
        let created: CreateResponse = self.check(response).await?.json().await?;
        Ok(created.session_id)
    }

    async fn exec(&self, session: &str, code: &str) -> anyhow::Result<ExecReport> {
        let response = self
            .authed(
                self.client
                    .post(self.url(&format!("/v1/sessions/{session}/exec")))
                    .json(&ExecRequest { code }),
            )?
            .send()
            .await?;
        Ok(self.check(response).await?.json().await?)
    }

    async fn read_file(&self, session: &str, path: &str) -> Result<String, FsError> {
        let send = async {
            self.authed(
                self.client
                    .get(self.url(&format!("/v1/sessions/{session}/files")))
                    .query(&[("path", path)]),
            )?
            .send()
            .await
            .map_err(anyhow::Error::from)
        };
        let response = send.await.map_err(|e| FsError::Io(e.to_string()))?;
        let body: FileResponse = self
            .check_fs(response, path)
            .await?
            .json()
            .await
            .map_err(|e| FsError::Io(e.to_string()))?;
        Ok(body.content)
    }

    async fn write_file(&self, session: &str, path: &str, content: &str) -> Result<(), FsError> {
        let send = async {
            self.authed(
                self.client
                    .put(self.url(&format!("/v1/sessions/{session}/files")))
                    .json(&WriteRequest { path, content }),
            )?
            .send()
            .await
            .map_err(anyhow::Error::from)
        };
        let response = send.await.map_err(|e| FsError::Io(e.to_string()))?;
        self.check_fs(response, path).await?;
        Ok(())
    }

    async fn make_dir(&self, session: &str, path: &str) -> Result<(), FsError> {
        let send = async {
            self.authed(
                self.client
                    .post(self.url(&format!("/v1/sessions/{session}/mkdir")))
                    .json(&MkdirRequest { path }),
            )?
            .send()
            .await
            .map_err(anyhow::Error::from)
        };
        let response = send.await.map_err(|e| FsError::Io(e.to_string()))?;
        // 409 means the directory already exists; the contract is idempotent.
        if response.status() == reqwest::StatusCode::CONFLICT {
            return Ok(());
        }
        self.check_fs(response, path).await?;
        Ok(())
    }

    async fn list_dir(&self, session: &str, path: &str) -> Result<Vec<DirEntry>, FsError> {
        let send = async {
            self.authed(
                self.client
                    .get(self.url(&format!("/v1/sessions/{session}/files/list")))
                    .query(&[("path", path)]),
            )?
            .send()
            .await
            .map_err(anyhow::Error::from)
        };
        let response = send.await.map_err(|e| FsError::Io(e.to_string()))?;
        let body: ListResponse = self
            .check_fs(response, path)
            .await?
            .json()
            .await
            .map_err(|e| FsError::Io(e.to_string()))?;
        Ok(body.entries)
    }

    async fn kill(&self, session: &str) -> anyhow::Result<()> {
        let response = self
            .authed(
                self.client
                    .delete(self.url(&format!("/v1/sessions/{session}"))),
            )?
            .send()
            .await?;
        self.check(response).await?;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exec_report_deserializes_with_defaults() {
        let report: ExecReport = serde_json::from_str("{}").unwrap();
        assert!(report.stdout.is_empty());
        assert!(report.error.is_none());
    }

    #[test]
    fn exec_report_deserializes_runtime_error() {
        let json = r#"{"stdout":"","error":{"name":"NameError","message":"name 'x' is not defined","traceback":"Traceback..."}}"#;
        let report: ExecReport = serde_json::from_str(json).unwrap();
        let error = report.error.unwrap();
        assert_eq!(error.name, "NameError");
        assert!(error.traceback.starts_with("Traceback"));
    }

    #[test]
    fn fs_error_messages_distinguish_not_found() {
        assert_eq!(
            FsError::NotFound("/tmp/x".into()).to_string(),
            "not found: /tmp/x"
        );
        assert!(FsError::Io("boom".into()).to_string().starts_with("io error"));
    }

    #[test]
    fn transport_strips_trailing_slash() {
        let t = HttpTransport::new("https://sandbox.example.com/", Some("key"));
        assert_eq!(t.url("/v1/sessions"), "https://sandbox.example.com/v1/sessions");
    }

    #[tokio::test]
    async fn missing_api_key_is_a_config_error() {
        let t = HttpTransport::new("https://sandbox.example.com", None);
        let err = t.create().await.unwrap_err().to_string();
        assert!(err.contains("sandbox API key not set"));
    }
}
