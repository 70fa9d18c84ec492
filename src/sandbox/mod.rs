//! Sandboxed execution environment.
//!
//! [`SandboxManager`] owns at most one remote session at a time. The session
//! is created lazily on first use, survives individual execution timeouts,
//! and can be closed and later re-created within the same process. All wire
//! interaction goes through the [`transport::SandboxTransport`] seam.

pub mod transport;

pub use transport::{DirEntry, ExecError, ExecReport, FsError, HttpTransport, SandboxTransport};

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// One live remote session.
#[derive(Debug, Clone)]
pub struct Session {
    pub handle: String,
    pub created_at: DateTime<Utc>,
}

/// Classified result of one code execution.
#[derive(Debug, Clone)]
pub enum ExecOutcome {
    /// Code ran and produced stdout/stderr text.
    Success { output: String },
    /// Code ran cleanly but printed nothing.
    SuccessNoOutput,
    /// Code raised a runtime error inside the session.
    RuntimeError {
        name: String,
        message: String,
        traceback: String,
        /// Module names parsed out of import failures, if any.
        missing_modules: Vec<String>,
    },
    /// Execution exceeded the deadline. The session itself is still usable.
    Timeout { seconds: u64 },
    /// The request never completed at the wire level.
    Transport { message: String },
}

/// Owns the single sandbox session and classifies execution results.
pub struct SandboxManager {
    transport: Arc<dyn SandboxTransport>,
    session: Mutex<Option<Session>>,
}

impl SandboxManager {
    pub fn new(transport: Arc<dyn SandboxTransport>) -> Self {
        Self {
            transport,
            session: Mutex::new(None),
        }
    }

    /// Handle of the active session, creating one if none exists.
    async fn ensure_session(&self) -> anyhow::Result<String> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref() {
            return Ok(session.handle.clone());
        }
        let handle = self.transport.create().await?;
        info!(session = %handle, "sandbox session created");
        *guard = Some(Session {
            handle: handle.clone(),
            created_at: Utc::now(),
        });
        Ok(handle)
    }

    pub async fn is_active(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Execute `code` in the session, enforcing `timeout` locally.
    ///
    /// A timeout abandons the in-flight request but keeps the session; the
    /// next call reuses it.
    pub async fn run(&self, code: &str, timeout: Duration) -> ExecOutcome {
        let handle = match self.ensure_session().await {
            Ok(handle) => handle,
            Err(e) => {
                return ExecOutcome::Transport {
                    message: e.to_string(),
                }
            }
        };

        let report = match tokio::time::timeout(timeout, self.transport.exec(&handle, code)).await {
            Err(_) => {
                warn!(seconds = timeout.as_secs(), "sandbox execution timed out");
                return ExecOutcome::Timeout {
                    seconds: timeout.as_secs(),
                };
            }
            Ok(Err(e)) => {
                return ExecOutcome::Transport {
                    message: e.to_string(),
                }
            }
            Ok(Ok(report)) => report,
        };

        if let Some(error) = report.error {
            let missing_modules = extract_missing_modules(&error.traceback);
            return ExecOutcome::RuntimeError {
                name: error.name,
                message: error.message,
                traceback: error.traceback,
                missing_modules,
            };
        }

        let mut output = report.stdout;
        if !report.stderr.trim().is_empty() {
            if !output.is_empty() {
                output.push('\n');
            }
            output.push_str(&report.stderr);
        }

        if output.trim().is_empty() {
            ExecOutcome::SuccessNoOutput
        } else {
            ExecOutcome::Success { output }
        }
    }

    pub async fn read_file(&self, path: &str) -> anyhow::Result<Result<String, FsError>> {
        let handle = self.ensure_session().await?;
        Ok(self.transport.read_file(&handle, path).await)
    }

    /// Write `content` to `path`, creating the parent directory first.
    pub async fn write_file(&self, path: &str, content: &str) -> anyhow::Result<Result<(), FsError>> {
        let handle = self.ensure_session().await?;
        if let Some(parent) = parent_dir(path) {
            if let Err(e) = self.transport.make_dir(&handle, &parent).await {
                debug!(path = %parent, error = %e, "mkdir before write failed");
            }
        }
        Ok(self.transport.write_file(&handle, path, content).await)
    }

    pub async fn list_dir(&self, path: &str) -> anyhow::Result<Result<Vec<DirEntry>, FsError>> {
        let handle = self.ensure_session().await?;
        Ok(self.transport.list_dir(&handle, path).await)
    }

    /// Close the active session. Always returns user-facing text.
    ///
    /// Closing when nothing is active is a warning, not an error. If the kill
    /// request fails the session is kept so a later attempt can retry.
    pub async fn close(&self) -> String {
        let mut guard = self.session.lock().await;
        let Some(session) = guard.as_ref() else {
            return "warning: no sandbox session is currently active.".to_string();
        };

        match self.transport.kill(&session.handle).await {
            Ok(()) => {
                info!(session = %session.handle, "sandbox session closed");
                *guard = None;
                "sandbox session closed successfully.".to_string()
            }
            Err(e) => {
                warn!(session = %session.handle, error = %e, "failed to close sandbox session");
                format!("error: failed to close sandbox session: {e}")
            }
        }
    }
}

fn parent_dir(path: &str) -> Option<String> {
    let trimmed = path.trim_end_matches('/');
    let idx = trimmed.rfind('/')?;
    if idx == 0 {
        return None;
    }
    Some(trimmed[..idx].to_string())
}

/// Pull module names out of an import-failure traceback.
///
/// Matches both `ModuleNotFoundError: No module named 'x'` and the older
/// `ImportError: cannot import name 'y' from 'x'` form. Names are deduped
/// and sorted.
pub fn extract_missing_modules(traceback: &str) -> Vec<String> {
    let mut modules: Vec<String> = Vec::new();

    let no_module =
        Regex::new(r#"(?:ModuleNotFoundError|ImportError): No module named ['"]([^'"]+)['"]"#)
            .expect("static regex");
    for captures in no_module.captures_iter(traceback) {
        modules.push(captures[1].to_string());
    }

    let cannot_import =
        Regex::new(r#"ImportError: cannot import name ['"][^'"]+['"] from ['"]([^'"]+)['"]"#)
            .expect("static regex");
    for captures in cannot_import.captures_iter(traceback) {
        modules.push(captures[1].to_string());
    }

    modules.sort();
    modules.dedup();
    modules
}

#[cfg(test)]
mod tests {
    use super::transport::tests_support::FakeTransport;
    use super::*;

    fn manager(transport: FakeTransport) -> SandboxManager {
        SandboxManager::new(Arc::new(transport))
    }

    #[tokio::test]
    async fn session_is_created_lazily_and_reused() {
        let transport = Arc::new(FakeTransport::new());
        let manager = SandboxManager::new(transport.clone());

        assert!(!manager.is_active().await);
        manager.run("print(1)", Duration::from_secs(5)).await;
        assert!(manager.is_active().await);
        manager.run("print(2)", Duration::from_secs(5)).await;
        assert_eq!(transport.state.lock().created, 1);
    }

    #[tokio::test]
    async fn clean_run_with_output_is_success() {
        let manager = manager(FakeTransport::new().with_report(ExecReport {
            stdout: "42\n".into(),
            ..Default::default()
        }));
        match manager.run("print(42)", Duration::from_secs(5)).await {
            ExecOutcome::Success { output } => assert_eq!(output, "42\n"),
            other => panic!("expected Success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn clean_run_without_output_is_distinct() {
        let manager = manager(FakeTransport::new());
        assert!(matches!(
            manager.run("x = 1", Duration::from_secs(5)).await,
            ExecOutcome::SuccessNoOutput
        ));
    }

    #[tokio::test]
    async fn stderr_is_folded_into_output() {
        let manager = manager(FakeTransport::new().with_report(ExecReport {
            stdout: "out".into(),
            stderr: "warning text".into(),
            error: None,
        }));
        match manager.run("...", Duration::from_secs(5)).await {
            ExecOutcome::Success { output } => {
                assert!(output.contains("out"));
                assert!(output.contains("warning text"));
            }
            other => panic!("expected Success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn runtime_error_carries_name_message_and_modules() {
        let manager = manager(FakeTransport::new().with_report(ExecReport {
            stdout: String::new(),
            stderr: String::new(),
            error: Some(ExecError {
                name: "ModuleNotFoundError".into(),
                message: "No module named 'pandas'".into(),
                traceback: "Traceback (most recent call last):\nModuleNotFoundError: No module named 'pandas'".into(),
            }),
        }));
        match manager.run("import pandas", Duration::from_secs(5)).await {
            ExecOutcome::RuntimeError {
                name,
                missing_modules,
                ..
            } => {
                assert_eq!(name, "ModuleNotFoundError");
                assert_eq!(missing_modules, vec!["pandas".to_string()]);
            }
            other => panic!("expected RuntimeError, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_reports_deadline_and_keeps_session() {
        let manager = manager(FakeTransport::new().with_exec_delay(Duration::from_secs(600)));

        match manager.run("while True: pass", Duration::from_secs(2)).await {
            ExecOutcome::Timeout { seconds } => assert_eq!(seconds, 2),
            other => panic!("expected Timeout, got {other:?}"),
        }
        assert!(manager.is_active().await);

        // A follow-up call still reaches the same session.
        let outcome = manager.run("print('ok')", Duration::from_secs(700)).await;
        assert!(!matches!(outcome, ExecOutcome::Transport { .. }));
    }

    #[tokio::test]
    async fn create_failure_is_a_transport_outcome() {
        let manager = manager(FakeTransport::failing_create());
        match manager.run("print(1)", Duration::from_secs(5)).await {
            ExecOutcome::Transport { message } => {
                assert!(message.contains("API key"));
            }
            other => panic!("expected Transport, got {other:?}"),
        }
        assert!(!manager.is_active().await);
    }

    #[tokio::test]
    async fn close_without_session_warns() {
        let manager = manager(FakeTransport::new());
        let first = manager.close().await;
        assert!(first.starts_with("warning:"));
        let second = manager.close().await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn close_then_run_recreates_session() {
        let transport = Arc::new(FakeTransport::new());
        let manager = SandboxManager::new(transport.clone());

        manager.run("print(1)", Duration::from_secs(5)).await;
        let closed = manager.close().await;
        assert!(closed.contains("closed successfully"));
        assert!(!manager.is_active().await);

        manager.run("print(2)", Duration::from_secs(5)).await;
        assert!(manager.is_active().await);
        assert_eq!(transport.state.lock().created, 2);
        assert_eq!(transport.state.lock().killed, vec!["session-1".to_string()]);
    }

    #[tokio::test]
    async fn failed_close_keeps_session() {
        let mut transport = FakeTransport::new();
        transport.fail_kill = true;
        let manager = manager(transport);

        manager.run("print(1)", Duration::from_secs(5)).await;
        let result = manager.close().await;
        assert!(result.starts_with("error:"));
        assert!(manager.is_active().await);
    }

    #[tokio::test]
    async fn write_file_creates_parent_dir_first() {
        let transport = Arc::new(FakeTransport::new());
        let manager = SandboxManager::new(transport.clone());

        manager
            .write_file("/workspace/out/data.txt", "hello")
            .await
            .unwrap()
            .unwrap();

        let state = transport.state.lock();
        assert_eq!(state.dirs, vec!["/workspace/out".to_string()]);
        assert_eq!(
            state.files.get("/workspace/out/data.txt").map(String::as_str),
            Some("hello")
        );
    }

    #[tokio::test]
    async fn read_missing_file_is_not_found() {
        let manager = manager(FakeTransport::new());
        let result = manager.read_file("/nope.txt").await.unwrap();
        assert_eq!(result, Err(FsError::NotFound("/nope.txt".to_string())));
    }

    #[test]
    fn parent_dir_handles_root_and_bare_names() {
        assert_eq!(parent_dir("/a/b/c.txt"), Some("/a/b".to_string()));
        assert_eq!(parent_dir("/c.txt"), None);
        assert_eq!(parent_dir("c.txt"), None);
    }

    #[test]
    fn extracts_module_not_found() {
        let tb = "Traceback (most recent call last):\n  File \"<stdin>\", line 1\nModuleNotFoundError: No module named 'numpy'";
        assert_eq!(extract_missing_modules(tb), vec!["numpy".to_string()]);
    }

    #[test]
    fn extracts_cannot_import_name_source() {
        let tb = "ImportError: cannot import name 'DataFrame' from 'pandas'";
        assert_eq!(extract_missing_modules(tb), vec!["pandas".to_string()]);
    }

    #[test]
    fn extraction_dedupes_and_sorts() {
        let tb = "ModuleNotFoundError: No module named 'zlib2'\nModuleNotFoundError: No module named 'abc_pkg'\nImportError: No module named 'zlib2'";
        assert_eq!(
            extract_missing_modules(tb),
            vec!["abc_pkg".to_string(), "zlib2".to_string()]
        );
    }

    #[test]
    fn extraction_on_unrelated_traceback_is_empty() {
        let tb = "Traceback (most recent call last):\nNameError: name 'x' is not defined";
        assert!(extract_missing_modules(tb).is_empty());
    }
}
