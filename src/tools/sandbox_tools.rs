//! Tools backed by the shared sandbox session.
//!
//! All five tools hold the same [`SandboxManager`]; the first one the model
//! invokes creates the session and the rest reuse it. Observations are JSON
//! objects with a `status` field so the model can branch on the outcome.

use crate::sandbox::{ExecOutcome, FsError, SandboxManager};
use crate::tools::traits::{FieldSpec, FieldType, InputSchema, Tool};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;

fn str_field(input: &Map<String, Value>, name: &str) -> anyhow::Result<String> {
    input
        .get(name)
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| anyhow::anyhow!("field '{name}' missing after validation"))
}

fn observation(value: Value) -> String {
    value.to_string()
}

/// Runs code in the sandbox session and reports the classified outcome.
pub struct ExecutorTool {
    sandbox: Arc<SandboxManager>,
    default_timeout: Duration,
}

impl ExecutorTool {
    pub fn new(sandbox: Arc<SandboxManager>, default_timeout: Duration) -> Self {
        Self {
            sandbox,
            default_timeout,
        }
    }
}

#[async_trait]
impl Tool for ExecutorTool {
    fn name(&self) -> &str {
        "executor"
    }

    fn description(&self) -> &str {
        "Execute Python code in an isolated sandbox session. State (variables, files, installed \
         packages) persists across calls until the session is closed."
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new()
            .field(FieldSpec::required(
                "code",
                FieldType::String,
                "Python source to execute",
            ))
            .field(FieldSpec::optional(
                "timeout_secs",
                FieldType::Integer,
                Some(json!(self.default_timeout.as_secs())),
                "Execution deadline in seconds",
            ))
    }

    async fn invoke(&self, input: Map<String, Value>) -> anyhow::Result<String> {
        let code = str_field(&input, "code")?;
        let timeout = input
            .get("timeout_secs")
            .and_then(Value::as_u64)
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);

        let outcome = self.sandbox.run(&code, timeout).await;

        let rendered = match outcome {
            ExecOutcome::Success { output } => json!({
                "status": "success",
                "output": output,
            }),
            ExecOutcome::SuccessNoOutput => json!({
                "status": "success",
                "output": "",
                "note": "code ran without errors but produced no output; add print() calls to see values",
            }),
            ExecOutcome::RuntimeError {
                name,
                message,
                traceback,
                missing_modules,
            } => {
                let mut body = json!({
                    "status": "runtime_error",
                    "error_name": name,
                    "error_message": message,
                    "traceback": traceback,
                });
                if !missing_modules.is_empty() {
                    body["missing_modules"] = json!(missing_modules);
                    body["note"] = json!(
                        "install the missing modules first, e.g. run `import subprocess; subprocess.run(['pip', 'install', ...])` via this tool"
                    );
                }
                body
            }
            ExecOutcome::Timeout { seconds } => json!({
                "status": "timeout",
                "seconds": seconds,
                "note": "execution exceeded the deadline; the session is still active",
            }),
            ExecOutcome::Transport { message } => json!({
                "status": "transport_error",
                "detail": message,
            }),
        };

        Ok(observation(rendered))
    }
}

/// Reads a file from the sandbox filesystem.
pub struct FileReadTool {
    sandbox: Arc<SandboxManager>,
}

impl FileReadTool {
    pub fn new(sandbox: Arc<SandboxManager>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "file_read"
    }

    fn description(&self) -> &str {
        "Read a text file from the sandbox filesystem and return its contents."
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new().field(FieldSpec::required(
            "path",
            FieldType::String,
            "Absolute path of the file inside the sandbox",
        ))
    }

    async fn invoke(&self, input: Map<String, Value>) -> anyhow::Result<String> {
        let path = str_field(&input, "path")?;
        let rendered = match self.sandbox.read_file(&path).await? {
            Ok(content) => json!({
                "status": "success",
                "path": path,
                "content": content,
            }),
            Err(FsError::NotFound(_)) => json!({
                "status": "not_found",
                "path": path,
            }),
            Err(FsError::Io(detail)) => json!({
                "status": "error",
                "path": path,
                "detail": detail,
            }),
        };
        Ok(observation(rendered))
    }
}

/// Writes a file into the sandbox filesystem, creating parent directories.
pub struct FileWriteTool {
    sandbox: Arc<SandboxManager>,
}

impl FileWriteTool {
    pub fn new(sandbox: Arc<SandboxManager>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "file_write"
    }

    fn description(&self) -> &str {
        "Write text to a file in the sandbox filesystem, creating parent directories as needed."
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new()
            .field(FieldSpec::required(
                "path",
                FieldType::String,
                "Absolute path of the file inside the sandbox",
            ))
            .field(FieldSpec::required(
                "content",
                FieldType::String,
                "Text content to write",
            ))
    }

    async fn invoke(&self, input: Map<String, Value>) -> anyhow::Result<String> {
        let path = str_field(&input, "path")?;
        let content = str_field(&input, "content")?;
        let rendered = match self.sandbox.write_file(&path, &content).await? {
            Ok(()) => json!({
                "status": "success",
                "path": path,
                "bytes_written": content.len(),
            }),
            Err(FsError::NotFound(_)) => json!({
                "status": "not_found",
                "path": path,
            }),
            Err(FsError::Io(detail)) => json!({
                "status": "error",
                "path": path,
                "detail": detail,
            }),
        };
        Ok(observation(rendered))
    }
}

/// Lists a directory in the sandbox filesystem.
pub struct ListFilesTool {
    sandbox: Arc<SandboxManager>,
}

impl ListFilesTool {
    pub fn new(sandbox: Arc<SandboxManager>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List the entries of a directory in the sandbox filesystem."
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new().field(FieldSpec::optional(
            "path",
            FieldType::String,
            Some(json!(".")),
            "Directory to list; defaults to the session working directory",
        ))
    }

    async fn invoke(&self, input: Map<String, Value>) -> anyhow::Result<String> {
        let path = str_field(&input, "path")?;
        let rendered = match self.sandbox.list_dir(&path).await? {
            Ok(entries) => {
                let listed: Vec<Value> = entries
                    .iter()
                    .map(|e| json!({"name": e.name, "is_dir": e.is_dir}))
                    .collect();
                json!({
                    "status": "success",
                    "path": path,
                    "entries": listed,
                })
            }
            Err(FsError::NotFound(_)) => json!({
                "status": "not_found",
                "path": path,
            }),
            Err(FsError::Io(detail)) => json!({
                "status": "error",
                "path": path,
                "detail": detail,
            }),
        };
        Ok(observation(rendered))
    }
}

/// Tears down the sandbox session.
pub struct CloseSandboxTool {
    sandbox: Arc<SandboxManager>,
}

impl CloseSandboxTool {
    pub fn new(sandbox: Arc<SandboxManager>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for CloseSandboxTool {
    fn name(&self) -> &str {
        "close_sandbox"
    }

    fn description(&self) -> &str {
        "Close the sandbox session, discarding its state. Use when the user is done with code \
         execution. Safe to call when no session is active."
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new()
    }

    async fn invoke(&self, _input: Map<String, Value>) -> anyhow::Result<String> {
        let message = self.sandbox.close().await;
        let status = if message.starts_with("warning:") {
            "warning"
        } else if message.starts_with("error:") {
            "error"
        } else {
            "success"
        };
        Ok(observation(json!({
            "status": status,
            "message": message,
        })))
    }
}
