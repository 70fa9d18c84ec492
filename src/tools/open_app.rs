//! Desktop application launcher tool.

use crate::tools::traits::{FieldSpec, FieldType, InputSchema, Tool};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::process::Command;

/// Launches a desktop application by name on the host machine.
pub struct OpenAppTool;

impl OpenAppTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for OpenAppTool {
    fn default() -> Self {
        Self::new()
    }
}

fn launch_command(app_name: &str) -> Command {
    #[cfg(target_os = "windows")]
    {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", "start", "", app_name]);
        cmd
    }
    #[cfg(target_os = "macos")]
    {
        let mut cmd = Command::new("open");
        cmd.args(["-a", app_name]);
        cmd
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        Command::new(app_name)
    }
}

#[async_trait]
impl Tool for OpenAppTool {
    fn name(&self) -> &str {
        "open_app"
    }

    fn description(&self) -> &str {
        "Open a desktop application on the user's machine by its name."
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new().field(FieldSpec::required(
            "app_name",
            FieldType::String,
            "Name of the application to open, e.g. 'notepad' or 'Spotify'",
        ))
    }

    async fn invoke(&self, input: Map<String, Value>) -> anyhow::Result<String> {
        let app_name = input
            .get("app_name")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("field 'app_name' missing after validation"))?;

        let rendered = match launch_command(app_name).spawn() {
            Ok(_) => json!({
                "status": "success",
                "message": format!("launched '{app_name}'"),
            }),
            Err(e) => json!({
                "status": "error",
                "message": format!("could not launch '{app_name}': {e}"),
            }),
        };
        Ok(rendered.to_string())
    }
}
