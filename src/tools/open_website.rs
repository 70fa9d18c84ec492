//! Website opener tool.

use crate::tools::traits::{FieldSpec, FieldType, InputSchema, Tool};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::process::Command;

/// Opens a website in the user's default browser.
pub struct OpenWebsiteTool;

impl OpenWebsiteTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for OpenWebsiteTool {
    fn default() -> Self {
        Self::new()
    }
}

/// Turn whatever the model supplied into a browsable URL. Bare names like
/// "youtube" become `https://youtube.com`.
fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return trimmed.to_string();
    }
    if trimmed.contains('.') {
        return format!("https://{trimmed}");
    }
    format!("https://{trimmed}.com")
}

fn open_command(url: &str) -> Command {
    #[cfg(target_os = "windows")]
    {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", "start", "", url]);
        cmd
    }
    #[cfg(target_os = "macos")]
    {
        let mut cmd = Command::new("open");
        cmd.arg(url);
        cmd
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        let mut cmd = Command::new("xdg-open");
        cmd.arg(url);
        cmd
    }
}

#[async_trait]
impl Tool for OpenWebsiteTool {
    fn name(&self) -> &str {
        "open_website"
    }

    fn description(&self) -> &str {
        "Open a website in the user's default browser. Accepts a full URL, a domain, or a bare \
         site name like 'youtube'."
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new().field(FieldSpec::required(
            "web_site_name",
            FieldType::String,
            "Website to open: a URL, domain, or bare site name",
        ))
    }

    async fn invoke(&self, input: Map<String, Value>) -> anyhow::Result<String> {
        let site = input
            .get("web_site_name")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("field 'web_site_name' missing after validation"))?;

        let url = normalize_url(site);
        let rendered = match open_command(&url).spawn() {
            Ok(_) => json!({
                "status": "success",
                "url": url,
            }),
            Err(e) => json!({
                "status": "error",
                "url": url,
                "message": format!("could not open browser: {e}"),
            }),
        };
        Ok(rendered.to_string())
    }
}
