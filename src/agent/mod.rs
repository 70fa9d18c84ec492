//! Agent orchestration: prompt rendering, reply parsing, and the dispatch
//! loop that turns one user command into one final response.

pub mod loop_;
pub mod parser;
pub mod prompt;
pub mod transcript;

pub use loop_::{dispatch, DispatchOutcome, RunStatus};
pub use parser::{Directive, ParseReason, ParsedReply};
pub use transcript::{Transcript, Turn};

use crate::config::Config;
use crate::providers::create_provider;
use crate::sandbox::{HttpTransport, SandboxManager};
use crate::tools::{default_tools, ToolRegistry};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

fn build_registry(config: &Config) -> Result<(ToolRegistry, Arc<SandboxManager>)> {
    let transport = HttpTransport::new(&config.sandbox.api_url, config.sandbox.api_key.as_deref());
    let sandbox = Arc::new(SandboxManager::new(Arc::new(transport)));
    let registry = default_tools(config, sandbox.clone())
        .context("failed to assemble the default tool registry")?;
    Ok((registry, sandbox))
}

/// Run the agent: single-shot when `message` is given, interactive otherwise.
pub async fn run(
    config: Config,
    message: Option<String>,
    provider_override: Option<String>,
    model_override: Option<String>,
    temperature: Option<f64>,
) -> Result<()> {
    let provider_name = provider_override
        .or_else(|| config.default_provider.clone())
        .unwrap_or_else(|| "openai".to_string());
    let model = model_override
        .or_else(|| config.default_model.clone())
        .unwrap_or_else(|| "gpt-4o-mini".to_string());
    let temperature = temperature.unwrap_or(config.default_temperature);

    let provider = create_provider(
        &provider_name,
        config.api_key.as_deref(),
        config.api_url.as_deref(),
        &model,
        temperature,
    )?;
    info!(provider = provider.name(), model, "agent starting");

    let (registry, sandbox) = build_registry(&config)?;
    let max_iterations = config.max_iterations();

    if let Some(message) = message {
        let outcome = dispatch(provider.as_ref(), &registry, &message, max_iterations).await;
        println!("{}", outcome.response);
        if sandbox.is_active().await {
            sandbox.close().await;
        }
        return Ok(());
    }

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        let outcome = dispatch(provider.as_ref(), &registry, line, max_iterations).await;
        println!("{}", outcome.response);
    }

    if sandbox.is_active().await {
        sandbox.close().await;
    }
    Ok(())
}
