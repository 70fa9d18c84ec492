#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::doc_markdown, clippy::uninlined_format_args)]

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use reagent::config::Config;
use reagent::providers::list_providers;
use reagent::sandbox::{HttpTransport, SandboxManager};
use reagent::tools::default_tools;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

fn parse_temperature(s: &str) -> std::result::Result<f64, String> {
    let t: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if !(0.0..=2.0).contains(&t) {
        return Err("temperature must be between 0.0 and 2.0".to_string());
    }
    Ok(t)
}

/// `Reagent` - a tool-dispatching personal assistant.
#[derive(Parser, Debug)]
#[command(name = "reagent")]
#[command(version)]
#[command(about = "Personal assistant agent with sandboxed code execution.", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the agent loop
    #[command(long_about = "\
Start the agent loop.

Launches an interactive session with the configured provider. \
Use --message for single-shot queries without entering interactive mode.

Examples:
  reagent agent                           # interactive session
  reagent agent -m \"open notepad\"         # single message
  reagent agent -p groq --model llama-3.3-70b-versatile")]
    Agent {
        /// Single message mode (don't enter interactive mode)
        #[arg(short, long)]
        message: Option<String>,

        /// Provider to use (openai, openrouter, groq, custom:<URL>)
        #[arg(short, long)]
        provider: Option<String>,

        /// Model to use
        #[arg(long)]
        model: Option<String>,

        /// Temperature (0.0 - 2.0)
        #[arg(short, long, value_parser = parse_temperature)]
        temperature: Option<f64>,
    },

    /// Show the effective configuration
    Status,

    /// List registered tools and their input contracts
    Tools,
}

fn show_status(config: &Config) {
    println!("reagent {}", env!("CARGO_PKG_VERSION"));
    println!("config:         {}", config.config_path.display());
    println!(
        "provider:       {}",
        config.default_provider.as_deref().unwrap_or("openai")
    );
    println!(
        "model:          {}",
        config.default_model.as_deref().unwrap_or("gpt-4o-mini")
    );
    println!("temperature:    {}", config.default_temperature);
    println!("max iterations: {}", config.max_iterations());
    println!("sandbox url:    {}", config.sandbox.api_url);
    println!(
        "sandbox key:    {}",
        if config.sandbox.api_key.is_some() {
            "set"
        } else {
            "not set"
        }
    );
    let supported: Vec<&str> = list_providers().iter().map(|p| p.name).collect();
    println!("providers:      {}", supported.join(", "));
}

fn show_tools(config: &Config) -> Result<()> {
    let transport = HttpTransport::new(&config.sandbox.api_url, config.sandbox.api_key.as_deref());
    let sandbox = Arc::new(SandboxManager::new(Arc::new(transport)));
    let registry = default_tools(config, sandbox)?;

    for spec in registry.all_specs() {
        println!("{}", spec.name);
        println!("  {}", spec.description);
        if spec.input.fields().is_empty() {
            println!("  (no input fields)");
        }
        for field in spec.input.fields() {
            let requirement = if field.required { "required" } else { "optional" };
            println!(
                "  {} ({}, {}): {}",
                field.name, field.ty, requirement, field.description
            );
        }
        println!();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(config_dir) = &cli.config_dir {
        if config_dir.trim().is_empty() {
            bail!("--config-dir cannot be empty");
        }
        std::env::set_var("REAGENT_CONFIG_DIR", config_dir);
    }

    // Respects RUST_LOG, defaults to INFO.
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = Config::load_or_init().await?;

    match cli.command {
        Commands::Agent {
            message,
            provider,
            model,
            temperature,
        } => reagent::agent::run(config, message, provider, model, temperature).await,

        Commands::Status => {
            show_status(&config);
            Ok(())
        }

        Commands::Tools => show_tools(&config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn agent_flags_parse() {
        let cli = Cli::parse_from([
            "reagent", "agent", "-m", "open notepad", "-p", "groq", "--model", "m", "-t", "0.5",
        ]);
        match cli.command {
            Commands::Agent {
                message,
                provider,
                temperature,
                ..
            } => {
                assert_eq!(message.as_deref(), Some("open notepad"));
                assert_eq!(provider.as_deref(), Some("groq"));
                assert_eq!(temperature, Some(0.5));
            }
            other => panic!("expected agent command, got {other:?}"),
        }
    }

    #[test]
    fn temperature_out_of_range_is_rejected() {
        assert!(Cli::try_parse_from(["reagent", "agent", "-t", "3.0"]).is_err());
        assert!(parse_temperature("2.0").is_ok());
        assert!(parse_temperature("-0.1").is_err());
    }

    #[test]
    fn global_config_dir_parses() {
        let cli = Cli::parse_from(["reagent", "--config-dir", "/tmp/r", "status"]);
        assert_eq!(cli.config_dir.as_deref(), Some("/tmp/r"));
    }
}
