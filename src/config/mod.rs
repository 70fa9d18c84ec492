//! Configuration, loaded from `config.toml`.
//!
//! Resolution order: `REAGENT_CONFIG_DIR` env → `~/.reagent/config.toml`.
//! A default config file is written on first run. Environment variables
//! override file values after loading.

use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml, computed at load time and not serialized.
    #[serde(skip)]
    pub config_path: PathBuf,
    /// API key for the selected provider. Overridden by `REAGENT_API_KEY` or
    /// `OPENAI_API_KEY` env vars.
    pub api_key: Option<String>,
    /// Base URL override for the provider API (for self-hosted gateways).
    pub api_url: Option<String>,
    /// Default provider key (`"openai"`, `"openrouter"`, `"groq"`, `"custom:<URL>"`).
    pub default_provider: Option<String>,
    /// Default model routed through the selected provider.
    pub default_model: Option<String>,
    /// Default model temperature (0.0-2.0).
    pub default_temperature: f64,

    /// Dispatch loop settings (`[agent]`).
    #[serde(default)]
    pub agent: AgentConfig,

    /// Sandbox service settings (`[sandbox]`).
    #[serde(default)]
    pub sandbox: SandboxConfig,
}

/// Dispatch loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model-call budget per dispatch run. 0 falls back to the default.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
        }
    }
}

/// Remote sandbox service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Base URL of the sandbox service.
    #[serde(default = "default_sandbox_api_url")]
    pub api_url: String,
    /// Sandbox API key. Overridden by `REAGENT_SANDBOX_API_KEY`.
    pub api_key: Option<String>,
    /// Per-execution deadline in seconds.
    #[serde(default = "default_exec_timeout_secs")]
    pub exec_timeout_secs: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            api_url: default_sandbox_api_url(),
            api_key: None,
            exec_timeout_secs: default_exec_timeout_secs(),
        }
    }
}

fn default_max_iterations() -> usize {
    10
}

fn default_sandbox_api_url() -> String {
    "https://api.sandbox.reagent.dev".to_string()
}

fn default_exec_timeout_secs() -> u64 {
    120
}

impl Default for Config {
    fn default() -> Self {
        let home =
            UserDirs::new().map_or_else(|| PathBuf::from("."), |u| u.home_dir().to_path_buf());
        let reagent_dir = home.join(".reagent");

        Self {
            config_path: reagent_dir.join("config.toml"),
            api_key: None,
            api_url: None,
            default_provider: Some("openai".to_string()),
            default_model: Some("gpt-4o-mini".to_string()),
            default_temperature: 0.1,
            agent: AgentConfig::default(),
            sandbox: SandboxConfig::default(),
        }
    }
}

fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("REAGENT_CONFIG_DIR") {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    let home = UserDirs::new()
        .map(|u| u.home_dir().to_path_buf())
        .context("Could not find home directory")?;
    Ok(home.join(".reagent"))
}

impl Config {
    /// Load config.toml, writing a default file on first run.
    pub async fn load_or_init() -> Result<Self> {
        let dir = config_dir()?;
        let config_path = dir.join("config.toml");

        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create config directory {}", dir.display()))?;

        let mut config = if config_path.exists() {
            let contents = fs::read_to_string(&config_path)
                .await
                .context("Failed to read config file")?;
            let mut config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            config.config_path = config_path.clone();
            config
        } else {
            let mut config = Config::default();
            config.config_path = config_path.clone();
            config.save().await?;
            config
        };

        config.apply_env_overrides();
        config.validate()?;
        tracing::info!(path = %config.config_path.display(), "Config loaded");
        Ok(config)
    }

    pub async fn save(&self) -> Result<()> {
        let serialized = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&self.config_path, serialized)
            .await
            .with_context(|| format!("Failed to write {}", self.config_path.display()))?;
        Ok(())
    }

    /// Apply environment variable overrides to file values.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) =
            std::env::var("REAGENT_API_KEY").or_else(|_| std::env::var("OPENAI_API_KEY"))
        {
            if !key.is_empty() {
                self.api_key = Some(key);
            }
        }

        if let Ok(provider) = std::env::var("REAGENT_PROVIDER") {
            if !provider.is_empty() {
                self.default_provider = Some(provider);
            }
        }

        if let Ok(model) = std::env::var("REAGENT_MODEL") {
            if !model.is_empty() {
                self.default_model = Some(model);
            }
        }

        if let Ok(key) = std::env::var("REAGENT_SANDBOX_API_KEY") {
            if !key.is_empty() {
                self.sandbox.api_key = Some(key);
            }
        }
    }

    /// Catch values that would fail at arbitrary runtime points.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.default_temperature) {
            anyhow::bail!("default_temperature must be between 0.0 and 2.0");
        }
        if self.sandbox.api_url.trim().is_empty() {
            anyhow::bail!("sandbox.api_url must not be empty");
        }
        Ok(())
    }

    /// Effective model-call budget; a configured 0 falls back to the default.
    pub fn max_iterations(&self) -> usize {
        if self.agent.max_iterations == 0 {
            default_max_iterations()
        } else {
            self.agent.max_iterations
        }
    }
}
