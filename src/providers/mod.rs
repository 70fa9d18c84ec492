//! Provider subsystem for model inference backends.
//!
//! Each provider implements the [`Provider`] trait defined in [`traits`] and
//! is created by the [`create_provider`] factory from its canonical string
//! key. Provider error bodies are sanitized before they can reach logs or the
//! user: known secret-token prefixes are redacted and long bodies truncated.

pub mod compatible;
pub mod traits;

pub use compatible::{AuthStyle, OpenAiCompatibleProvider};
pub use traits::Provider;

const MAX_API_ERROR_CHARS: usize = 200;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

fn is_secret_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':')
}

fn token_end(input: &str, from: usize) -> usize {
    let mut end = from;
    for (i, c) in input[from..].char_indices() {
        if is_secret_char(c) {
            end = from + i + c.len_utf8();
        } else {
            break;
        }
    }
    end
}

/// Scrub known secret-like token prefixes from provider error strings.
pub fn scrub_secret_patterns(input: &str) -> String {
    const PREFIXES: [&str; 4] = ["sk-", "sk-or-", "gsk_", "github_pat_"];

    let mut scrubbed = input.to_string();

    for prefix in PREFIXES {
        let mut search_from = 0;
        loop {
            let Some(rel) = scrubbed[search_from..].find(prefix) else {
                break;
            };

            let start = search_from + rel;
            let content_start = start + prefix.len();
            let end = token_end(&scrubbed, content_start);

            if end == content_start {
                search_from = content_start;
                continue;
            }

            scrubbed.replace_range(start..end, "[REDACTED]");
            search_from = start + "[REDACTED]".len();
        }
    }

    scrubbed
}

/// Sanitize API error text by scrubbing secrets and truncating length.
pub fn sanitize_api_error(input: &str) -> String {
    let scrubbed = scrub_secret_patterns(input);

    if scrubbed.chars().count() <= MAX_API_ERROR_CHARS {
        return scrubbed;
    }

    let mut end = MAX_API_ERROR_CHARS;
    while end > 0 && !scrubbed.is_char_boundary(end) {
        end -= 1;
    }

    format!("{}...", &scrubbed[..end])
}

/// Build a sanitized provider error from a failed HTTP response.
pub async fn api_error(provider: &str, response: reqwest::Response) -> anyhow::Error {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read provider error body>".to_string());
    let sanitized = sanitize_api_error(&body);
    anyhow::anyhow!("{provider} API error ({status}): {sanitized}")
}

/// Resolve API key for a provider from an explicit value or env vars.
fn resolve_provider_credential(name: &str, credential_override: Option<&str>) -> Option<String> {
    if let Some(raw_override) = credential_override {
        let trimmed_override = raw_override.trim();
        if !trimmed_override.is_empty() {
            return Some(trimmed_override.to_owned());
        }
    }

    let provider_env_candidates: Vec<&str> = match name {
        "openai" => vec!["OPENAI_API_KEY"],
        "openrouter" => vec!["OPENROUTER_API_KEY"],
        "groq" => vec!["GROQ_API_KEY"],
        _ => vec![],
    };

    for env_var in provider_env_candidates {
        if let Ok(value) = std::env::var(env_var) {
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }

    if let Ok(value) = std::env::var("REAGENT_API_KEY") {
        let value = value.trim();
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }

    None
}

/// Factory: create the right provider from its canonical name, with an
/// optional base-URL override for self-hosted gateways.
pub fn create_provider(
    name: &str,
    api_key: Option<&str>,
    api_url: Option<&str>,
    model: &str,
    temperature: f64,
) -> anyhow::Result<Box<dyn Provider>> {
    let resolved = resolve_provider_credential(name, api_key);
    let key = resolved.as_deref();

    let base_url = |default: &'static str| api_url.unwrap_or(default).to_string();

    match name {
        "openai" => Ok(Box::new(OpenAiCompatibleProvider::new(
            "OpenAI",
            &base_url(OPENAI_BASE_URL),
            key,
            model,
            temperature,
            AuthStyle::Bearer,
        ))),
        "openrouter" => Ok(Box::new(OpenAiCompatibleProvider::new(
            "OpenRouter",
            &base_url(OPENROUTER_BASE_URL),
            key,
            model,
            temperature,
            AuthStyle::Bearer,
        ))),
        "groq" => Ok(Box::new(OpenAiCompatibleProvider::new(
            "Groq",
            &base_url(GROQ_BASE_URL),
            key,
            model,
            temperature,
            AuthStyle::Bearer,
        ))),
        custom if custom.starts_with("custom:") => {
            let url = custom.trim_start_matches("custom:").trim();
            if url.is_empty() {
                anyhow::bail!("custom provider requires a URL: custom:<base_url>");
            }
            Ok(Box::new(OpenAiCompatibleProvider::new(
                "Custom",
                url,
                key,
                model,
                temperature,
                AuthStyle::Bearer,
            )))
        }
        _ => anyhow::bail!(
            "Unknown provider: {name}. Supported: openai, openrouter, groq, custom:<URL>."
        ),
    }
}

/// Information about a supported provider for display purposes.
pub struct ProviderInfo {
    pub name: &'static str,
    pub display_name: &'static str,
}

/// All known providers, for `reagent status` display.
pub fn list_providers() -> Vec<ProviderInfo> {
    vec![
        ProviderInfo {
            name: "openai",
            display_name: "OpenAI",
        },
        ProviderInfo {
            name: "openrouter",
            display_name: "OpenRouter",
        },
        ProviderInfo {
            name: "groq",
            display_name: "Groq",
        },
    ]
}
