use std::path::PathBuf;

use anyhow::{Context, Result};

const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;

/// Application configuration loaded from environment variables.
/// Provider keys are optional: a provider without a key is still routable and
/// answers every call with an `Unauthorized` failure.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub gemini_api_key: Option<String>,
    pub openrouter_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub local_llm_url: String,
    pub local_llm_model: Option<String>,
    pub doc_service_url: String,
    /// Absent → sessions live in process memory.
    pub redis_url: Option<String>,
    pub prompt_template_dir: PathBuf,
    pub model_settings_path: PathBuf,
    pub max_upload_bytes: usize,
    pub session_ttl_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            port: parse_env("PORT", 3001)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            gemini_api_key: optional_env("GEMINI_API_KEY"),
            openrouter_api_key: optional_env("OPENROUTER_API_KEY"),
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            local_llm_url: optional_env("LOCAL_LLM_URL")
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            local_llm_model: optional_env("LOCAL_LLM_MODEL"),
            doc_service_url: optional_env("DOC_SERVICE_URL")
                .unwrap_or_else(|| "http://localhost:8080".to_string()),
            redis_url: optional_env("REDIS_URL"),
            prompt_template_dir: optional_env("PROMPT_TEMPLATE_DIR")
                .unwrap_or_else(|| "prompts".to_string())
                .into(),
            model_settings_path: optional_env("MODEL_SETTINGS_PATH")
                .unwrap_or_else(|| "data/model-settings.json".to_string())
                .into(),
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            session_ttl_secs: parse_env("SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?,
        })
    }
}

/// Unset and blank values are both treated as missing.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_default_and_invalid() {
        std::env::remove_var("TAILOR_TEST_UNSET_PORT");
        assert_eq!(parse_env("TAILOR_TEST_UNSET_PORT", 3001u16).unwrap(), 3001);

        std::env::set_var("TAILOR_TEST_BAD_PORT", "not-a-port");
        assert!(parse_env::<u16>("TAILOR_TEST_BAD_PORT", 3001).is_err());
    }

    #[test]
    fn test_blank_optional_env_is_none() {
        std::env::set_var("TAILOR_TEST_BLANK_KEY", "   ");
        assert_eq!(optional_env("TAILOR_TEST_BLANK_KEY"), None);
    }
}
