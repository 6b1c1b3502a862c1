use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_SITE_URL: &str = "http://localhost:3000";

/// Substrings that mark an API key as an unfilled template value.
const PLACEHOLDER_MARKERS: &[&str] = &["your_", "example"];

/// Application configuration loaded from environment variables.
/// Only malformed values fail startup; a missing API key just disables chat.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm_api_key: Option<String>,
    pub llm_model: String,
    pub llm_base_url: String,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,
    /// Connect plus time-to-first-byte for the upstream call.
    pub llm_timeout: Duration,
    /// Longest silence tolerated between upstream stream reads.
    pub stream_idle_timeout: Duration,
    pub history_turns: usize,
    pub context_budget: usize,
    pub site_url: String,
    pub profile_path: Option<PathBuf>,
    pub app_env: String,
    pub debug: bool,
    pub port: u16,
    pub rust_log: String,
}

/// Outcome of checking the deployment configuration.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnvValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub chat_enabled: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Config {
            llm_api_key: get("LLM_API_KEY"),
            llm_model: get("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            llm_base_url: get("LLM_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            llm_temperature: parse_or(get("LLM_TEMPERATURE"), "LLM_TEMPERATURE", 0.7)?,
            llm_max_tokens: parse_or(get("LLM_MAX_TOKENS"), "LLM_MAX_TOKENS", 500)?,
            llm_timeout: Duration::from_secs(parse_or(
                get("LLM_TIMEOUT_SECS"),
                "LLM_TIMEOUT_SECS",
                60,
            )?),
            stream_idle_timeout: Duration::from_secs(parse_or(
                get("STREAM_IDLE_TIMEOUT_SECS"),
                "STREAM_IDLE_TIMEOUT_SECS",
                30,
            )?),
            history_turns: parse_or(get("CHAT_HISTORY_TURNS"), "CHAT_HISTORY_TURNS", 10)?,
            context_budget: parse_or(get("CHAT_CONTEXT_BUDGET"), "CHAT_CONTEXT_BUDGET", 24_000)?,
            site_url: get("PUBLIC_SITE_URL").unwrap_or_else(|| DEFAULT_SITE_URL.to_string()),
            profile_path: get("PROFILE_PATH").map(PathBuf::from),
            app_env: get("APP_ENV").unwrap_or_else(|| "development".to_string()),
            debug: get("DEBUG").map(|v| v == "true" || v == "1").unwrap_or(false),
            port: parse_or(get("PORT"), "PORT", 8080)?,
            rust_log: get("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Chat needs a real-looking API key; everything else has defaults.
    pub fn chat_enabled(&self) -> bool {
        self.llm_api_key
            .as_deref()
            .map(|key| !is_placeholder(key))
            .unwrap_or(false)
    }

    pub fn validate(&self) -> EnvValidation {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        match self.llm_api_key.as_deref() {
            None => warnings
                .push("LLM_API_KEY not set - chat functionality will be disabled".to_string()),
            Some(key) if is_placeholder(key) => {
                warnings.push("API key appears to be a placeholder value".to_string())
            }
            Some(_) => {}
        }

        if !self.site_url.starts_with("http") {
            errors.push("PUBLIC_SITE_URL must start with http:// or https://".to_string());
        }

        if !self.llm_base_url.starts_with("http") {
            errors.push("LLM_BASE_URL must start with http:// or https://".to_string());
        }

        if self.history_turns == 0 {
            warnings.push(
                "CHAT_HISTORY_TURNS is 0 - prior turns will not reach the model".to_string(),
            );
        }

        EnvValidation {
            is_valid: errors.is_empty(),
            errors,
            warnings,
            chat_enabled: self.chat_enabled(),
        }
    }
}

fn is_placeholder(key: &str) -> bool {
    PLACEHOLDER_MARKERS.iter().any(|marker| key.contains(marker))
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{value}'")),
        None => Ok(default),
    }
}
