use std::str::FromStr;

use anyhow::{Context, Result};

const DEFAULT_MODELS: &str = "claude-sonnet-4-5,claude-haiku-4-5";

/// Same bound as the orchestrator's settle delay cap.
const MAX_SETTLE_MS: u64 = 5_000;

/// Application configuration loaded from environment variables.
/// Fails at startup on malformed values; everything has a default except the API key.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// AI tier is disabled when unset.
    pub anthropic_api_key: Option<String>,
    pub ai_models: Vec<String>,
    pub ai_timeout_ms: u64,
    pub ai_batch_timeout_ms: u64,
    /// Redis memory backend when set.
    pub redis_url: Option<String>,
    /// Directory for the JSON-file memory backend; used when no Redis URL is given.
    pub memory_file: Option<String>,
    pub memory_max_bytes: usize,
    pub memory_confidence_threshold: f64,
    pub profile_match_min_chars: usize,
    pub fill_settle_ms: u64,
    pub fill_max_depth: usize,
    pub learning_enabled: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let ai_models: Vec<String> = optional_env("AI_MODELS")
            .unwrap_or_else(|| DEFAULT_MODELS.to_string())
            .split(',')
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        if ai_models.is_empty() {
            anyhow::bail!("AI_MODELS must list at least one model id");
        }

        let memory_confidence_threshold: f64 = parse_env("MEMORY_CONFIDENCE_THRESHOLD", 0.75)?;
        if !(0.0..=1.0).contains(&memory_confidence_threshold) {
            anyhow::bail!("MEMORY_CONFIDENCE_THRESHOLD must be between 0 and 1");
        }

        Ok(Config {
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            ai_models,
            ai_timeout_ms: parse_env("AI_TIMEOUT_MS", 15_000)?,
            ai_batch_timeout_ms: parse_env("AI_BATCH_TIMEOUT_MS", 30_000)?,
            redis_url: optional_env("REDIS_URL"),
            memory_file: optional_env("MEMORY_FILE"),
            memory_max_bytes: parse_env("MEMORY_MAX_BYTES", 5 * 1024 * 1024)?,
            memory_confidence_threshold,
            profile_match_min_chars: parse_env("PROFILE_MATCH_MIN_CHARS", 3)?,
            fill_settle_ms: parse_env::<u64>("FILL_SETTLE_MS", 300)?.min(MAX_SETTLE_MS),
            fill_max_depth: parse_env::<usize>("FILL_MAX_DEPTH", 10)?.min(10),
            learning_enabled: parse_env("LEARNING_ENABLED", true)?,
        })
    }
}

/// Set and non-blank, else `None`.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_uses_default_when_unset() {
        let port: u16 = parse_env("FORMFILL_TEST_UNSET_PORT", 8080).unwrap();
        assert_eq!(port, 8080);
    }

    #[test]
    fn test_parse_env_rejects_garbage() {
        std::env::set_var("FORMFILL_TEST_BAD_DEPTH", "ten");
        let err = parse_env::<usize>("FORMFILL_TEST_BAD_DEPTH", 10).unwrap_err();
        assert!(err.to_string().contains("FORMFILL_TEST_BAD_DEPTH"));
        std::env::remove_var("FORMFILL_TEST_BAD_DEPTH");
    }

    #[test]
    fn test_optional_env_treats_blank_as_unset() {
        std::env::set_var("FORMFILL_TEST_BLANK", "   ");
        assert_eq!(optional_env("FORMFILL_TEST_BLANK"), None);
        std::env::remove_var("FORMFILL_TEST_BLANK");
    }
}
