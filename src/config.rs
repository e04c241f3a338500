// Explicit configuration, built once at startup and passed to each component.
// Every flag falls back to an environment variable (and .env via dotenvy in main).

use std::time::Duration;

use clap::Args;
use thiserror::Error;

use crate::constants::{
    DEFAULT_ENDPOINT, DEFAULT_MODEL, DEFAULT_TELEGRAM_API, MAX_OUTPUT_TOKENS, TEMPERATURE,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must not be blank")]
    Blank(&'static str),
}

/// Settings shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// OpenRouter API key. Requests are sent unauthenticated when unset.
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Model identifier sent to the generation endpoint.
    #[arg(long, env = "OPENROUTER_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Text-generation endpoint (OpenRouter Responses API compatible).
    #[arg(long, env = "OPENROUTER_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Telegram bot username.
    #[arg(long, env = "TELEGRAM_BOT_USERNAME", default_value = "")]
    pub bot_username: String,

    /// Telegram bot token. The bot is not started when empty.
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", default_value = "", hide_env_values = true)]
    pub bot_token: String,

    /// Base URL of the Telegram Bot API.
    #[arg(long, env = "TELEGRAM_API_URL", default_value = DEFAULT_TELEGRAM_API)]
    pub telegram_api: String,

    /// Upper bound for handling one chat message, retries included.
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 300)]
    pub request_timeout_secs: u64,
}

/// True when a setting holds something other than whitespace.
pub fn is_configured(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Retry schedule for the generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    /// Attempt `n` is followed by a pause of `n * backoff_step`.
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }
}

/// Everything the generation client needs; no process-wide state.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub temperature: f64,
    pub max_output_tokens: u32,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            temperature: TEMPERATURE,
            max_output_tokens: MAX_OUTPUT_TOKENS,
            connect_timeout: Duration::from_secs(15),
            request_timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }
}

impl GenerationConfig {
    /// The API key, if one is set to something non-blank.
    pub fn bearer_token(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|key| is_configured(key))
    }
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub username: String,
    pub token: String,
    pub api_base: String,
    /// Long-poll duration passed to getUpdates.
    pub poll_timeout: Duration,
    pub request_timeout: Duration,
}

impl TelegramConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_configured(&self.token) {
            return Err(ConfigError::Blank("TELEGRAM_BOT_TOKEN"));
        }
        Ok(())
    }
}

impl ConfigArgs {
    pub fn generation(&self) -> Result<GenerationConfig, ConfigError> {
        if !is_configured(&self.model) {
            return Err(ConfigError::Blank("OPENROUTER_MODEL"));
        }
        if !is_configured(&self.endpoint) {
            return Err(ConfigError::Blank("OPENROUTER_ENDPOINT"));
        }
        Ok(GenerationConfig {
            api_key: self.api_key.clone(),
            model: self.model.trim().to_string(),
            endpoint: self.endpoint.trim().to_string(),
            ..GenerationConfig::default()
        })
    }

    pub fn telegram(&self) -> TelegramConfig {
        TelegramConfig {
            username: self.bot_username.clone(),
            token: self.bot_token.trim().to_string(),
            api_base: self.telegram_api.trim_end_matches('/').to_string(),
            poll_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}
