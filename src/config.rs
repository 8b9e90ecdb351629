//! # Bot Configuration Module
//!
//! Configuration read from the environment (after `.env` is loaded), plus the
//! retry and circuit breaker settings of the recommendation client.

use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;

pub const DEFAULT_LOCALES_DIR: &str = "./locales";
pub const DEFAULT_AI_COOLDOWN_SECS: u64 = 30;
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;

/// Recovery configuration for calls to the recommendation API
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Base delay between retries in milliseconds
    pub base_retry_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_retry_delay_ms: u64,
    /// Timeout for one HTTP request in seconds
    pub operation_timeout_secs: u64,
    /// Circuit breaker failure threshold
    pub circuit_breaker_threshold: u32,
    /// Circuit breaker reset timeout in seconds
    pub circuit_breaker_reset_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_retry_delay_ms: 1000,  // 1 second
            max_retry_delay_ms: 10000,  // 10 seconds
            operation_timeout_secs: 60, // generation can be slow
            circuit_breaker_threshold: 5,
            circuit_breaker_reset_secs: 60, // 1 minute
        }
    }
}

/// Settings of the generative recommendation API
#[derive(Debug, Clone)]
pub struct AiConfig {
    /// Full `generateContent` endpoint URL
    pub api_url: String,
    pub api_key: String,
    /// Minimum time between two requests of the same user
    pub cooldown_secs: u64,
    pub recovery: RecoveryConfig,
}

/// Top-level bot configuration
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub telegram_bot_token: String,
    pub database_url: String,
    pub database_max_connections: u32,
    pub locales_dir: String,
    /// `None` disables AI recommendations
    pub ai: Option<AiConfig>,
}

impl BotConfig {
    /// Read the configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |name: &str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .with_context(|| format!("{name} must be set"))
        };

        let ai = match (lookup("AI_API_URL"), lookup("AI_API_KEY")) {
            (Some(api_url), Some(api_key)) if !api_url.is_empty() && !api_key.is_empty() => Some(AiConfig {
                api_url,
                api_key,
                cooldown_secs: parse_or(&lookup, "AI_COOLDOWN_SECS", DEFAULT_AI_COOLDOWN_SECS)?,
                recovery: RecoveryConfig::default(),
            }),
            _ => None,
        };

        Ok(Self {
            telegram_bot_token: required("TELEGRAM_BOT_TOKEN")?,
            database_url: required("DATABASE_URL")?,
            database_max_connections: parse_or(
                &lookup,
                "DATABASE_MAX_CONNECTIONS",
                DEFAULT_DATABASE_MAX_CONNECTIONS,
            )?,
            locales_dir: lookup("LOCALES_DIR").unwrap_or_else(|| DEFAULT_LOCALES_DIR.to_string()),
            ai,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {name}: {raw}")),
        None => Ok(default),
    }
}
