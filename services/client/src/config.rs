//! services/client/src/config.rs
//!
//! Defines the client's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub api_base_url: String,
    pub push_url: String,
    pub log_level: Level,
    pub request_timeout: Duration,
    pub reconnect_delay: Duration,
    pub reconnect_max_delay: Duration,
    pub desktop_notifications: bool,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // --- Endpoints ---
        let api_base_url = lookup("API_BASE_URL")
            .unwrap_or_else(|| "http://localhost:5000".to_string())
            .trim_end_matches('/')
            .to_string();
        if !api_base_url.starts_with("http://") && !api_base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "API_BASE_URL".to_string(),
                format!("'{}' is not an http(s) URL", api_base_url),
            ));
        }

        let push_url = match lookup("PUSH_URL") {
            Some(url) if url.starts_with("ws://") || url.starts_with("wss://") => url,
            Some(url) => {
                return Err(ConfigError::InvalidValue(
                    "PUSH_URL".to_string(),
                    format!("'{}' is not a ws(s) URL", url),
                ))
            }
            None => default_push_url(&api_base_url),
        };

        // --- Logging ---
        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Timing ---
        let request_timeout = Duration::from_secs(parse_number(&lookup, "REQUEST_TIMEOUT_SECS", 10)?);
        let reconnect_delay = Duration::from_millis(parse_number(&lookup, "RECONNECT_DELAY_MS", 1000)?);
        let reconnect_max_delay =
            Duration::from_millis(parse_number(&lookup, "RECONNECT_MAX_DELAY_MS", 30_000)?);
        if reconnect_max_delay < reconnect_delay {
            return Err(ConfigError::InvalidValue(
                "RECONNECT_MAX_DELAY_MS".to_string(),
                "must not be smaller than RECONNECT_DELAY_MS".to_string(),
            ));
        }

        // --- Host alerts ---
        let desktop_notifications = match lookup("DESKTOP_NOTIFICATIONS") {
            None => true,
            Some(value) => value.parse::<bool>().map_err(|_| {
                ConfigError::InvalidValue(
                    "DESKTOP_NOTIFICATIONS".to_string(),
                    format!("'{}' is not true or false", value),
                )
            })?,
        };

        Ok(Self {
            api_base_url,
            push_url,
            log_level,
            request_timeout,
            reconnect_delay,
            reconnect_max_delay,
            desktop_notifications,
        })
    }
}

/// `http://host` becomes `ws://host/ws`, `https://host` becomes `wss://host/ws`.
fn default_push_url(api_base_url: &str) -> String {
    let rest = api_base_url
        .strip_prefix("https://")
        .map(|rest| format!("wss://{}", rest))
        .or_else(|| api_base_url.strip_prefix("http://").map(|rest| format!("ws://{}", rest)))
        .unwrap_or_else(|| api_base_url.to_string());
    format!("{}/ws", rest)
}

fn parse_number(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
    }
}
