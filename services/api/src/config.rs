//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    pub text_model: String,
    pub image_model: String,
    pub video_model: String,
    pub realtime_model: String,
    pub tutor_voice: String,
    pub video_poll_interval: Duration,
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

    /// Builds the configuration from any key lookup. `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        // --- Server and Storage ---
        // One host stands in for one browser tab, so it only listens locally by default.
        let bind_address_str = var_or("BIND_ADDRESS", "127.0.0.1:3000");
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = var_or("DATABASE_URL", "sqlite://lumina.db?mode=rwc");
        if database_url.trim().is_empty() {
            return Err(ConfigError::MissingVar("DATABASE_URL".to_string()));
        }

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Generative API ---
        let openai_api_key = lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty());
        let text_model = var_or("TEXT_MODEL", "gpt-4o-mini");
        let image_model = var_or("IMAGE_MODEL", "gpt-image-1");
        let video_model = var_or("VIDEO_MODEL", "sora-2");
        let realtime_model = var_or("REALTIME_MODEL", "gpt-realtime");
        let tutor_voice = var_or("TUTOR_VOICE", lumina_core::audio::DEFAULT_TUTOR_VOICE);

        let poll_str = var_or("VIDEO_POLL_SECS", "10");
        let poll_secs = poll_str
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "VIDEO_POLL_SECS".to_string(),
                    format!("'{}' is not a positive number of seconds", poll_str),
                )
            })?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            openai_api_key,
            text_model,
            image_model,
            video_model,
            realtime_model,
            tutor_voice,
            video_poll_interval: Duration::from_secs(poll_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_bind_locally() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_address, "127.0.0.1:3000".parse().unwrap());
        assert_eq!(config.database_url, "sqlite://lumina.db?mode=rwc");
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.openai_api_key, None);
        assert_eq!(config.tutor_voice, "alloy");
        assert_eq!(config.video_poll_interval, Duration::from_secs(10));
    }

    #[test]
    fn overrides_are_read() {
        let config = Config::from_lookup(lookup(&[
            ("BIND_ADDRESS", "127.0.0.1:8080"),
            ("RUST_LOG", "debug"),
            ("OPENAI_API_KEY", "sk-test"),
            ("TEXT_MODEL", "gpt-4o"),
            ("VIDEO_POLL_SECS", "3"),
        ]))
        .unwrap();
        assert_eq!(config.bind_address.port(), 8080);
        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.text_model, "gpt-4o");
        assert_eq!(config.video_poll_interval, Duration::from_secs(3));
    }

    #[test]
    fn bad_values_are_rejected() {
        let err = Config::from_lookup(lookup(&[("BIND_ADDRESS", "nowhere")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref var, _) if var == "BIND_ADDRESS"));

        let err = Config::from_lookup(lookup(&[("VIDEO_POLL_SECS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref var, _) if var == "VIDEO_POLL_SECS"));

        let err = Config::from_lookup(lookup(&[("RUST_LOG", "loud")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref var, _) if var == "RUST_LOG"));
    }
}
