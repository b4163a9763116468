//! Application configuration management

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

/// Endpoint of a Stash instance running on the same machine.
pub const DEFAULT_GRAPHQL_URL: &str = "http://localhost:9999/graphql";

/// Where job progress and messages are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    /// Stash plugin log protocol on stderr
    Plugin,
    /// Plain tracing events
    Tracing,
}

impl LogMode {
    pub fn from_arg(value: &str) -> Option<Self> {
        match value {
            "plugin" => Some(LogMode::Plugin),
            "tracing" => Some(LogMode::Tracing),
            _ => None,
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// GraphQL endpoint of the Stash server
    pub graphql_url: String,

    /// Pause after each successful tag update
    pub update_delay: Duration,

    /// Timeout applied to every HTTP request
    pub http_timeout: Duration,

    /// Log sink used for job output
    pub log_mode: LogMode,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let update_delay_ms: u64 = lookup("UPDATE_DELAY_MS")
            .unwrap_or_else(|| "500".to_string())
            .parse()
            .context("Invalid UPDATE_DELAY_MS")?;

        let http_timeout_secs: u64 = lookup("HTTP_TIMEOUT_SECS")
            .unwrap_or_else(|| "30".to_string())
            .parse()
            .context("Invalid HTTP_TIMEOUT_SECS")?;

        let log_mode = match lookup("LOG_MODE") {
            Some(value) => LogMode::from_arg(&value)
                .with_context(|| format!("Invalid LOG_MODE '{}'", value))?,
            None => LogMode::Plugin,
        };

        Ok(Self {
            graphql_url: lookup("STASH_GRAPHQL_URL")
                .unwrap_or_else(|| DEFAULT_GRAPHQL_URL.to_string()),

            update_delay: Duration::from_millis(update_delay_ms),

            http_timeout: Duration::from_secs(http_timeout_secs),

            log_mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.graphql_url, DEFAULT_GRAPHQL_URL);
        assert_eq!(config.update_delay, Duration::from_millis(500));
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.log_mode, LogMode::Plugin);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("STASH_GRAPHQL_URL", "http://stash.lan:9999/graphql"),
            ("UPDATE_DELAY_MS", "0"),
            ("HTTP_TIMEOUT_SECS", "5"),
            ("LOG_MODE", "tracing"),
        ])
        .unwrap();
        assert_eq!(config.graphql_url, "http://stash.lan:9999/graphql");
        assert_eq!(config.update_delay, Duration::ZERO);
        assert_eq!(config.http_timeout, Duration::from_secs(5));
        assert_eq!(config.log_mode, LogMode::Tracing);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(config_from(&[("UPDATE_DELAY_MS", "half a second")]).is_err());
        assert!(config_from(&[("HTTP_TIMEOUT_SECS", "-1")]).is_err());
        assert!(config_from(&[("LOG_MODE", "json")]).is_err());
    }
}
