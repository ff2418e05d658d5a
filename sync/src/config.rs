//! Configuration for the sync agent.

use crate::facade::WritePolicy;
use dompet_engine::RetryPolicy;
use std::env;
use std::time::Duration;

/// Agent configuration loaded from `DOMPET_*` environment variables.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Base URL of the remote document store
    pub remote_url: String,
    /// SQLite URL of the pending store
    pub database_url: String,
    /// User signed in at startup
    pub user_id: Option<String>,
    /// Bearer token; the user id is sent when unset
    pub auth_token: Option<String>,
    pub request_timeout: Duration,
    pub write_policy: WritePolicy,
    /// Zero disables background sync
    pub background_interval: Duration,
    /// Zero disables connectivity probing
    pub probe_interval: Duration,
    pub retry: RetryPolicy,
}

impl AgentConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let remote_url = lookup("DOMPET_REMOTE_URL").ok_or(ConfigError::MissingRemoteUrl)?;

        let database_url = lookup("DOMPET_DATABASE_URL")
            .unwrap_or_else(|| "sqlite://dompet-pending.db".to_string());

        let user_id = lookup("DOMPET_USER_ID").filter(|id| !id.is_empty());
        let auth_token = lookup("DOMPET_AUTH_TOKEN").filter(|token| !token.is_empty());

        let request_timeout = Duration::from_secs(number(&lookup, "DOMPET_REQUEST_TIMEOUT_SECS", 10)?);

        let write_policy = match lookup("DOMPET_WRITE_POLICY") {
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::Invalid("DOMPET_WRITE_POLICY", raw))?,
            None => WritePolicy::default(),
        };

        let background_interval =
            Duration::from_secs(number(&lookup, "DOMPET_BACKGROUND_INTERVAL_SECS", 300)?);
        let probe_interval = Duration::from_secs(number(&lookup, "DOMPET_PROBE_INTERVAL_SECS", 15)?);

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy::new(
            number(&lookup, "DOMPET_RETRY_BASE_MS", defaults.base_delay_ms)?,
            number(&lookup, "DOMPET_RETRY_MAX_MS", defaults.max_delay_ms)?,
        );

        Ok(Self {
            remote_url,
            database_url,
            user_id,
            auth_token,
            request_timeout,
            write_policy,
            background_interval,
            probe_interval,
            retry,
        })
    }
}

fn number(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(key, raw)),
        None => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("DOMPET_REMOTE_URL environment variable is required")]
    MissingRemoteUrl,

    #[error("Invalid {0} value: {1}")]
    Invalid(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AgentConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AgentConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[("DOMPET_REMOTE_URL", "http://localhost:3000")]).unwrap();
        assert_eq!(config.database_url, "sqlite://dompet-pending.db");
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.write_policy, WritePolicy::Direct);
        assert_eq!(config.background_interval, Duration::from_secs(300));
        assert_eq!(config.retry, RetryPolicy::default());
        assert!(config.user_id.is_none());
    }

    #[test]
    fn remote_url_is_required() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingRemoteUrl)));
    }

    #[test]
    fn overrides() {
        let config = load(&[
            ("DOMPET_REMOTE_URL", "http://localhost:3000"),
            ("DOMPET_USER_ID", "user-1"),
            ("DOMPET_WRITE_POLICY", "queued"),
            ("DOMPET_BACKGROUND_INTERVAL_SECS", "0"),
            ("DOMPET_RETRY_BASE_MS", "500"),
        ])
        .unwrap();
        assert_eq!(config.user_id.as_deref(), Some("user-1"));
        assert_eq!(config.write_policy, WritePolicy::Queued);
        assert!(config.background_interval.is_zero());
        assert_eq!(config.retry.base_delay_ms, 500);
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let err = load(&[
            ("DOMPET_REMOTE_URL", "http://localhost:3000"),
            ("DOMPET_REQUEST_TIMEOUT_SECS", "soon"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("DOMPET_REQUEST_TIMEOUT_SECS", _)));
    }
}
