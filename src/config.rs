//! Declarative client configuration.
//!
//! [`ClientConfig`] mirrors the [`ClientBuilder`](crate::ClientBuilder) parameters in
//! a serializable form so they can come from JSON or from environment variables.
//! Values are only checked when the builder is built.
//!
//! # Environment variables
//!
//! | Variable | Meaning |
//! |---|---|
//! | `RAMPART_BASE_URL` | base URL (required at build time) |
//! | `RAMPART_TIMEOUT_MS` | per-attempt timeout, `0` disables |
//! | `RAMPART_MAX_RETRIES` | retries after the first attempt |
//! | `RAMPART_RETRY_WAIT_MIN_MS` / `RAMPART_RETRY_WAIT_MAX_MS` | backoff bounds |
//! | `RAMPART_BREAKER_ENABLED` | `true` to enable the circuit breaker |
//! | `RAMPART_BREAKER_NAME` | breaker name |
//! | `RAMPART_BREAKER_MAX_REQUESTS` | half-open probe limit |
//! | `RAMPART_BREAKER_INTERVAL_MS` | closed-state rolling window, `0` disables |
//! | `RAMPART_BREAKER_TIMEOUT_MS` | open-state cooldown |
//! | `RAMPART_BREAKER_CONSECUTIVE_FAILURES` | failures that trip the breaker |

use crate::circuit_breaker::{CircuitBreakerConfig, DEFAULT_CONSECUTIVE_FAILURES};
use crate::{Error, Result};
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

/// Prefix of every environment variable read by [`ClientConfig::from_env`].
pub const ENV_PREFIX: &str = "RAMPART_";

/// Serializable client settings.
///
/// # Examples
///
/// ```
/// use rampart::config::ClientConfig;
///
/// let config = ClientConfig::from_json(r#"{
///     "base_url": "https://api.example.com",
///     "max_retries": 5,
///     "circuit_breaker": { "timeout_ms": 30000 }
/// }"#).unwrap();
///
/// assert_eq!(config.max_retries, 5);
/// assert_eq!(config.retry_wait_min_ms, 100);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    /// Per-attempt timeout in milliseconds; `0` disables it.
    pub timeout_ms: u64,
    pub max_retries: usize,
    pub retry_wait_min_ms: u64,
    pub retry_wait_max_ms: u64,
    /// Circuit breaker settings; `None` disables the breaker.
    pub circuit_breaker: Option<BreakerSettings>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_ms: 0,
            max_retries: 3,
            retry_wait_min_ms: 100,
            retry_wait_max_ms: 10_000,
            circuit_breaker: None,
        }
    }
}

/// Serializable circuit breaker settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    pub name: String,
    pub max_requests: u32,
    pub interval_ms: u64,
    pub timeout_ms: u64,
    /// Consecutive failures that trip a closed breaker.
    pub consecutive_failures: u32,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            max_requests: 1,
            interval_ms: 0,
            timeout_ms: 60_000,
            consecutive_failures: DEFAULT_CONSECUTIVE_FAILURES,
        }
    }
}

impl BreakerSettings {
    /// Converts the settings into a breaker configuration.
    pub fn to_config(&self) -> CircuitBreakerConfig {
        let threshold = self.consecutive_failures.max(1);
        CircuitBreakerConfig::new()
            .with_name(self.name.clone())
            .with_max_requests(self.max_requests)
            .with_interval(Duration::from_millis(self.interval_ms))
            .with_timeout(Duration::from_millis(self.timeout_ms))
            .with_ready_to_trip(move |counts| counts.consecutive_failures >= threshold)
    }
}

impl ClientConfig {
    /// Parses settings from a JSON document; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the document is malformed.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::ConfigurationError(format!("Invalid client config: {}", e)))
    }

    /// Reads settings from `RAMPART_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`, which receives full variable names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| lookup(&format!("{}{}", ENV_PREFIX, suffix));
        let mut config = Self::default();

        if let Some(base_url) = var("BASE_URL") {
            config.base_url = base_url;
        }
        parse_into(&var, "TIMEOUT_MS", &mut config.timeout_ms)?;
        parse_into(&var, "MAX_RETRIES", &mut config.max_retries)?;
        parse_into(&var, "RETRY_WAIT_MIN_MS", &mut config.retry_wait_min_ms)?;
        parse_into(&var, "RETRY_WAIT_MAX_MS", &mut config.retry_wait_max_ms)?;

        let mut enabled = false;
        parse_into(&var, "BREAKER_ENABLED", &mut enabled)?;
        if enabled {
            let mut breaker = BreakerSettings::default();
            if let Some(name) = var("BREAKER_NAME") {
                breaker.name = name;
            }
            parse_into(&var, "BREAKER_MAX_REQUESTS", &mut breaker.max_requests)?;
            parse_into(&var, "BREAKER_INTERVAL_MS", &mut breaker.interval_ms)?;
            parse_into(&var, "BREAKER_TIMEOUT_MS", &mut breaker.timeout_ms)?;
            parse_into(
                &var,
                "BREAKER_CONSECUTIVE_FAILURES",
                &mut breaker.consecutive_failures,
            )?;
            config.circuit_breaker = Some(breaker);
        }

        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_wait_min(&self) -> Duration {
        Duration::from_millis(self.retry_wait_min_ms)
    }

    pub fn retry_wait_max(&self) -> Duration {
        Duration::from_millis(self.retry_wait_max_ms)
    }
}

fn parse_into<T>(var: &impl Fn(&str) -> Option<String>, suffix: &str, slot: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = var(suffix) {
        *slot = raw.trim().parse().map_err(|e| {
            Error::ConfigurationError(format!("Invalid {}{}={:?}: {}", ENV_PREFIX, suffix, raw, e))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::{CircuitBreaker, State};
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_empty_environment_gives_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_environment_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("RAMPART_BASE_URL", "https://api.example.com"),
            ("RAMPART_TIMEOUT_MS", "2500"),
            ("RAMPART_MAX_RETRIES", " 5 "),
            ("RAMPART_BREAKER_ENABLED", "true"),
            ("RAMPART_BREAKER_NAME", "ledger"),
            ("RAMPART_BREAKER_CONSECUTIVE_FAILURES", "2"),
        ]))
        .unwrap();

        assert_eq!(config.base_url, "https://api.example.com");
        assert_eq!(config.timeout(), Duration::from_millis(2500));
        assert_eq!(config.max_retries, 5);
        let breaker = config.circuit_breaker.unwrap();
        assert_eq!(breaker.name, "ledger");
        assert_eq!(breaker.consecutive_failures, 2);
        assert_eq!(breaker.timeout_ms, 60_000);
    }

    #[test]
    fn test_breaker_disabled_unless_enabled() {
        let config =
            ClientConfig::from_lookup(lookup(&[("RAMPART_BREAKER_NAME", "ignored")])).unwrap();
        assert!(config.circuit_breaker.is_none());
    }

    #[test]
    fn test_unparseable_variable_is_a_configuration_error() {
        let err =
            ClientConfig::from_lookup(lookup(&[("RAMPART_MAX_RETRIES", "many")])).unwrap_err();
        match err {
            Error::ConfigurationError(message) => assert!(message.contains("RAMPART_MAX_RETRIES")),
            other => panic!("Expected ConfigurationError, got {:?}", other),
        }
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(
            ClientConfig::from_json("{"),
            Err(Error::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_breaker_settings_trip_threshold() {
        let settings = BreakerSettings {
            consecutive_failures: 2,
            ..BreakerSettings::default()
        };
        let breaker = CircuitBreaker::new(settings.to_config());
        breaker.try_acquire().unwrap().failure();
        assert_eq!(breaker.state(), State::Closed);
        breaker.try_acquire().unwrap().failure();
        assert_eq!(breaker.state(), State::Open);
    }
}
