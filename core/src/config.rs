//! Client configuration and its defaulting rules.
//!
//! # Design
//! A zero value in `timeout`, `max_retries` or `retry_delay` means "unset"
//! and is replaced by the default when the config is resolved. A negative
//! `max_retries` disables retrying: the request is attempted exactly once.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::http::Headers;
use crate::retry::RetryPolicy;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Environment variable prefix used by `ClientConfig::from_env`.
pub const ENV_PREFIX: &str = "HTTPX_";

/// User-facing client configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub headers: Headers,
    pub timeout: Duration,
    pub max_retries: i32,
    pub retry_delay: Duration,
}

/// Configuration after defaults have been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub base_url: String,
    pub headers: Headers,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_retries(mut self, max_retries: i32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Attempt every request exactly once.
    pub fn no_retries(self) -> Self {
        self.max_retries(-1)
    }

    pub fn resolve(&self) -> ResolvedConfig {
        let timeout = if self.timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            self.timeout
        };
        let max_retries = match self.max_retries {
            0 => DEFAULT_MAX_RETRIES,
            n if n < 0 => 0,
            n => n as u32,
        };
        let delay = if self.retry_delay.is_zero() {
            DEFAULT_RETRY_DELAY
        } else {
            self.retry_delay
        };
        ResolvedConfig {
            base_url: self.base_url.clone(),
            headers: self.headers.clone(),
            timeout,
            retry: RetryPolicy::new(max_retries, delay),
        }
    }

    /// Load from `HTTPX_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with_prefix(ENV_PREFIX)
    }

    /// Load from `{prefix}BASE_URL`, `{prefix}TIMEOUT_MS`, `{prefix}MAX_RETRIES`,
    /// `{prefix}RETRY_DELAY_MS` and `{prefix}HEADERS` (`Name:Value;Name:Value`).
    pub fn from_env_with_prefix(prefix: &str) -> Result<Self, ConfigError> {
        Self::from_lookup(prefix, |key| std::env::var(key).ok())
    }

    fn from_lookup(
        prefix: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let var = |name: &str| format!("{prefix}{name}");

        let base_url_var = var("BASE_URL");
        let base_url = lookup(&base_url_var).ok_or(ConfigError::Missing(base_url_var))?;
        let mut config = ClientConfig::new(base_url);

        if let Some(ms) = parse_var::<u64>(&lookup, &var("TIMEOUT_MS"))? {
            config.timeout = Duration::from_millis(ms);
        }
        if let Some(n) = parse_var::<i32>(&lookup, &var("MAX_RETRIES"))? {
            config.max_retries = n;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, &var("RETRY_DELAY_MS"))? {
            config.retry_delay = Duration::from_millis(ms);
        }

        let headers_var = var("HEADERS");
        if let Some(raw) = lookup(&headers_var) {
            for pair in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
                let (name, value) = pair.split_once(':').ok_or_else(|| ConfigError::Invalid {
                    var: headers_var.clone(),
                    value: pair.to_string(),
                })?;
                config.headers.set(name.trim(), value.trim());
            }
        }

        Ok(config)
    }

    /// Parse a JSON document such as
    /// `{"base_url": "...", "headers": {"A": "1"}, "timeout_ms": 5000, "max_retries": 2, "retry_delay_ms": 50}`.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = serde_json::from_str(raw).map_err(|e| ConfigError::Json(e.to_string()))?;
        Ok(file.into())
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid {
                var: var.to_string(),
                value,
            }),
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    base_url: String,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default)]
    timeout_ms: u64,
    #[serde(default)]
    max_retries: i32,
    #[serde(default)]
    retry_delay_ms: u64,
}

impl From<ConfigFile> for ClientConfig {
    fn from(file: ConfigFile) -> Self {
        ClientConfig {
            base_url: file.base_url,
            headers: file.headers.into_iter().collect(),
            timeout: Duration::from_millis(file.timeout_ms),
            max_retries: file.max_retries,
            retry_delay: Duration::from_millis(file.retry_delay_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn zero_values_resolve_to_defaults() {
        let resolved = ClientConfig::new("http://example.com").resolve();
        assert_eq!(resolved.timeout, Duration::from_secs(30));
        assert_eq!(resolved.retry.max_retries, 3);
        assert_eq!(resolved.retry.delay, Duration::from_millis(100));
    }

    #[test]
    fn explicit_values_are_kept() {
        let resolved = ClientConfig::new("http://example.com")
            .timeout(Duration::from_secs(10))
            .max_retries(5)
            .retry_delay(Duration::from_millis(200))
            .resolve();
        assert_eq!(resolved.timeout, Duration::from_secs(10));
        assert_eq!(resolved.retry.max_retries, 5);
        assert_eq!(resolved.retry.delay, Duration::from_millis(200));
    }

    #[test]
    fn negative_retries_mean_single_attempt() {
        let resolved = ClientConfig::new("http://example.com").max_retries(-1).resolve();
        assert_eq!(resolved.retry.max_retries, 0);
        assert_eq!(resolved.retry.max_attempts(), 1);

        let resolved = ClientConfig::new("http://example.com").no_retries().resolve();
        assert_eq!(resolved.retry.max_attempts(), 1);
    }

    #[test]
    fn default_headers_survive_resolution() {
        let resolved = ClientConfig::new("http://example.com")
            .header("Authorization", "Bearer token")
            .header("User-Agent", "TestClient")
            .resolve();
        assert_eq!(resolved.headers.get("authorization"), Some("Bearer token"));
        assert_eq!(resolved.headers.get("user-agent"), Some("TestClient"));
        assert_eq!(resolved.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn base_url_is_not_normalized() {
        let resolved = ClientConfig::new("http://example.com/").resolve();
        assert_eq!(resolved.base_url, "http://example.com/");
    }

    #[test]
    fn env_loader_reads_all_fields() {
        let config = ClientConfig::from_lookup(
            "T_",
            lookup(&[
                ("T_BASE_URL", "http://localhost:3000"),
                ("T_TIMEOUT_MS", "5000"),
                ("T_MAX_RETRIES", "-1"),
                ("T_RETRY_DELAY_MS", "25"),
                ("T_HEADERS", "Authorization: Bearer x; X-Trace:abc"),
            ]),
        )
        .unwrap();
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.timeout, Duration::from_millis(5000));
        assert_eq!(config.max_retries, -1);
        assert_eq!(config.retry_delay, Duration::from_millis(25));
        assert_eq!(config.headers.get("authorization"), Some("Bearer x"));
        assert_eq!(config.headers.get("x-trace"), Some("abc"));
    }

    #[test]
    fn env_loader_requires_base_url() {
        let err = ClientConfig::from_lookup("T_", lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ref v) if v == "T_BASE_URL"));
    }

    #[test]
    fn env_loader_rejects_bad_numbers() {
        let err = ClientConfig::from_lookup(
            "T_",
            lookup(&[("T_BASE_URL", "http://x"), ("T_TIMEOUT_MS", "soon")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref var, .. } if var == "T_TIMEOUT_MS"));
    }

    #[test]
    fn env_loader_rejects_header_without_colon() {
        let err = ClientConfig::from_lookup(
            "T_",
            lookup(&[("T_BASE_URL", "http://x"), ("T_HEADERS", "NoColon")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn json_loader_leaves_missing_fields_zero() {
        let config = ClientConfig::from_json(
            r#"{"base_url":"http://example.com","headers":{"A":"1"},"max_retries":2}"#,
        )
        .unwrap();
        assert_eq!(config.max_retries, 2);
        assert!(config.timeout.is_zero());
        assert_eq!(config.headers.get("A"), Some("1"));

        let resolved = config.resolve();
        assert_eq!(resolved.timeout, DEFAULT_TIMEOUT);
        assert_eq!(resolved.retry.max_retries, 2);
    }

    #[test]
    fn json_loader_requires_base_url() {
        let err = ClientConfig::from_json(r#"{"timeout_ms":10}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }
}
