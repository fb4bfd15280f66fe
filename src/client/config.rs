//! Client configuration.

use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the fetch client and its transport.
///
/// Every field has a default, so a config document only needs the fields it
/// changes:
///
/// ```
/// use fetch_bridge::client::ClientConfig;
///
/// let config = ClientConfig::from_json(r#"{ "max_retries": 5 }"#).unwrap();
/// assert_eq!(config.max_retries, 5);
/// assert_eq!(config.retry_delay_ms, 1000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds
    pub retry_delay_ms: u64,
    /// Factor applied to the delay after every retry
    pub backoff_multiplier: u32,
    /// Overall per-request timeout in milliseconds, 0 disables it
    pub request_timeout_ms: u64,
    /// Connection establishment timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// User-Agent header sent with every request
    pub user_agent: String,
    /// Proxy for all requests, empty for none
    pub proxy_url: String,
    /// Literal marker stripped from the front of URLs before dispatch
    pub url_prefix: String,
    /// Log retries and stream failures
    pub enable_logging: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 1000,
            backoff_multiplier: 2,
            // Bodies are long-lived streams; a whole-request timeout would cut them off.
            request_timeout_ms: 0,
            connect_timeout_ms: 30_000,
            user_agent: concat!("fetch_bridge/", env!("CARGO_PKG_VERSION")).to_string(),
            proxy_url: String::new(),
            url_prefix: "jsfetch:".to_string(),
            enable_logging: true,
        }
    }
}

impl ClientConfig {
    /// Parse and validate a JSON config document.
    pub fn from_json(document: &str) -> Result<Self> {
        let config: ClientConfig = serde_json::from_str(document)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the retry policy cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.backoff_multiplier == 0 {
            return Err(BridgeError::Config(
                "backoff_multiplier must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Delay before the first retry.
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Overall request timeout, if enabled.
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }

    /// Connection establishment timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_backoff(), Duration::from_millis(1000));
        assert_eq!(config.backoff_multiplier, 2);
        assert_eq!(config.url_prefix, "jsfetch:");
        assert!(config.request_timeout().is_none());
    }

    #[test]
    fn test_zero_multiplier_rejected() {
        let err = ClientConfig::from_json(r#"{ "backoff_multiplier": 0 }"#).unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }

    #[test]
    fn test_malformed_document_rejected() {
        assert!(ClientConfig::from_json("{ nope").is_err());
    }
}
