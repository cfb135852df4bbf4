//! HTTP client settings.
//!
//! Read from the `[http]` table of the gateway configuration file:
//!
//! ```toml
//! [http]
//! timeout_secs = 15
//! connect_timeout_secs = 5
//! pool_max_idle_per_host = 8
//! http_version = "http1"
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::error::{GatewayError, Result};

/// Settings for [`ReqwestExchange`](super::ReqwestExchange).
///
/// Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    /// Whole-request timeout in seconds (1-120).
    pub timeout_secs: u64,
    /// Connection timeout in seconds (1-30), at most `timeout_secs`.
    pub connect_timeout_secs: u64,
    /// Maximum idle pooled connections per host.
    pub pool_max_idle_per_host: usize,
    /// HTTP version preference.
    pub http_version: HttpVersion,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            pool_max_idle_per_host: 100,
            http_version: HttpVersion::Auto,
            user_agent: concat!("curbstone-gateway/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}

impl HttpConfig {
    /// Checks values are within accepted bounds.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Configuration`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if !(1..=120).contains(&self.timeout_secs) {
            return Err(GatewayError::configuration("http.timeout_secs must be between 1 and 120", None));
        }
        if !(1..=30).contains(&self.connect_timeout_secs) {
            return Err(GatewayError::configuration(
                "http.connect_timeout_secs must be between 1 and 30",
                None,
            ));
        }
        if self.connect_timeout_secs > self.timeout_secs {
            return Err(GatewayError::configuration(
                "http.connect_timeout_secs must not exceed http.timeout_secs",
                None,
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(GatewayError::configuration("http.user_agent must not be empty", None));
        }
        Ok(())
    }

    /// Whole-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Connection timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// HTTP version preference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HttpVersion {
    /// HTTP/1.1 only.
    Http1,
    /// HTTP/2 with prior knowledge.
    Http2,
    /// Negotiated via ALPN.
    #[default]
    Auto,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayErrorKind;

    #[test]
    fn test_defaults_are_valid() {
        let config = HttpConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert!(config.user_agent.starts_with("curbstone-gateway/"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: HttpConfig = toml::from_str("timeout_secs = 45\nhttp_version = \"http2\"").unwrap();
        assert_eq!(config.timeout_secs, 45);
        assert_eq!(config.connect_timeout_secs, 10);
        assert_eq!(config.http_version, HttpVersion::Http2);
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config: HttpConfig = toml::from_str("").unwrap();
        assert_eq!(config, HttpConfig::default());
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(toml::from_str::<HttpConfig>("timeout = 3").is_err());
        assert!(toml::from_str::<HttpConfig>("http_version = \"http3\"").is_err());
    }

    #[test]
    fn test_timeout_bounds() {
        for timeout_secs in [0, 121] {
            let config = HttpConfig { timeout_secs, ..HttpConfig::default() };
            let err = config.validate().unwrap_err();
            assert_eq!(err.kind(), GatewayErrorKind::Configuration);
            assert!(err.to_string().contains("timeout_secs"));
        }
        assert!(HttpConfig { timeout_secs: 120, ..HttpConfig::default() }.validate().is_ok());
    }

    #[test]
    fn test_connect_timeout_bounds() {
        for connect_timeout_secs in [0, 31] {
            let config = HttpConfig { connect_timeout_secs, timeout_secs: 60, ..HttpConfig::default() };
            assert!(config.validate().is_err());
        }
    }

    #[test]
    fn test_connect_timeout_not_above_total() {
        let config = HttpConfig { timeout_secs: 3, connect_timeout_secs: 10, ..HttpConfig::default() };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must not exceed"));
    }

    #[test]
    fn test_blank_user_agent_rejected() {
        let config = HttpConfig { user_agent: "  ".to_owned(), ..HttpConfig::default() };
        assert!(config.validate().is_err());
    }
}
