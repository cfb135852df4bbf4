//! Per-tenant configuration resolution.

use serde_json::Value;
use tracing::{debug, instrument};

use super::{Credentials, GatewayConfig, GatewaySettings, PresentationMode, source::ConfigSource};
use crate::{error::Result, model::Flow};

/// Key prefix shared by every gateway setting.
pub const DOMAIN: &str = "Curbstone.config";

/// Environment variable supplying the default for `enabled`.
pub const ENABLED_ENV_VAR: &str = "CURBSTONE_GATEWAY_ENABLED";

/// Fully qualified setting keys.
pub mod keys {
    /// Gateway switched on.
    pub const ENABLED: &str = "Curbstone.config.enabled";
    /// Sandbox environment.
    pub const SANDBOX: &str = "Curbstone.config.sandbox";
    /// DSI API key.
    pub const DSI_KEY: &str = "Curbstone.config.dsiKey";
    /// Provider customer id.
    pub const CUSTOMER_ID: &str = "Curbstone.config.customerId";
    /// Provider merchant code.
    pub const MERCHANT_CODE: &str = "Curbstone.config.merchantCode";
    /// `auth_only` or `auth_capture`.
    pub const FLOW: &str = "Curbstone.config.authCaptureFlow";
    /// `embedded` or `redirect`.
    pub const PLP_MODE: &str = "Curbstone.config.plpMode";
    /// Checkout integration tag.
    pub const CHECKOUT_INTEGRATION: &str = "Curbstone.config.checkoutIntegration";
    /// Retry budget.
    pub const RETRIES: &str = "Curbstone.config.retries";
    /// Backoff base in milliseconds.
    pub const BACKOFF_MS: &str = "Curbstone.config.backoffMs";
}

/// Defaults that come from the process environment.
///
/// Captured once, so resolving stays a pure function of the source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolverDefaults {
    /// Default for `enabled` when no layer sets it.
    pub enabled: bool,
}

impl ResolverDefaults {
    /// Reads [`ENABLED_ENV_VAR`]. Unset or unparseable means false.
    #[must_use]
    pub fn from_env() -> Self {
        let enabled = std::env::var(ENABLED_ENV_VAR)
            .ok()
            .and_then(|raw| parse_bool_str(&raw))
            .unwrap_or(false);
        Self { enabled }
    }
}

/// Resolves a validated [`GatewayConfig`] for a tenant.
///
/// # Examples
///
/// ```
/// use curbstone_gateway::config::{ConfigResolver, MemoryConfigSource, keys};
///
/// let source = MemoryConfigSource::new()
///     .with_global(keys::RETRIES, "5")
///     .with_tenant("eu", keys::RETRIES, "lots");
///
/// let resolver = ConfigResolver::new(source);
/// // The tenant value is malformed, so the global one applies.
/// assert_eq!(resolver.resolve(Some("eu"))?.retries(), 5);
/// # Ok::<(), curbstone_gateway::GatewayError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ConfigResolver<S> {
    source: S,
    defaults: ResolverDefaults,
}

impl<S: ConfigSource> ConfigResolver<S> {
    /// Creates a resolver whose `enabled` default is false.
    pub fn new(source: S) -> Self {
        Self::with_defaults(source, ResolverDefaults::default())
    }

    /// Creates a resolver with explicit environment defaults.
    pub const fn with_defaults(source: S, defaults: ResolverDefaults) -> Self {
        Self { source, defaults }
    }

    /// Returns the underlying source.
    pub const fn source(&self) -> &S {
        &self.source
    }

    /// Resolves the configuration for `tenant` (`None` = global scope only).
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Configuration`](crate::GatewayError::Configuration)
    /// if the gateway is enabled and any credential is empty.
    #[instrument(skip(self, tenant), fields(tenant = tenant.unwrap_or("-")))]
    pub fn resolve(&self, tenant: Option<&str>) -> Result<GatewayConfig> {
        let flow = self
            .layered(keys::FLOW, tenant, coerce_string)
            .and_then(|raw| Flow::parse(&raw))
            .unwrap_or_default();
        let presentation = self
            .layered(keys::PLP_MODE, tenant, coerce_string)
            .and_then(|raw| PresentationMode::parse(&raw))
            .unwrap_or_default();

        let settings = GatewaySettings {
            enabled: self.layered(keys::ENABLED, tenant, coerce_bool).unwrap_or(self.defaults.enabled),
            sandbox: self.layered(keys::SANDBOX, tenant, coerce_bool).unwrap_or(true),
            credentials: Credentials {
                dsi_key: self.layered(keys::DSI_KEY, tenant, coerce_string).unwrap_or_default(),
                customer_id: self.layered(keys::CUSTOMER_ID, tenant, coerce_string).unwrap_or_default(),
                merchant_code: self
                    .layered(keys::MERCHANT_CODE, tenant, coerce_string)
                    .unwrap_or_default(),
            },
            flow,
            presentation,
            checkout_integration: self
                .layered(keys::CHECKOUT_INTEGRATION, tenant, coerce_string)
                .unwrap_or_else(|| "plp".to_owned()),
            retries: self.layered(keys::RETRIES, tenant, coerce_int).unwrap_or(2),
            backoff_ms: self.layered(keys::BACKOFF_MS, tenant, coerce_int).unwrap_or(120),
        };

        let config = GatewayConfig::for_tenant(settings, tenant)?;
        debug!(
            enabled = config.enabled(),
            sandbox = config.sandbox(),
            flow = %config.flow(),
            retries = config.retries(),
            backoff_ms = config.backoff_ms(),
            "resolved gateway config"
        );
        Ok(config)
    }

    /// Tenant scope first, then global. A value that fails to coerce counts as absent.
    fn layered<T>(&self, key: &str, tenant: Option<&str>, coerce: fn(&Value) -> Option<T>) -> Option<T> {
        tenant
            .and_then(|t| self.source.get(key, Some(t)))
            .and_then(|v| coerce(&v))
            .or_else(|| self.source.get(key, None).and_then(|v| coerce(&v)))
    }
}

fn parse_bool_str(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => parse_bool_str(s),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation, reason = "saturating float-to-int cast is intended")]
fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
        }
        _ => None,
    }
}

fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::MemoryConfigSource,
        error::{GatewayError, GatewayErrorKind},
    };

    fn configured() -> MemoryConfigSource {
        MemoryConfigSource::new()
            .with_global(keys::ENABLED, true)
            .with_global(keys::DSI_KEY, "dsi-secret")
            .with_global(keys::CUSTOMER_ID, "00001")
            .with_global(keys::MERCHANT_CODE, "99998")
    }

    #[test]
    fn test_defaults_from_empty_source() {
        let config = ConfigResolver::new(MemoryConfigSource::new()).resolve(None).unwrap();

        assert!(!config.enabled());
        assert!(config.sandbox());
        assert_eq!(config.flow(), Flow::AuthOnly);
        assert!(config.is_embedded());
        assert_eq!(config.checkout_integration(), "plp");
        assert_eq!(config.retries(), 2);
        assert_eq!(config.backoff_ms(), 120);
    }

    #[test]
    fn test_enabled_with_empty_dsi_key_fails() {
        let source = configured().with_global(keys::DSI_KEY, "");
        let err = ConfigResolver::new(source).resolve(Some("eu")).unwrap_err();

        assert_eq!(err.kind(), GatewayErrorKind::Configuration);
        let GatewayError::Configuration { message, context } = &err else {
            unreachable!("expected Configuration error");
        };
        assert!(message.contains("dsiKey"));
        assert_eq!(context.get(crate::error::keys::TENANT), Some(&Value::from("eu")));
    }

    #[test]
    fn test_enabled_default_comes_from_resolver_defaults() {
        let resolver = ConfigResolver::with_defaults(
            configured().with_global(keys::ENABLED, Value::Null),
            ResolverDefaults { enabled: true },
        );
        assert!(resolver.resolve(None).unwrap().enabled());
    }

    #[test]
    fn test_tenant_overrides_global() {
        let source = configured()
            .with_tenant("eu", keys::MERCHANT_CODE, "77777")
            .with_tenant("eu", keys::SANDBOX, "off");
        let resolver = ConfigResolver::new(source);

        let eu = resolver.resolve(Some("eu")).unwrap();
        assert_eq!(eu.credentials().merchant_code, "77777");
        assert!(!eu.sandbox());

        let global = resolver.resolve(None).unwrap();
        assert_eq!(global.credentials().merchant_code, "99998");
        assert!(global.sandbox());
    }

    #[test]
    fn test_malformed_tenant_value_falls_through_to_global() {
        let source = configured()
            .with_global(keys::BACKOFF_MS, 300)
            .with_tenant("eu", keys::BACKOFF_MS, "soon")
            .with_tenant("eu", keys::SANDBOX, "maybe");

        let config = ConfigResolver::new(source).resolve(Some("eu")).unwrap();
        assert_eq!(config.backoff_ms(), 300);
        assert!(config.sandbox());
    }

    #[test]
    fn test_loose_coercions() {
        let source = configured()
            .with_global(keys::ENABLED, "YES")
            .with_global(keys::SANDBOX, 0)
            .with_global(keys::RETRIES, 3.6)
            .with_global(keys::BACKOFF_MS, " 250 ")
            .with_global(keys::MERCHANT_CODE, 99998);

        let config = ConfigResolver::new(source).resolve(None).unwrap();
        assert!(config.enabled());
        assert!(!config.sandbox());
        assert_eq!(config.retries(), 4);
        assert_eq!(config.backoff_ms(), 250);
        assert_eq!(config.credentials().merchant_code, "99998");
    }

    #[test]
    fn test_unknown_enum_values_use_defaults() {
        let source = configured()
            .with_global(keys::FLOW, "capture_later")
            .with_global(keys::PLP_MODE, "popup");

        let config = ConfigResolver::new(source).resolve(None).unwrap();
        assert!(config.is_auth_only());
        assert_eq!(config.presentation(), PresentationMode::Embedded);
    }

    #[test]
    fn test_valid_enum_values() {
        let source = configured()
            .with_global(keys::FLOW, "auth_capture")
            .with_global(keys::PLP_MODE, "redirect");

        let config = ConfigResolver::new(source).resolve(None).unwrap();
        assert_eq!(config.flow(), Flow::AuthCapture);
        assert_eq!(config.presentation(), PresentationMode::Redirect);
    }

    #[test]
    fn test_clamping_through_resolver() {
        let source = configured().with_global(keys::RETRIES, -3).with_global(keys::BACKOFF_MS, 5);

        let config = ConfigResolver::new(source).resolve(None).unwrap();
        assert_eq!(config.retries(), 0);
        assert_eq!(config.backoff_ms(), 20);
    }

    #[test]
    fn test_non_scalar_values_are_ignored() {
        let source = configured()
            .with_global(keys::RETRIES, serde_json::json!([1, 2]))
            .with_global(keys::SANDBOX, serde_json::json!({"on": true}));

        let config = ConfigResolver::new(source).resolve(None).unwrap();
        assert_eq!(config.retries(), 2);
        assert!(config.sandbox());
    }

    #[test]
    fn test_bool_string_parsing() {
        assert_eq!(parse_bool_str("On"), Some(true));
        assert_eq!(parse_bool_str(""), Some(false));
        assert_eq!(parse_bool_str("0"), Some(false));
        assert_eq!(parse_bool_str("2"), None);
    }

    #[test]
    fn test_domain_prefix_matches_keys() {
        for key in [keys::ENABLED, keys::FLOW, keys::BACKOFF_MS, keys::CHECKOUT_INTEGRATION] {
            assert!(key.starts_with(DOMAIN));
        }
    }
}
