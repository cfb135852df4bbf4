//! Gateway configuration.
//!
//! Configuration is resolved once per call into an immutable
//! [`GatewayConfig`] snapshot and passed explicitly down the pipeline:
//!
//! - [`ConfigSource`]: loosely typed key/value store owned by the host
//! - [`ConfigResolver`]: coerces, defaults and validates into [`GatewayConfig`]
//! - [`Endpoints`]: sandbox/production base URLs

mod resolver;
mod source;

use std::fmt;

use serde::Deserialize;

pub use resolver::{ConfigResolver, DOMAIN, ENABLED_ENV_VAR, ResolverDefaults, keys};
pub use source::{ConfigSource, MemoryConfigSource, TomlConfigSource};

use crate::{
    error::{GatewayError, Result},
    model::Flow,
};

/// How the hosted payment page is presented to the shopper.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentationMode {
    /// Rendered in an iframe inside the checkout.
    #[default]
    Embedded,
    /// Full-page redirect to the provider.
    Redirect,
}

impl PresentationMode {
    /// Returns the configuration spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Embedded => "embedded",
            Self::Redirect => "redirect",
        }
    }

    /// Parses the configuration spelling. Matching is exact.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "embedded" => Some(Self::Embedded),
            "redirect" => Some(Self::Redirect),
            _ => None,
        }
    }
}

/// Merchant credential triple.
///
/// `Debug` output redacts the DSI key.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// DSI API key.
    pub dsi_key: String,
    /// Provider customer id.
    pub customer_id: String,
    /// Provider merchant code.
    pub merchant_code: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("dsi_key", &if self.dsi_key.is_empty() { "" } else { "***" })
            .field("customer_id", &self.customer_id)
            .field("merchant_code", &self.merchant_code)
            .finish()
    }
}

impl Credentials {
    /// Creates a credential triple.
    #[must_use]
    pub fn new(
        dsi_key: impl Into<String>,
        customer_id: impl Into<String>,
        merchant_code: impl Into<String>,
    ) -> Self {
        Self {
            dsi_key: dsi_key.into(),
            customer_id: customer_id.into(),
            merchant_code: merchant_code.into(),
        }
    }

    /// Returns the names of empty fields, in declaration order.
    ///
    /// Only the empty string counts as missing; whitespace is passed through
    /// to the provider as configured.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("dsiKey", &self.dsi_key),
            ("customerId", &self.customer_id),
            ("merchantCode", &self.merchant_code),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    /// Checks that all three fields are non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Configuration`] naming the empty fields.
    pub fn ensure_complete(&self, tenant: Option<&str>) -> Result<()> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            return Ok(());
        }
        Err(GatewayError::configuration(
            format!("credentials must be non-empty ({})", missing.join("/")),
            tenant,
        ))
    }
}

/// Unvalidated settings, as read from a source.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Gateway switched on.
    pub enabled: bool,
    /// Use sandbox endpoints.
    pub sandbox: bool,
    /// Credential triple.
    pub credentials: Credentials,
    /// Default flow for portal sessions and return handling.
    pub flow: Flow,
    /// Hosted page presentation.
    pub presentation: PresentationMode,
    /// Checkout integration tag (`plp` by default).
    pub checkout_integration: String,
    /// Retry budget; negative values clamp to zero.
    pub retries: i64,
    /// Backoff base in milliseconds; clamps to at least 20.
    pub backoff_ms: i64,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            sandbox: true,
            credentials: Credentials::default(),
            flow: Flow::AuthOnly,
            presentation: PresentationMode::Embedded,
            checkout_integration: "plp".to_owned(),
            retries: 2,
            backoff_ms: 120,
        }
    }
}

/// Smallest accepted backoff base in milliseconds.
pub const MIN_BACKOFF_MS: u64 = 20;

/// Validated, immutable configuration snapshot for one tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    enabled: bool,
    sandbox: bool,
    credentials: Credentials,
    flow: Flow,
    presentation: PresentationMode,
    checkout_integration: String,
    retries: u32,
    backoff_ms: u64,
}

impl GatewayConfig {
    /// Validates and clamps `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Configuration`] if the gateway is enabled and
    /// any credential is empty.
    pub fn new(settings: GatewaySettings) -> Result<Self> {
        Self::for_tenant(settings, None)
    }

    pub(crate) fn for_tenant(settings: GatewaySettings, tenant: Option<&str>) -> Result<Self> {
        if settings.enabled {
            settings.credentials.ensure_complete(tenant)?;
        }

        let retries = u32::try_from(settings.retries.max(0)).unwrap_or(u32::MAX);
        let backoff_ms = u64::try_from(settings.backoff_ms).unwrap_or(0).max(MIN_BACKOFF_MS);

        Ok(Self {
            enabled: settings.enabled,
            sandbox: settings.sandbox,
            credentials: settings.credentials,
            flow: settings.flow,
            presentation: settings.presentation,
            checkout_integration: settings.checkout_integration,
            retries,
            backoff_ms,
        })
    }

    /// Gateway switched on.
    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    /// Use sandbox endpoints.
    #[must_use]
    pub const fn sandbox(&self) -> bool {
        self.sandbox
    }

    /// Credential triple.
    #[must_use]
    pub const fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Configured flow.
    #[must_use]
    pub const fn flow(&self) -> Flow {
        self.flow
    }

    /// Returns true for [`Flow::AuthOnly`].
    #[must_use]
    pub fn is_auth_only(&self) -> bool {
        self.flow == Flow::AuthOnly
    }

    /// Hosted page presentation.
    #[must_use]
    pub const fn presentation(&self) -> PresentationMode {
        self.presentation
    }

    /// Returns true for [`PresentationMode::Embedded`].
    #[must_use]
    pub fn is_embedded(&self) -> bool {
        self.presentation == PresentationMode::Embedded
    }

    /// Checkout integration tag.
    #[must_use]
    pub fn checkout_integration(&self) -> &str {
        &self.checkout_integration
    }

    /// Retry budget (attempts = retries + 1).
    #[must_use]
    pub const fn retries(&self) -> u32 {
        self.retries
    }

    /// Backoff base in milliseconds, at least [`MIN_BACKOFF_MS`].
    #[must_use]
    pub const fn backoff_ms(&self) -> u64 {
        self.backoff_ms
    }
}

/// Provider base URLs.
///
/// Selection between sandbox and production is a pure function of the
/// sandbox flag.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// DSI authorization API, sandbox.
    pub dsi_sandbox: String,
    /// DSI authorization API, production.
    pub dsi_production: String,
    /// Hosted payment portal, sandbox.
    pub plp_sandbox: String,
    /// Hosted payment portal, production.
    pub plp_production: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            dsi_sandbox: "https://c3sbx.net/dsi/".to_owned(),
            dsi_production: "https://c3dsi.net/dsi/".to_owned(),
            plp_sandbox: "https://c3sbx.net/curbstone/plp/".to_owned(),
            plp_production: "https://c3plp.net/curbstone/plp/".to_owned(),
        }
    }
}

impl Endpoints {
    /// DSI base URL for the given environment.
    #[must_use]
    pub fn dsi_base_url(&self, sandbox: bool) -> &str {
        if sandbox { &self.dsi_sandbox } else { &self.dsi_production }
    }

    /// Hosted portal base URL for the given environment.
    #[must_use]
    pub fn plp_base_url(&self, sandbox: bool) -> &str {
        if sandbox { &self.plp_sandbox } else { &self.plp_production }
    }
}
