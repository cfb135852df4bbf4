//! Normalized request and response types.
//!
//! These types are independent of the provider's wire format. The
//! [`mapper`](crate::mapper) module is the only place that knows field codes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};

/// Loosely typed provider reply, exactly as decoded from JSON.
pub type ReplyMap = serde_json::Map<String, serde_json::Value>;

/// Authorization flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flow {
    /// Pre-authorize only; capture happens later.
    #[default]
    AuthOnly,
    /// Authorize and capture in one step (sale).
    AuthCapture,
}

impl Flow {
    /// Returns the configuration spelling (`auth_only` / `auth_capture`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthOnly => "auth_only",
            Self::AuthCapture => "auth_capture",
        }
    }

    /// Parses the configuration spelling. Matching is exact.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "auth_only" => Some(Self::AuthOnly),
            "auth_capture" => Some(Self::AuthCapture),
            _ => None,
        }
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Address-verification fields. Every field is independently optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvsAddress {
    /// Cardholder name.
    pub name: Option<String>,
    /// Street line.
    pub street: Option<String>,
    /// City.
    pub city: Option<String>,
    /// State or region code.
    pub state: Option<String>,
    /// Postal code.
    pub zip: Option<String>,
}

impl AvsAddress {
    /// Returns true if no field carries a non-empty value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        [&self.name, &self.street, &self.city, &self.state, &self.zip]
            .iter()
            .all(|field| field.as_deref().is_none_or(str::is_empty))
    }
}

/// Normalized authorization request.
///
/// Built with [`AuthorizeRequest::new`] and the `with_*` methods; immutable
/// once handed to the gateway.
///
/// # Examples
///
/// ```
/// use curbstone_gateway::model::{AuthorizeRequest, Flow};
///
/// let request = AuthorizeRequest::new(1234, "eur", "ORD-1")?
///     .with_flow(Flow::AuthCapture)
///     .with_tenant("storefront-eu");
///
/// assert_eq!(request.currency(), "EUR");
/// assert_eq!(request.tenant_id(), Some("storefront-eu"));
/// # Ok::<(), curbstone_gateway::GatewayError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizeRequest {
    amount_minor: u64,
    currency: String,
    order_number: String,
    previous_token: Option<String>,
    avs: Option<AvsAddress>,
    tenant_id: Option<String>,
    flow: Flow,
    customer_email: Option<String>,
    customer_number: Option<String>,
    return_url: Option<String>,
    merchant_code: Option<String>,
    customer_code: Option<String>,
}

impl AuthorizeRequest {
    /// Creates a request for `amount_minor` units of `currency`.
    ///
    /// The currency is normalized to upper case.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if the order number is blank
    /// or the currency is not a three-letter code.
    pub fn new(
        amount_minor: u64,
        currency: impl Into<String>,
        order_number: impl Into<String>,
    ) -> Result<Self> {
        let currency = currency.into().trim().to_ascii_uppercase();
        if currency.len() != 3 || !currency.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(GatewayError::invalid_request(format!(
                "currency must be a three-letter ISO code, got '{currency}'"
            )));
        }

        let order_number = order_number.into();
        if order_number.trim().is_empty() {
            return Err(GatewayError::invalid_request("order number must not be empty"));
        }

        Ok(Self {
            amount_minor,
            currency,
            order_number,
            previous_token: None,
            avs: None,
            tenant_id: None,
            flow: Flow::default(),
            customer_email: None,
            customer_number: None,
            return_url: None,
            merchant_code: None,
            customer_code: None,
        })
    }

    /// Sets the vaulted token from a previous payment.
    #[must_use]
    pub fn with_previous_token(mut self, token: impl Into<String>) -> Self {
        self.previous_token = Some(token.into());
        self
    }

    /// Sets address-verification data.
    #[must_use]
    pub fn with_avs(mut self, avs: AvsAddress) -> Self {
        self.avs = Some(avs);
        self
    }

    /// Sets the tenant whose configuration applies.
    #[must_use]
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Sets the authorization flow.
    #[must_use]
    pub const fn with_flow(mut self, flow: Flow) -> Self {
        self.flow = flow;
        self
    }

    /// Sets the customer email.
    #[must_use]
    pub fn with_customer_email(mut self, email: impl Into<String>) -> Self {
        self.customer_email = Some(email.into());
        self
    }

    /// Sets the shop's customer number.
    #[must_use]
    pub fn with_customer_number(mut self, number: impl Into<String>) -> Self {
        self.customer_number = Some(number.into());
        self
    }

    /// Sets the URL the provider returns the shopper to.
    #[must_use]
    pub fn with_return_url(mut self, url: impl Into<String>) -> Self {
        self.return_url = Some(url.into());
        self
    }

    /// Overrides the tenant's merchant code for this request.
    #[must_use]
    pub fn with_merchant_code(mut self, code: impl Into<String>) -> Self {
        self.merchant_code = Some(code.into());
        self
    }

    /// Overrides the tenant's customer code for this request.
    #[must_use]
    pub fn with_customer_code(mut self, code: impl Into<String>) -> Self {
        self.customer_code = Some(code.into());
        self
    }

    /// Amount in minor currency units.
    #[must_use]
    pub const fn amount_minor(&self) -> u64 {
        self.amount_minor
    }

    /// Upper-case ISO currency code.
    #[must_use]
    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Merchant order number.
    #[must_use]
    pub fn order_number(&self) -> &str {
        &self.order_number
    }

    /// Previous payment token.
    #[must_use]
    pub fn previous_token(&self) -> Option<&str> {
        self.previous_token.as_deref()
    }

    /// Address-verification data.
    #[must_use]
    pub const fn avs(&self) -> Option<&AvsAddress> {
        self.avs.as_ref()
    }

    /// Tenant identifier.
    #[must_use]
    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    /// Authorization flow.
    #[must_use]
    pub const fn flow(&self) -> Flow {
        self.flow
    }

    /// Customer email.
    #[must_use]
    pub fn customer_email(&self) -> Option<&str> {
        self.customer_email.as_deref()
    }

    /// Customer number.
    #[must_use]
    pub fn customer_number(&self) -> Option<&str> {
        self.customer_number.as_deref()
    }

    /// Return URL.
    #[must_use]
    pub fn return_url(&self) -> Option<&str> {
        self.return_url.as_deref()
    }

    /// Merchant code override.
    #[must_use]
    pub fn merchant_code(&self) -> Option<&str> {
        self.merchant_code.as_deref()
    }

    /// Customer code override.
    #[must_use]
    pub fn customer_code(&self) -> Option<&str> {
        self.customer_code.as_deref()
    }
}

/// Outcome of an authorization round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorizationStatus {
    /// Funds authorized.
    Approved,
    /// Issuer declined.
    Declined,
    /// Provider returned an error or an unknown result code.
    Error,
}

impl AuthorizationStatus {
    /// Returns the upper-case status name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "APPROVED",
            Self::Declined => "DECLINED",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized authorization response, produced once per call by the mapper.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizeResponse {
    status: AuthorizationStatus,
    token: Option<String>,
    network_ref: Option<String>,
    message: Option<String>,
    raw: ReplyMap,
}

impl AuthorizeResponse {
    /// Assembles a response. Empty strings are stored as `None`.
    #[must_use]
    pub fn new(
        status: AuthorizationStatus,
        token: Option<String>,
        network_ref: Option<String>,
        message: Option<String>,
        raw: ReplyMap,
    ) -> Self {
        Self {
            status,
            token: token.filter(|t| !t.is_empty()),
            network_ref: network_ref.filter(|r| !r.is_empty()),
            message: message.filter(|m| !m.is_empty()),
            raw,
        }
    }

    /// Authorization status.
    #[must_use]
    pub const fn status(&self) -> AuthorizationStatus {
        self.status
    }

    /// Returns true if the status is [`AuthorizationStatus::Approved`].
    #[must_use]
    pub fn is_approved(&self) -> bool {
        self.status == AuthorizationStatus::Approved
    }

    /// Payment token for later captures or recurring charges.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Network reference.
    #[must_use]
    pub fn network_ref(&self) -> Option<&str> {
        self.network_ref.as_deref()
    }

    /// Human-readable provider message.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Raw provider reply, unmodified.
    #[must_use]
    pub const fn raw(&self) -> &ReplyMap {
        &self.raw
    }
}
