//! Translation between normalized types and provider field codes.
//!
//! The mapper is pure: no I/O, no clock, no randomness. Equal inputs yield
//! byte-identical payloads.
//!
//! # Examples
//!
//! ```
//! use curbstone_gateway::{
//!     config::Credentials,
//!     mapper::{AuthorizeMapper, DsiMapper},
//!     model::AuthorizeRequest,
//! };
//!
//! let request = AuthorizeRequest::new(1234, "usd", "ORD-1")?;
//! let credentials = Credentials::new("dsi-key", "00001", "99998");
//!
//! let payload = DsiMapper.to_payload(&request, &credentials);
//! assert_eq!(payload.get("MFAMT1"), Some("12.34"));
//! assert_eq!(payload.get("MFCURR"), Some("USD"));
//! # Ok::<(), curbstone_gateway::GatewayError>(())
//! ```

mod dsi;
pub mod fields;

#[cfg(test)]
#[path = "tests/proptest_payload.rs"]
mod proptest_payload;

use std::collections::BTreeMap;

use serde::Serialize;

pub use dsi::DsiMapper;
pub(crate) use dsi::{NormalizedReply, subtype};

use crate::{
    config::Credentials,
    model::{AuthorizeRequest, AuthorizeResponse, ReplyMap},
};

/// Maps requests to wire payloads and replies back to responses.
///
/// Implementations must be total: `from_response` never fails, it reports
/// unrecognized replies as [`AuthorizationStatus::Error`](crate::model::AuthorizationStatus::Error).
pub trait AuthorizeMapper: Send + Sync {
    /// Builds the DSI authorization payload.
    fn to_payload(&self, request: &AuthorizeRequest, credentials: &Credentials) -> WirePayload;

    /// Normalizes a decoded provider reply.
    fn from_response(&self, raw: ReplyMap) -> AuthorizeResponse;
}

/// Ordered field-code to value map sent to the provider.
///
/// Keys are static field codes; iteration and serialization order are
/// stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct WirePayload(BTreeMap<&'static str, String>);

impl WirePayload {
    /// Creates an empty payload.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field unconditionally.
    pub fn insert(&mut self, code: &'static str, value: impl Into<String>) {
        self.0.insert(code, value.into());
    }

    /// Sets a field truncated to `max_chars`, skipping it when empty.
    pub fn insert_opt(&mut self, code: &'static str, value: Option<&str>, max_chars: usize) {
        if let Some(value) = value.map(|v| truncate(v, max_chars))
            && !value.is_empty()
        {
            self.0.insert(code, value);
        }
    }

    /// Returns a field value.
    #[must_use]
    pub fn get(&self, code: &str) -> Option<&str> {
        self.0.get(code).map(String::as_str)
    }

    /// Returns true if the field is present.
    #[must_use]
    pub fn contains(&self, code: &str) -> bool {
        self.0.contains_key(code)
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over fields in code order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Serializes as a JSON object.
    #[must_use]
    pub fn to_json(&self) -> Vec<u8> {
        // A map of strings always serializes.
        serde_json::to_vec(&self.0).unwrap_or_default()
    }

    /// Serializes as `application/x-www-form-urlencoded`.
    #[must_use]
    pub fn to_form(&self) -> Vec<u8> {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.iter())
            .finish()
            .into_bytes()
    }
}

/// Keeps at most `max_chars` characters.
#[must_use]
pub fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

/// Renders minor units as a decimal string with exactly two fraction digits.
///
/// ```
/// use curbstone_gateway::mapper::format_amount;
///
/// assert_eq!(format_amount(0), "0.00");
/// assert_eq!(format_amount(5), "0.05");
/// assert_eq!(format_amount(123_456_789), "1234567.89");
/// ```
#[must_use]
pub fn format_amount(amount_minor: u64) -> String {
    format!("{}.{:02}", amount_minor / 100, amount_minor % 100)
}
