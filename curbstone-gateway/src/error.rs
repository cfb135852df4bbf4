//! Error types for the Curbstone gateway.
//!
//! Every failure that means "authorization did not happen" is raised as a
//! [`GatewayError`]. A provider round trip that ends in a decline or a
//! provider-side error is *not* an error here: it is an
//! [`AuthorizeResponse`](crate::model::AuthorizeResponse) with status
//! `DECLINED` or `ERROR`.
//!
//! # Error Categories
//!
//! - **Configuration** ([`GatewayError::Configuration`]): missing credentials or a
//!   disabled gateway, raised before any network call
//! - **Input** ([`GatewayError::InvalidRequest`]): caller built an invalid request
//! - **Transport** ([`GatewayError::Transport`]): network faults, after retries
//! - **HTTP** ([`GatewayError::Http`]): final non-2xx status
//! - **Parse** ([`GatewayError::Parse`]): 2xx body that is not a JSON object
//! - **Gateway** ([`GatewayError::Gateway`]): provider-reported business failure
//!
//! Each variant carries an [`ErrorContext`] so log lines can be written
//! without re-deriving request ids, attempt counts or body snippets.
//!
//! # Examples
//!
//! ```
//! use curbstone_gateway::error::{GatewayError, GatewayErrorKind};
//!
//! let err = GatewayError::configuration("dsiKey is empty", None);
//! assert_eq!(err.kind(), GatewayErrorKind::Configuration);
//! assert!(err.to_string().contains("dsiKey"));
//! ```

use std::{collections::BTreeMap, fmt};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::{model::ReplyMap, transport::TransportFault};

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Maximum number of characters of a response body kept in errors and logs.
pub const SNIPPET_MAX_CHARS: usize = 240;

/// Well-known context keys.
pub mod keys {
    /// Correlation id sent as `X-Request-Id`.
    pub const REQUEST_ID: &str = "request_id";
    /// Number of attempts made when the error was raised.
    pub const ATTEMPTS: &str = "attempts";
    /// HTTP status code of the final response.
    pub const STATUS: &str = "status";
    /// Truncated body prefix.
    pub const SNIPPET: &str = "snippet";
    /// Raw provider reply.
    pub const RAW: &str = "raw";
    /// Tenant the configuration was resolved for.
    pub const TENANT: &str = "tenant";
}

/// Structured, ordered diagnostic context attached to every [`GatewayError`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ErrorContext(BTreeMap<String, Value>);

impl ErrorContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry, replacing any previous value under the same key.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns the request correlation id, if one was recorded.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.get(keys::REQUEST_ID).and_then(Value::as_str)
    }

    /// Returns the number of attempts, if recorded.
    #[must_use]
    pub fn attempts(&self) -> Option<u64> {
        self.get(keys::ATTEMPTS).and_then(Value::as_u64)
    }

    /// Returns true if no entries were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Coarse error category, used for matching and log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayErrorKind {
    /// Bad or missing configuration.
    Configuration,
    /// Invalid caller input.
    InvalidRequest,
    /// Network-level failure.
    Transport,
    /// Non-2xx final status.
    Http,
    /// Malformed 2xx body.
    Parse,
    /// Provider-reported business failure.
    Gateway,
}

impl GatewayErrorKind {
    /// Returns the lower-case category name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::InvalidRequest => "invalid_request",
            Self::Transport => "transport",
            Self::Http => "http",
            Self::Parse => "parse",
            Self::Gateway => "gateway",
        }
    }
}

impl fmt::Display for GatewayErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by the gateway pipeline.
///
/// # Error Recovery
///
/// - [`Configuration`](Self::Configuration): fix tenant settings; never retry blindly
/// - [`InvalidRequest`](Self::InvalidRequest): fix the request
/// - [`Transport`](Self::Transport), [`Http`](Self::Http): the transport already
///   retried; treat the authorization as not performed
/// - [`Parse`](Self::Parse), [`Gateway`](Self::Gateway): contact the provider with
///   the request id from [`context`](Self::context)
#[must_use = "errors should be handled, propagated, or explicitly panicked"]
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Gateway is disabled or required credentials are missing.
    #[error("Curbstone not configured: {message}")]
    Configuration {
        /// What is missing or invalid.
        message: String,
        /// Diagnostic context.
        context: ErrorContext,
    },

    /// The caller-built request violates an input constraint.
    #[error("Invalid authorization request: {message}")]
    InvalidRequest {
        /// The violated constraint.
        message: String,
        /// Diagnostic context.
        context: ErrorContext,
    },

    /// Network or timeout fault that survived the retry budget.
    #[error("Curbstone transport error: {source}")]
    Transport {
        /// The underlying fault.
        #[source]
        source: TransportFault,
        /// Diagnostic context.
        context: ErrorContext,
    },

    /// Final response status outside 2xx.
    #[error("Curbstone HTTP {status}: {snippet}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Body prefix, at most [`SNIPPET_MAX_CHARS`] characters.
        snippet: String,
        /// Diagnostic context.
        context: ErrorContext,
    },

    /// 2xx response whose body is not a JSON object.
    #[error("Curbstone parse error (non-JSON or missing fields): {snippet}")]
    Parse {
        /// Body prefix, at most [`SNIPPET_MAX_CHARS`] characters.
        snippet: String,
        /// Diagnostic context.
        context: ErrorContext,
    },

    /// Provider reported a business-logic failure distinct from HTTP failure.
    #[error("Curbstone gateway error [{code}]{}", message_suffix(.message.as_deref()))]
    Gateway {
        /// Provider result code.
        code: String,
        /// Provider message, if any.
        message: Option<String>,
        /// Diagnostic context, including the raw reply under `raw`.
        context: ErrorContext,
    },
}

fn message_suffix(message: Option<&str>) -> String {
    message.filter(|m| !m.is_empty()).map(|m| format!(": {m}")).unwrap_or_default()
}

impl GatewayError {
    /// Creates a configuration error, recording the tenant when known.
    pub fn configuration(message: impl Into<String>, tenant: Option<&str>) -> Self {
        let context = ErrorContext::new().with(keys::TENANT, tenant.map_or(Value::Null, Value::from));
        Self::Configuration { message: message.into(), context }
    }

    /// Creates an invalid-request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest { message: message.into(), context: ErrorContext::new() }
    }

    /// Wraps a transport fault.
    pub fn transport(source: TransportFault, context: ErrorContext) -> Self {
        Self::Transport { source, context }
    }

    /// Creates an HTTP error from a status and the raw response body.
    pub fn http(status: u16, body: &[u8], context: ErrorContext) -> Self {
        let snippet = snippet(body);
        let context = context.with(keys::STATUS, status).with(keys::SNIPPET, snippet.clone());
        Self::Http { status, snippet, context }
    }

    /// Creates a parse error from the raw response body.
    pub fn parse(body: &[u8], context: ErrorContext) -> Self {
        let snippet = snippet(body);
        let context = context.with(keys::SNIPPET, snippet.clone());
        Self::Parse { snippet, context }
    }

    /// Creates a provider business error, keeping the raw reply for audit.
    pub fn gateway(
        code: impl Into<String>,
        message: Option<String>,
        raw: &ReplyMap,
        context: ErrorContext,
    ) -> Self {
        let context = if raw.is_empty() {
            context
        } else {
            context.with(keys::RAW, Value::Object(raw.clone()))
        };
        Self::Gateway { code: code.into(), message, context }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn kind(&self) -> GatewayErrorKind {
        match self {
            Self::Configuration { .. } => GatewayErrorKind::Configuration,
            Self::InvalidRequest { .. } => GatewayErrorKind::InvalidRequest,
            Self::Transport { .. } => GatewayErrorKind::Transport,
            Self::Http { .. } => GatewayErrorKind::Http,
            Self::Parse { .. } => GatewayErrorKind::Parse,
            Self::Gateway { .. } => GatewayErrorKind::Gateway,
        }
    }

    /// Returns the structured diagnostic context.
    #[must_use]
    pub const fn context(&self) -> &ErrorContext {
        match self {
            Self::Configuration { context, .. }
            | Self::InvalidRequest { context, .. }
            | Self::Transport { context, .. }
            | Self::Http { context, .. }
            | Self::Parse { context, .. }
            | Self::Gateway { context, .. } => context,
        }
    }
}

/// Returns at most [`SNIPPET_MAX_CHARS`] characters of `body`.
///
/// Invalid UTF-8 is replaced rather than rejected; multi-byte characters are
/// never split.
#[must_use]
pub fn snippet(body: &[u8]) -> String {
    String::from_utf8_lossy(body).chars().take(SNIPPET_MAX_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::FaultKind;

    #[test]
    fn test_configuration_error_display() {
        let error = GatewayError::configuration("dsiKey is empty", Some("eu"));
        assert_eq!(error.to_string(), "Curbstone not configured: dsiKey is empty");
        assert_eq!(error.context().get(keys::TENANT), Some(&Value::from("eu")));
    }

    #[test]
    fn test_http_error_carries_status_and_snippet() {
        let body = "x".repeat(1000);
        let error = GatewayError::http(503, body.as_bytes(), ErrorContext::new().with(keys::REQUEST_ID, "abc"));

        let GatewayError::Http { status, snippet, context } = &error else {
            unreachable!("expected Http error");
        };
        assert_eq!(*status, 503);
        assert_eq!(snippet.chars().count(), SNIPPET_MAX_CHARS);
        assert_eq!(context.request_id(), Some("abc"));
        assert_eq!(context.get(keys::STATUS), Some(&Value::from(503)));
    }

    #[test]
    fn test_snippet_does_not_split_multibyte() {
        let body = "é".repeat(300);
        let s = snippet(body.as_bytes());
        assert_eq!(s.chars().count(), SNIPPET_MAX_CHARS);
        assert!(s.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_snippet_short_body_untouched() {
        assert_eq!(snippet(b"not json"), "not json");
        assert_eq!(snippet(b""), "");
    }

    #[test]
    fn test_gateway_error_keeps_raw_reply() {
        let mut raw = ReplyMap::new();
        raw.insert("MFRTRN".to_owned(), Value::from("UL"));
        let error = GatewayError::gateway("UL", Some("session missing".to_owned()), &raw, ErrorContext::new());

        assert_eq!(error.to_string(), "Curbstone gateway error [UL]: session missing");
        assert!(error.context().get(keys::RAW).is_some());
    }

    #[test]
    fn test_gateway_error_without_message() {
        let error = GatewayError::gateway("UL", None, &ReplyMap::new(), ErrorContext::new());
        assert_eq!(error.to_string(), "Curbstone gateway error [UL]");
        assert!(error.context().is_empty());
    }

    #[test]
    fn test_transport_error_exposes_source() {
        let fault = TransportFault::new(FaultKind::Timeout, "operation timed out");
        let error = GatewayError::transport(fault, ErrorContext::new().with(keys::ATTEMPTS, 3));

        assert_eq!(error.kind(), GatewayErrorKind::Transport);
        assert_eq!(error.context().attempts(), Some(3));
        assert!(std::error::Error::source(&error).is_some());
        assert!(error.to_string().contains("timed out"));
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(GatewayErrorKind::Http.as_str(), "http");
        assert_eq!(GatewayErrorKind::InvalidRequest.to_string(), "invalid_request");
    }
}
