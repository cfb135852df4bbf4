//! Transport layer.
//!
//! The transport separates one HTTP exchange from the retry policy wrapped
//! around it:
//!
//! - [`HttpExchange`]: performs exactly one POST and reports a status and
//!   body, or a classified [`TransportFault`]
//! - [`DsiTransport`]: the retry engine; owns correlation ids, backoff,
//!   status classification and JSON decoding
//! - [`ReqwestExchange`]: production [`HttpExchange`] backed by reqwest
//!
//! # Examples
//!
//! ```rust,no_run
//! use curbstone_gateway::{
//!     mapper::WirePayload,
//!     transport::{BodyEncoding, DsiTransport, ReqwestExchange, RetryPolicy},
//! };
//!
//! # async fn example() -> curbstone_gateway::Result<()> {
//! let transport = DsiTransport::new(ReqwestExchange::new());
//! let mut payload = WirePayload::new();
//! payload.insert("MFDSIT", "1");
//!
//! let policy = RetryPolicy::new(2, 120);
//! let reply = transport
//!     .send("https://c3sbx.net/dsi/", &payload, BodyEncoding::Json, &policy)
//!     .await?;
//! println!("{:?}", reply.get("MFRTRN"));
//! # Ok(())
//! # }
//! ```

#[allow(
    redundant_imports,
    reason = "Future needed for RPITIT despite being in Edition 2024 prelude"
)]
use std::future::Future;
use std::{error::Error as StdError, fmt};

pub mod config;
mod engine;
pub mod http;
pub mod retry;

pub use config::{HttpConfig, HttpVersion};
pub use engine::{AttemptOutcome, DsiTransport, RetryReason};
pub use http::ReqwestExchange;
pub use retry::{RetryPolicy, TRANSIENT_STATUSES};

/// One outgoing POST.
#[derive(Debug, Clone)]
pub struct ExchangeRequest {
    /// Absolute target URL.
    pub url: String,
    /// Request headers.
    pub headers: Vec<(&'static str, String)>,
    /// Encoded body, identical across retries.
    pub body: Vec<u8>,
}

impl ExchangeRequest {
    /// Returns the first header value named `name`, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Status and body of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeReply {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl ExchangeReply {
    /// Creates a reply.
    #[must_use]
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self { status, body: body.into() }
    }

    /// Returns true for 2xx statuses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Classification of a failed exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// Request or read timed out.
    Timeout,
    /// Connection could not be established or was lost.
    Connect,
    /// Peer signalled rate limiting below the HTTP layer.
    TooManyRequests,
    /// Peer reported a server-side fault below the HTTP layer.
    Server,
    /// Response body could not be read.
    Body,
    /// The request itself could not be built or sent.
    Request,
    /// Retry budget used up without a terminal outcome.
    Exhausted,
}

impl FaultKind {
    /// Returns true for faults worth another attempt.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Timeout | Self::Connect | Self::TooManyRequests | Self::Server | Self::Body)
    }

    /// Short name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Connect => "connect",
            Self::TooManyRequests => "too_many_requests",
            Self::Server => "server",
            Self::Body => "body",
            Self::Request => "request",
            Self::Exhausted => "exhausted",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed exchange, with its kind and the underlying cause.
#[derive(Debug)]
pub struct TransportFault {
    kind: FaultKind,
    message: String,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl TransportFault {
    /// Creates a fault without an underlying cause.
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), source: None }
    }

    /// Attaches the underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Fault raised when the attempt loop ends without a terminal outcome.
    #[must_use]
    pub fn exhausted() -> Self {
        Self::new(FaultKind::Exhausted, "retries exhausted")
    }

    /// Fault classification.
    #[must_use]
    pub const fn kind(&self) -> FaultKind {
        self.kind
    }

    /// Returns true if another attempt may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Human-readable description.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for TransportFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl StdError for TransportFault {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn StdError + 'static))
    }
}

/// Body encoding for a call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BodyEncoding {
    /// `application/json` object (DSI).
    #[default]
    Json,
    /// `application/x-www-form-urlencoded` (portal init).
    Form,
}

impl BodyEncoding {
    /// `Content-Type` header value.
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Form => "application/x-www-form-urlencoded",
        }
    }
}

/// Single-shot HTTP POST.
///
/// Implementations perform exactly one exchange per call and never retry;
/// retries belong to [`DsiTransport`]. Any HTTP status, including 4xx and
/// 5xx, is a successful exchange. Only failures to obtain a status and
/// body are faults.
///
/// Tests implement this trait with scripted replies.
pub trait HttpExchange: Send + Sync {
    /// Executes one POST.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportFault`] if no complete response was received.
    fn execute<'a>(
        &'a self,
        request: &'a ExchangeRequest,
    ) -> impl Future<Output = Result<ExchangeReply, TransportFault>> + Send + 'a;

    /// Returns the protocol name for logging.
    fn protocol_name(&self) -> &'static str;
}

impl<T: HttpExchange> HttpExchange for std::sync::Arc<T> {
    fn execute<'a>(
        &'a self,
        request: &'a ExchangeRequest,
    ) -> impl Future<Output = Result<ExchangeReply, TransportFault>> + Send + 'a {
        (**self).execute(request)
    }

    fn protocol_name(&self) -> &'static str {
        (**self).protocol_name()
    }
}
