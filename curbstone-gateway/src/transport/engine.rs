//! Retry engine.

use std::fmt;

use serde_json::Value;
use tokio::time::{Instant, sleep};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::{BodyEncoding, ExchangeReply, ExchangeRequest, HttpExchange, RetryPolicy, TransportFault};
use crate::{
    error::{ErrorContext, GatewayError, Result, keys},
    mapper::{NormalizedReply, WirePayload, fields::reply},
    model::ReplyMap,
};

const TEXT_LOG_CHARS: usize = 120;

/// Why an attempt is repeated.
#[derive(Debug)]
pub enum RetryReason {
    /// Transient HTTP status.
    Status(u16),
    /// Retryable transport fault.
    Fault(TransportFault),
}

impl fmt::Display for RetryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => write!(f, "HTTP {status}"),
            Self::Fault(fault) => write!(f, "{fault}"),
        }
    }
}

/// Decision taken after one attempt.
#[derive(Debug)]
pub enum AttemptOutcome {
    /// 2xx with a JSON object body.
    Success(ReplyMap),
    /// Transient failure with attempts remaining.
    Retry(RetryReason),
    /// Terminal failure.
    Fail(GatewayError),
}

impl AttemptOutcome {
    /// Classifies one exchange result.
    ///
    /// `can_retry` is false on the last attempt. `context` is attached to
    /// terminal errors.
    pub fn classify(
        result: std::result::Result<ExchangeReply, TransportFault>,
        can_retry: bool,
        context: ErrorContext,
    ) -> Self {
        match result {
            Ok(exchange) if exchange.is_success() => match serde_json::from_slice::<Value>(&exchange.body) {
                Ok(Value::Object(map)) => Self::Success(map),
                _ => Self::Fail(GatewayError::parse(&exchange.body, context)),
            },
            Ok(exchange) => {
                if can_retry && RetryPolicy::is_transient_status(exchange.status) {
                    Self::Retry(RetryReason::Status(exchange.status))
                } else {
                    Self::Fail(GatewayError::http(exchange.status, &exchange.body, context))
                }
            }
            Err(fault) => {
                if can_retry && fault.is_retryable() {
                    Self::Retry(RetryReason::Fault(fault))
                } else {
                    Self::Fail(GatewayError::transport(fault, context))
                }
            }
        }
    }
}

/// Retrying POST client for the provider.
///
/// Each [`send`](Self::send) is one logical call: one correlation id, one
/// encoded body, up to `retries + 1` sequential attempts.
#[derive(Debug, Clone)]
pub struct DsiTransport<E> {
    exchange: E,
}

impl<E: HttpExchange> DsiTransport<E> {
    /// Wraps an exchange.
    pub const fn new(exchange: E) -> Self {
        Self { exchange }
    }

    /// Returns the wrapped exchange.
    pub const fn exchange(&self) -> &E {
        &self.exchange
    }

    /// POSTs `payload` to `url` and returns the decoded JSON object.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Http`] for a final non-2xx status
    /// - [`GatewayError::Parse`] for a 2xx body that is not a JSON object (never retried)
    /// - [`GatewayError::Transport`] for a fault that is not retryable or outlived the budget
    #[instrument(
        skip(self, payload, policy),
        fields(protocol = self.exchange.protocol_name(), max_attempts = policy.max_attempts())
    )]
    pub async fn send(
        &self,
        url: &str,
        payload: &WirePayload,
        encoding: BodyEncoding,
        policy: &RetryPolicy,
    ) -> Result<ReplyMap> {
        let request_id = Uuid::new_v4().simple().to_string();
        let body = match encoding {
            BodyEncoding::Json => payload.to_json(),
            BodyEncoding::Form => payload.to_form(),
        };
        let request = ExchangeRequest {
            url: url.to_owned(),
            headers: vec![
                ("Content-Type", encoding.content_type().to_owned()),
                ("Accept", "application/json".to_owned()),
                ("X-Request-Id", request_id.clone()),
            ],
            body,
        };

        let max_attempts = policy.max_attempts();
        let mut attempt: u32 = 0;

        while attempt < max_attempts {
            attempt += 1;
            let started = Instant::now();
            let result = self.exchange.execute(&request).await;
            let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

            let status = result.as_ref().ok().map(|r| r.status);
            let context =
                ErrorContext::new().with(keys::REQUEST_ID, request_id.as_str()).with(keys::ATTEMPTS, attempt);

            match AttemptOutcome::classify(result, attempt < max_attempts, context) {
                AttemptOutcome::Success(map) => {
                    let view = NormalizedReply::new(&map);
                    let result_code = view.text(reply::RESULT);
                    let text = view
                        .text(reply::TEXT)
                        .map(|t| t.chars().take(TEXT_LOG_CHARS).collect::<String>());
                    info!(
                        request_id = %request_id,
                        attempt,
                        elapsed_ms,
                        status,
                        result_code = result_code.as_deref(),
                        text = text.as_deref(),
                        outcome = "success",
                        "curbstone POST ok"
                    );
                    return Ok(map);
                }
                AttemptOutcome::Retry(reason) => {
                    let delay = policy.delay_for_retry(attempt - 1);
                    warn!(
                        request_id = %request_id,
                        attempt,
                        elapsed_ms,
                        status,
                        reason = %reason,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        outcome = "retry",
                        "curbstone transient failure, retrying"
                    );
                    sleep(delay).await;
                }
                AttemptOutcome::Fail(err) => {
                    error!(
                        request_id = %request_id,
                        attempt,
                        elapsed_ms,
                        status,
                        kind = %err.kind(),
                        error = %err,
                        outcome = "fail",
                        "curbstone call failed"
                    );
                    return Err(err);
                }
            }
        }

        let context = ErrorContext::new().with(keys::REQUEST_ID, request_id.as_str()).with(keys::ATTEMPTS, attempt);
        error!(request_id = %request_id, attempt, outcome = "exhausted", "curbstone retries exhausted");
        Err(GatewayError::transport(TransportFault::exhausted(), context))
    }
}
