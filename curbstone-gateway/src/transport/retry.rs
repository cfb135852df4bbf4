//! Exponential backoff for transient provider failures.
//!
//! The policy computes the attempt budget and the delay before each retry.
//! [`RetryPolicy::base_delay`] is pure; [`RetryPolicy::delay_for_retry`] adds
//! random jitter on top of it.

use std::time::Duration;

use rand::Rng;

use crate::config::{GatewayConfig, MIN_BACKOFF_MS};

/// HTTP statuses treated as transient.
pub const TRANSIENT_STATUSES: [u16; 7] = [408, 425, 429, 500, 502, 503, 504];

/// Upper bound for the pre-jitter delay.
pub const MAX_DELAY: Duration = Duration::from_millis(2000);

/// Upper bound for the random jitter added to every retry after the first.
pub const MAX_JITTER_MS: u64 = 100;

/// Retry budget and backoff base for one call.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use curbstone_gateway::transport::RetryPolicy;
///
/// let policy = RetryPolicy::new(3, 100);
/// assert_eq!(policy.max_attempts(), 4);
/// assert_eq!(policy.base_delay(0), Duration::from_millis(100));
/// assert_eq!(policy.base_delay(1), Duration::from_millis(200));
/// assert_eq!(policy.base_delay(2), Duration::from_millis(400));
/// assert_eq!(policy.base_delay(10), Duration::from_millis(2000));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, 120)
    }
}

impl RetryPolicy {
    /// Creates a policy; the backoff base is raised to at least 20ms.
    #[must_use]
    pub fn new(max_retries: u32, backoff_ms: u64) -> Self {
        Self { max_retries, initial_delay: Duration::from_millis(backoff_ms.max(MIN_BACKOFF_MS)) }
    }

    /// Builds the policy from a resolved configuration.
    #[must_use]
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(config.retries(), config.backoff_ms())
    }

    /// Retries after the first attempt.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Total attempts, always at least one.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Backoff base.
    #[must_use]
    pub const fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Pre-jitter delay before retry number `retry` (0-based).
    ///
    /// The first wait is the backoff base as configured, even above
    /// [`MAX_DELAY`]. Later waits are `initial * 2^retry`, capped at
    /// [`MAX_DELAY`].
    #[must_use]
    pub fn base_delay(&self, retry: u32) -> Duration {
        if retry == 0 {
            return self.initial_delay;
        }
        let factor = 2u32.checked_pow(retry).unwrap_or(u32::MAX);
        self.initial_delay.checked_mul(factor).unwrap_or(MAX_DELAY).min(MAX_DELAY)
    }

    /// Delay actually slept before retry number `retry`.
    ///
    /// The first wait is the base alone; later waits add 0-100ms of jitter.
    #[must_use]
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let base = self.base_delay(retry);
        if retry == 0 {
            return base;
        }
        base + Duration::from_millis(rand::thread_rng().gen_range(0..=MAX_JITTER_MS))
    }

    /// Returns true if `status` is transient.
    #[must_use]
    pub fn is_transient_status(status: u16) -> bool {
        TRANSIENT_STATUSES.contains(&status)
    }
}
