//! Hosted portal return handling.
//!
//! When the shopper comes back from the portal, the query carries the
//! provider status and the shop transaction reference. [`apply_return`]
//! moves the shop transaction to its final state through a host-owned
//! [`TransactionStateStore`].

#[allow(
    redundant_imports,
    reason = "Future needed for RPITIT despite being in Edition 2024 prelude"
)]
use std::future::Future;
use std::fmt;

use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::model::Flow;

/// Status query parameter.
pub const STATUS_PARAM: &str = "MFSTATU";
/// Transaction reference query parameter.
pub const REFERENCE_PARAM: &str = "MFREFR";
/// Fallback transaction reference parameter.
pub const TX_PARAM: &str = "tx";

/// Error returned by a [`TransactionStateStore`].
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Shop-side payment transaction state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionState {
    /// Created, nothing happened yet.
    Open,
    /// Shopper is on the portal.
    InProgress,
    /// Funds reserved.
    Authorized,
    /// Funds captured.
    Paid,
    /// Payment failed.
    Failed,
    /// Any state this module does not drive.
    Unknown,
}

impl TransactionState {
    /// Parses a technical state name; unrecognized names map to [`Self::Unknown`].
    #[must_use]
    pub fn from_technical_name(name: &str) -> Self {
        match name {
            "open" => Self::Open,
            "in_progress" => Self::InProgress,
            "authorized" => Self::Authorized,
            "paid" => Self::Paid,
            "failed" => Self::Failed,
            _ => Self::Unknown,
        }
    }

    /// Technical state name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Authorized => "authorized",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        }
    }

    /// Paid or authorized.
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Paid | Self::Authorized)
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state transition requested from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    /// To `in_progress`.
    Process,
    /// To `authorized`.
    Authorize,
    /// To `paid`.
    Paid,
    /// To `failed`.
    Fail,
}

impl Transition {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Process => "process",
            Self::Authorize => "authorize",
            Self::Paid => "paid",
            Self::Fail => "fail",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host-owned transaction state machine.
///
/// Transitions that the current state does not allow should return an error.
pub trait TransactionStateStore: Send + Sync {
    /// Reads the current state.
    fn state<'a>(
        &'a self,
        tx_id: &'a str,
    ) -> impl Future<Output = Result<TransactionState, StoreError>> + Send + 'a;

    /// Moves to `in_progress`.
    fn process<'a>(&'a self, tx_id: &'a str) -> impl Future<Output = Result<(), StoreError>> + Send + 'a;

    /// Moves to `authorized`.
    fn authorize<'a>(&'a self, tx_id: &'a str) -> impl Future<Output = Result<(), StoreError>> + Send + 'a;

    /// Moves to `paid`.
    fn paid<'a>(&'a self, tx_id: &'a str) -> impl Future<Output = Result<(), StoreError>> + Send + 'a;

    /// Moves to `failed`.
    fn fail<'a>(&'a self, tx_id: &'a str) -> impl Future<Output = Result<(), StoreError>> + Send + 'a;
}

/// Return handling errors.
#[derive(Debug, Error)]
#[must_use]
pub enum SettlementError {
    /// The current state could not be read.
    #[error("cannot read state of transaction {tx_id}: {source}")]
    State {
        /// Shop transaction id.
        tx_id: String,
        /// Store error.
        #[source]
        source: StoreError,
    },

    /// A transition was refused by the store.
    #[error("transition '{transition}' failed for transaction {tx_id}: {source}")]
    Transition {
        /// Shop transaction id.
        tx_id: String,
        /// Refused transition.
        transition: Transition,
        /// Store error.
        #[source]
        source: StoreError,
    },
}

impl SettlementError {
    fn transition(tx_id: &str, transition: Transition, source: StoreError) -> Self {
        Self::Transition { tx_id: tx_id.to_owned(), transition, source }
    }
}

/// What the portal reported on return.
///
/// # Examples
///
/// ```
/// use curbstone_gateway::settlement::ReturnOutcome;
///
/// let outcome = ReturnOutcome::from_query_string("MFSTATU=ok&MFREFR=tx-42");
/// assert!(outcome.is_ok());
/// assert_eq!(outcome.transaction_ref(), Some("tx-42"));
///
/// assert!(ReturnOutcome::from_query_string("tx=tx-42").is_ok());
/// assert!(!ReturnOutcome::from_query_string("MFSTATU=DECLINED").is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReturnOutcome {
    status: Option<String>,
    transaction_ref: Option<String>,
}

impl ReturnOutcome {
    /// Reads the outcome from query parameters. Later duplicates win.
    pub fn from_query<I, K, V>(params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut status = None;
        let mut reference = None;
        let mut tx = None;
        for (key, value) in params {
            let value = value.as_ref().to_owned();
            match key.as_ref() {
                STATUS_PARAM => status = Some(value),
                REFERENCE_PARAM => reference = Some(value),
                TX_PARAM => tx = Some(value),
                _ => {}
            }
        }

        let transaction_ref = reference.filter(|r| !r.is_empty()).or(tx).filter(|r| !r.is_empty());
        Self { status, transaction_ref }
    }

    /// Parses a raw `application/x-www-form-urlencoded` query string.
    pub fn from_query_string(query: &str) -> Self {
        Self::from_query(url::form_urlencoded::parse(query.as_bytes()))
    }

    /// True if no status was reported or it is `OK` in any case.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status.as_deref().is_none_or(|s| s.eq_ignore_ascii_case("OK"))
    }

    /// Raw reported status.
    #[must_use]
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Shop transaction reference, from `MFREFR` or else `tx`.
    #[must_use]
    pub fn transaction_ref(&self) -> Option<&str> {
        self.transaction_ref.as_deref()
    }
}

/// Applies a portal return to transaction `tx_id`.
///
/// Returns the state the transaction was moved to.
///
/// # Errors
///
/// Returns [`SettlementError`] if the state cannot be read or the target
/// transition fails after one retry through `process`. In the latter case the
/// transaction is marked failed first, unless it is already paid or
/// authorized.
#[instrument(skip(store, outcome), fields(ok = outcome.is_ok()))]
pub async fn apply_return<T: TransactionStateStore>(
    store: &T,
    tx_id: &str,
    flow: Flow,
    outcome: &ReturnOutcome,
) -> Result<TransactionState, SettlementError> {
    let current = store
        .state(tx_id)
        .await
        .map_err(|source| SettlementError::State { tx_id: tx_id.to_owned(), source })?;

    info!(current = %current, "curbstone return received");

    if !outcome.is_ok() {
        if current != TransactionState::Failed {
            store.fail(tx_id).await.map_err(|e| SettlementError::transition(tx_id, Transition::Fail, e))?;
        }
        return Ok(TransactionState::Failed);
    }

    let current = if current == TransactionState::Open {
        if let Err(e) = store.process(tx_id).await {
            warn!(error = %e, "process transition refused, continuing");
        }
        TransactionState::InProgress
    } else {
        current
    };

    let (target, transition) = match flow {
        Flow::AuthCapture => (TransactionState::Paid, Transition::Paid),
        Flow::AuthOnly => (TransactionState::Authorized, Transition::Authorize),
    };
    if current == target {
        return Ok(target);
    }

    if let Err(first) = step(store, tx_id, transition).await {
        warn!(transition = %transition, error = %first, "transition refused, retrying via process");
        let retried = match store.process(tx_id).await {
            Ok(()) => step(store, tx_id, transition).await.map_err(|e| (transition, e)),
            Err(e) => Err((Transition::Process, e)),
        };
        if let Err((failed, source)) = retried {
            error!(transition = %failed, error = %source, "curbstone return state transition failed");
            mark_failed(store, tx_id).await;
            return Err(SettlementError::transition(tx_id, failed, source));
        }
    }

    Ok(target)
}

async fn step<T: TransactionStateStore>(store: &T, tx_id: &str, transition: Transition) -> Result<(), StoreError> {
    match transition {
        Transition::Process => store.process(tx_id).await,
        Transition::Authorize => store.authorize(tx_id).await,
        Transition::Paid => store.paid(tx_id).await,
        Transition::Fail => store.fail(tx_id).await,
    }
}

/// Best effort; the transition error is what the caller gets.
async fn mark_failed<T: TransactionStateStore>(store: &T, tx_id: &str) {
    match store.state(tx_id).await {
        Ok(state) if state.is_settled() => {}
        Ok(_) => {
            if let Err(e) = store.fail(tx_id).await {
                warn!(error = %e, "cannot mark transaction failed");
            }
        }
        Err(e) => warn!(error = %e, "cannot re-read transaction state"),
    }
}
