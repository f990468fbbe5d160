//! # Ledger Port
//!
//! Identities are persisted by an on-chain program. The core never talks to
//! a chain directly; it talks to a [`LedgerService`], and whoever embeds the
//! core decides what sits behind it (an RPC client, a test double, the
//! bundled [`InMemoryLedger`]).
//!
//! The ledger, not the client, is the authority on every rule it enforces:
//! uniqueness of derived accounts, revocation being terminal, spending
//! ceilings, overflow of the running total. Clients pre-check where it saves
//! a round-trip, but the ledger's answer wins.
//!
//! ## Failure taxonomy
//!
//! A call either lands ([`Ok`]), is refused ([`LedgerError::Rejected`]) or
//! ends in an unknown state ([`LedgerError::Timeout`],
//! [`LedgerError::Unreachable`]). Only the first two are confirmed outcomes;
//! the last two surface as [`PrismError::Indeterminate`] and the caller must
//! re-read the ledger before retrying.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use crate::error::{PrismError, PrismResult, RejectReason};
use crate::identity::{Address, ContextIdentity, ContextType, PrivacyLevel, RootIdentity};

pub use memory::{InMemoryLedger, InjectedFault};

/// Errors returned by a ledger adapter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// The program refused the transaction. Nothing changed.
    #[error("ledger rejected the request: {0}")]
    Rejected(RejectReason),

    /// No confirmation within the deadline. It may or may not have landed.
    #[error("ledger request timed out")]
    Timeout,

    /// Transport failure. Whether the request was received is unknown.
    #[error("ledger unreachable: {0}")]
    Unreachable(String),
}

impl From<LedgerError> for PrismError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Rejected(reason) => PrismError::Rejected(reason),
            LedgerError::Timeout => {
                PrismError::Indeterminate("ledger request timed out".into())
            }
            LedgerError::Unreachable(msg) => {
                PrismError::Indeterminate(format!("ledger unreachable: {msg}"))
            }
        }
    }
}

/// Persistent identity storage.
///
/// Every mutating call is one ledger transaction signed by the owner.
/// Addresses are derived on the ledger side with the same derivation the
/// client uses, so a well-behaved adapter returns records whose `address`
/// fields match [`crate::identity::derive_root_address`] and
/// [`crate::identity::derive_context_address`].
#[async_trait]
pub trait LedgerService: Send + Sync {
    /// Create the owner's root identity. `AccountAlreadyExists` if present.
    async fn create_root(
        &self,
        owner: &Address,
        privacy_level: PrivacyLevel,
    ) -> Result<RootIdentity, LedgerError>;

    /// Create the next context under `root`, taking the root's current
    /// counter as its index and bumping the counter.
    async fn create_context(
        &self,
        root: &Address,
        context_type: ContextType,
        max_per_transaction: u64,
        privacy_level: PrivacyLevel,
    ) -> Result<ContextIdentity, LedgerError>;

    /// Mark the context at `index` under `root` as revoked.
    async fn revoke_context(&self, root: &Address, index: u16)
        -> Result<ContextIdentity, LedgerError>;

    /// Look up the root identity owned by `owner`.
    async fn fetch_root(&self, owner: &Address) -> Result<Option<RootIdentity>, LedgerError>;

    /// Look up a context by its derived address.
    async fn fetch_context(&self, address: &Address)
        -> Result<Option<ContextIdentity>, LedgerError>;

    /// Record a spend against a context's running total.
    async fn record_spending(
        &self,
        context: &Address,
        amount: u64,
    ) -> Result<ContextIdentity, LedgerError>;

    /// Change the root's privacy level.
    async fn update_privacy_level(
        &self,
        owner: &Address,
        privacy_level: PrivacyLevel,
    ) -> Result<RootIdentity, LedgerError>;
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Events the identity program emits. Adapters that can observe them expose
/// them for audit; the core does not depend on them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    RootIdentityCreated {
        owner: Address,
        root: Address,
        privacy_level: PrivacyLevel,
        timestamp: DateTime<Utc>,
    },
    ContextCreated {
        root: Address,
        context: Address,
        context_type: ContextType,
        max_per_transaction: u64,
        index: u16,
        timestamp: DateTime<Utc>,
    },
    ContextRevoked {
        root: Address,
        context: Address,
        context_type: ContextType,
        /// Running total at the moment of revocation.
        total_spent: u64,
        timestamp: DateTime<Utc>,
    },
    SpendingRecorded {
        context: Address,
        amount: u64,
        total_spent: u64,
        timestamp: DateTime<Utc>,
    },
    PrivacyLevelUpdated {
        root: Address,
        old_level: PrivacyLevel,
        new_level: PrivacyLevel,
        timestamp: DateTime<Utc>,
    },
}

// ---------------------------------------------------------------------------
// Deadlines
// ---------------------------------------------------------------------------

/// Run `fut` under a deadline. Running out of time is indeterminate, not a
/// failure: the request may still land after we stop waiting.
pub async fn with_timeout<T, F>(deadline: Duration, fut: F) -> PrismResult<T>
where
    F: Future<Output = PrismResult<T>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(PrismError::Indeterminate(format!(
            "no response within {}ms",
            deadline.as_millis()
        ))),
    }
}
