//! Error types for the PRISM core.
//!
//! Every public operation returns a [`PrismError`]. The first group of
//! variants is resolved locally and never costs a round-trip; `Rejected` and
//! `Indeterminate` come back from external services and differ in one
//! crucial way: a rejection is a confirmed outcome, an indeterminate result
//! means the caller has to go look at the ledger before trying again.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::encryption::EncryptionError;
use crate::crypto::pfs::PfsError;

/// Errors surfaced by the PRISM core.
#[derive(Debug, Error)]
pub enum PrismError {
    /// Malformed input (negative or fractional amount, bad wire code, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An owner key or address could not be parsed or is not a valid key.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// A context index outside the addressable range.
    #[error("context index {index} out of range (max {max})")]
    IndexOutOfRange {
        /// Requested index.
        index: u64,
        /// Largest addressable index.
        max: u64,
    },

    /// The value does not meet the threshold, so no proof can exist.
    /// The private value is deliberately not part of the message.
    #[error("proof infeasible: value is below threshold {threshold}")]
    ProofInfeasible {
        /// The public threshold that was not met.
        threshold: String,
    },

    /// An amount wider than the backend field allows.
    #[error("value too large: {bits} bits exceeds the {max_bits}-bit field capacity")]
    ValueTooLarge {
        /// Bit length of the offending value.
        bits: usize,
        /// Maximum accepted bit length.
        max_bits: usize,
    },

    /// An external service explicitly refused the request.
    #[error("rejected: {0}")]
    Rejected(RejectReason),

    /// The outcome of an external call is unknown. Re-query before retrying.
    #[error("indeterminate outcome: {0}")]
    Indeterminate(String),

    /// A required live capability is not available.
    #[error("capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// Local cipher failure.
    #[error(transparent)]
    Encryption(#[from] EncryptionError),

    /// Local key-agreement failure.
    #[error(transparent)]
    KeyAgreement(#[from] PfsError),

    /// The proving backend failed for a reason other than infeasibility.
    #[error("proving backend error: {0}")]
    Backend(String),
}

impl PrismError {
    /// True when the caller must re-query persisted state before any retry.
    pub fn requires_requery(&self) -> bool {
        matches!(self, PrismError::Indeterminate(_))
    }

    /// True for errors decided locally, without touching any service.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            PrismError::InvalidInput(_)
                | PrismError::InvalidKey(_)
                | PrismError::IndexOutOfRange { .. }
                | PrismError::ProofInfeasible { .. }
                | PrismError::ValueTooLarge { .. }
        )
    }

    /// The rejection reason, if this is a confirmed rejection.
    pub fn reject_reason(&self) -> Option<&RejectReason> {
        match self {
            PrismError::Rejected(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Why the ledger (or another service) refused a request. Mirrors the error
/// codes of the identity program so nothing is lost in translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// An account already exists at the derived address.
    AccountAlreadyExists,
    /// The signer does not own this identity.
    Unauthorized,
    /// The context does not belong to the given root.
    ContextMismatch,
    /// Revoke on an already revoked context.
    ContextAlreadyRevoked,
    /// Spend attempted through a revoked context.
    ContextRevoked,
    /// Amount above the context's per-transaction ceiling.
    ExceedsTransactionLimit,
    /// Cumulative spend would overflow.
    SpendingOverflow,
    /// Privacy level code outside 0..=4.
    InvalidPrivacyLevel,
    /// Context type code outside 0..=5.
    InvalidContextType,
    /// No record at the requested address.
    NotFound,
    /// Anything the ledger said that we do not model.
    Other(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::AccountAlreadyExists => write!(f, "account already exists"),
            RejectReason::Unauthorized => write!(f, "unauthorized: signer does not own this identity"),
            RejectReason::ContextMismatch => write!(f, "context does not belong to this root"),
            RejectReason::ContextAlreadyRevoked => write!(f, "context already revoked"),
            RejectReason::ContextRevoked => write!(f, "context is revoked and cannot be used"),
            RejectReason::ExceedsTransactionLimit => {
                write!(f, "amount exceeds transaction limit for this context")
            }
            RejectReason::SpendingOverflow => write!(f, "total spent would overflow"),
            RejectReason::InvalidPrivacyLevel => write!(f, "invalid privacy level: must be 0-4"),
            RejectReason::InvalidContextType => write!(f, "invalid context type: must be 0-5"),
            RejectReason::NotFound => write!(f, "record not found"),
            RejectReason::Other(reason) => write!(f, "{reason}"),
        }
    }
}

/// Shorthand used throughout the crate.
pub type PrismResult<T> = Result<T, PrismError>;
