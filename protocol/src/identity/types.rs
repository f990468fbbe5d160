//! Identity records and the outcome types returned by lifecycle operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::address::Address;
use crate::config::MAX_CONTEXT_COUNT;
use crate::error::{PrismError, PrismResult, RejectReason};

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// How much a root identity is willing to disclose.
///
/// The wire code is what the ledger stores (one byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyLevel {
    /// Full anonymity.
    Maximum,
    /// Minimal disclosure.
    #[default]
    High,
    /// Balanced.
    Medium,
    /// More transparent.
    Low,
    /// Fully public.
    Public,
}

impl PrivacyLevel {
    /// Ledger wire code, 0..=4.
    pub fn code(self) -> u8 {
        match self {
            PrivacyLevel::Maximum => 0,
            PrivacyLevel::High => 1,
            PrivacyLevel::Medium => 2,
            PrivacyLevel::Low => 3,
            PrivacyLevel::Public => 4,
        }
    }

    /// Decode a wire code.
    pub fn from_code(code: u8) -> PrismResult<Self> {
        match code {
            0 => Ok(PrivacyLevel::Maximum),
            1 => Ok(PrivacyLevel::High),
            2 => Ok(PrivacyLevel::Medium),
            3 => Ok(PrivacyLevel::Low),
            4 => Ok(PrivacyLevel::Public),
            other => Err(PrismError::InvalidInput(format!(
                "{}: got {other}",
                RejectReason::InvalidPrivacyLevel
            ))),
        }
    }
}

/// What a context identity is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextType {
    /// Dark pool trading, swaps.
    DeFi,
    /// Social interactions.
    Social,
    /// Gaming activities.
    Gaming,
    /// Work-related.
    Professional,
    /// Burned after a single use.
    Temporary,
    /// Flex mode, fully public.
    Public,
}

impl ContextType {
    /// Ledger wire code, 0..=5.
    pub fn code(self) -> u8 {
        match self {
            ContextType::DeFi => 0,
            ContextType::Social => 1,
            ContextType::Gaming => 2,
            ContextType::Professional => 3,
            ContextType::Temporary => 4,
            ContextType::Public => 5,
        }
    }

    /// Decode a wire code.
    pub fn from_code(code: u8) -> PrismResult<Self> {
        match code {
            0 => Ok(ContextType::DeFi),
            1 => Ok(ContextType::Social),
            2 => Ok(ContextType::Gaming),
            3 => Ok(ContextType::Professional),
            4 => Ok(ContextType::Temporary),
            5 => Ok(ContextType::Public),
            other => Err(PrismError::InvalidInput(format!(
                "{}: got {other}",
                RejectReason::InvalidContextType
            ))),
        }
    }
}

impl fmt::Display for ContextType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContextType::DeFi => "defi",
            ContextType::Social => "social",
            ContextType::Gaming => "gaming",
            ContextType::Professional => "professional",
            ContextType::Temporary => "temporary",
            ContextType::Public => "public",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// The single top-level identity of an owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootIdentity {
    /// The owner's Ed25519 public key.
    pub owner: Address,
    /// Derived address, a pure function of `owner`.
    pub address: Address,
    /// Bump seed that pushed `address` off the curve.
    pub bump: u8,
    pub created_at: DateTime<Utc>,
    pub privacy_level: PrivacyLevel,
    /// Number of contexts ever created. Only goes up.
    pub context_count: u32,
}

impl RootIdentity {
    /// Index the next context will receive, or `IndexOutOfRange` once the
    /// counter can no longer be incremented.
    pub fn next_context_index(&self) -> PrismResult<u16> {
        if self.context_count >= MAX_CONTEXT_COUNT {
            return Err(PrismError::IndexOutOfRange {
                index: u64::from(self.context_count),
                max: u64::from(MAX_CONTEXT_COUNT - 1),
            });
        }
        Ok(self.context_count as u16)
    }
}

/// A disposable, spending-limited sub-identity of a root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextIdentity {
    /// Derived address, a pure function of `(root, index)`.
    pub address: Address,
    /// Address of the parent root identity.
    pub root: Address,
    pub index: u16,
    pub bump: u8,
    pub context_type: ContextType,
    pub privacy_level: PrivacyLevel,
    pub created_at: DateTime<Utc>,
    /// Per-transaction spending ceiling, in base units.
    pub max_per_transaction: u64,
    /// Cumulative spend, written by the ledger.
    pub total_spent: u64,
    /// Terminal once set.
    pub revoked: bool,
}

impl ContextIdentity {
    /// Local pre-flight for a spend. The ledger enforces the same rules;
    /// this just saves a doomed round-trip.
    pub fn check_spending_limit(&self, amount: u64) -> PrismResult<()> {
        if self.revoked {
            return Err(PrismError::Rejected(RejectReason::ContextRevoked));
        }
        if amount > self.max_per_transaction {
            return Err(PrismError::Rejected(RejectReason::ExceedsTransactionLimit));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of a get-or-create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// This call created the record.
    Created(T),
    /// The record was already there; nothing was submitted or it bounced.
    AlreadyExisted(T),
}

impl<T> Outcome<T> {
    pub fn was_created(&self) -> bool {
        matches!(self, Outcome::Created(_))
    }

    pub fn get(&self) -> &T {
        match self {
            Outcome::Created(v) | Outcome::AlreadyExisted(v) => v,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Outcome::Created(v) | Outcome::AlreadyExisted(v) => v,
        }
    }
}

/// Result of an idempotent revoke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revocation {
    /// This call revoked the context.
    Revoked(ContextIdentity),
    /// The context was already revoked; this is its terminal state.
    AlreadyRevoked(ContextIdentity),
}

impl Revocation {
    pub fn context(&self) -> &ContextIdentity {
        match self {
            Revocation::Revoked(c) | Revocation::AlreadyRevoked(c) => c,
        }
    }

    pub fn was_already_revoked(&self) -> bool {
        matches!(self, Revocation::AlreadyRevoked(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(max: u64, revoked: bool) -> ContextIdentity {
        ContextIdentity {
            address: Address::from_bytes([1; 32]),
            root: Address::from_bytes([2; 32]),
            index: 0,
            bump: 255,
            context_type: ContextType::DeFi,
            privacy_level: PrivacyLevel::High,
            created_at: Utc::now(),
            max_per_transaction: max,
            total_spent: 0,
            revoked,
        }
    }

    #[test]
    fn privacy_codes_round_trip() {
        for code in 0..=4u8 {
            assert_eq!(PrivacyLevel::from_code(code).unwrap().code(), code);
        }
        assert!(matches!(PrivacyLevel::from_code(5), Err(PrismError::InvalidInput(_))));
    }

    #[test]
    fn context_type_codes_round_trip() {
        for code in 0..=5u8 {
            assert_eq!(ContextType::from_code(code).unwrap().code(), code);
        }
        assert!(matches!(ContextType::from_code(6), Err(PrismError::InvalidInput(_))));
    }

    #[test]
    fn spending_limit_is_inclusive() {
        let ctx = context(1_000, false);
        assert!(ctx.check_spending_limit(1_000).is_ok());
        assert_eq!(
            ctx.check_spending_limit(1_001).unwrap_err().reject_reason(),
            Some(&RejectReason::ExceedsTransactionLimit)
        );
    }

    #[test]
    fn revoked_context_cannot_spend() {
        let ctx = context(1_000, true);
        assert_eq!(
            ctx.check_spending_limit(1).unwrap_err().reject_reason(),
            Some(&RejectReason::ContextRevoked)
        );
    }

    #[test]
    fn next_index_bounds() {
        let mut root = RootIdentity {
            owner: Address::from_bytes([3; 32]),
            address: Address::from_bytes([4; 32]),
            bump: 254,
            created_at: Utc::now(),
            privacy_level: PrivacyLevel::Maximum,
            context_count: MAX_CONTEXT_COUNT - 1,
        };
        assert_eq!(root.next_context_index().unwrap(), u16::MAX - 1);

        // A context at 65535 would leave the u16 counter nowhere to go.
        root.context_count += 1;
        assert!(matches!(
            root.next_context_index(),
            Err(PrismError::IndexOutOfRange { index: 65_535, max: 65_534 })
        ));
    }

    #[test]
    fn outcome_accessors() {
        let created = Outcome::Created(7);
        let existed = Outcome::AlreadyExisted(7);
        assert!(created.was_created());
        assert!(!existed.was_created());
        assert_eq!(created.get(), existed.get());
        assert_eq!(existed.into_inner(), 7);
    }
}
