//! # Identity Manager
//!
//! Client-side lifecycle of root and context identities on top of a
//! [`LedgerService`]. Addresses are derived locally so a caller always knows
//! where a record *should* be; the ledger decides whether it is.
//!
//! Two properties matter more than anything else here:
//!
//! - **Idempotence.** Creating a root that exists returns the existing root.
//!   Revoking a revoked context reports `AlreadyRevoked`. Neither is an
//!   error, and neither submits a second transaction if we can tell up front.
//! - **No guessing after timeouts.** An indeterminate ledger result is
//!   surfaced as-is. [`IdentityManager::reconcile_context`] is how a caller
//!   finds out what actually happened.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::address::{derive_context_address, derive_root_address, Address};
use super::types::{ContextIdentity, ContextType, Outcome, PrivacyLevel, Revocation, RootIdentity};
use crate::error::{PrismError, PrismResult, RejectReason};
use crate::ledger::{LedgerError, LedgerService};

/// Root and context lifecycle against a ledger.
#[derive(Clone)]
pub struct IdentityManager {
    ledger: Arc<dyn LedgerService>,
}

impl IdentityManager {
    pub fn new(ledger: Arc<dyn LedgerService>) -> Self {
        Self { ledger }
    }

    /// Get-or-create the owner's root identity.
    ///
    /// An existing root is returned untouched, even if `privacy_level`
    /// differs from what is stored; use [`Self::update_privacy_level`] to
    /// change it.
    pub async fn create_root_identity(
        &self,
        owner: &Address,
        privacy_level: PrivacyLevel,
    ) -> PrismResult<Outcome<RootIdentity>> {
        let derived = derive_root_address(owner)?;

        if let Some(existing) = self.ledger.fetch_root(owner).await? {
            debug!(root = %existing.address, "root identity already exists");
            return Ok(Outcome::AlreadyExisted(existing));
        }

        match self.ledger.create_root(owner, privacy_level).await {
            Ok(root) => {
                info!(root = %root.address, bump = root.bump, "root identity created");
                Ok(Outcome::Created(root))
            }
            // Lost a race with another submission for the same owner.
            Err(LedgerError::Rejected(RejectReason::AccountAlreadyExists)) => {
                match self.ledger.fetch_root(owner).await? {
                    Some(existing) => Ok(Outcome::AlreadyExisted(existing)),
                    None => Err(PrismError::Indeterminate(format!(
                        "ledger reported {} as existing but returned nothing",
                        derived.address
                    ))),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Read the owner's root identity, if any.
    pub async fn fetch_root(&self, owner: &Address) -> PrismResult<Option<RootIdentity>> {
        derive_root_address(owner)?;
        Ok(self.ledger.fetch_root(owner).await?)
    }

    /// Create the next context under `root`.
    ///
    /// `root` is refreshed from the ledger first, so a stale copy does not
    /// pick a stale index; on success it reflects the incremented counter.
    /// `privacy_level` defaults to the root's.
    pub async fn create_context(
        &self,
        root: &mut RootIdentity,
        context_type: ContextType,
        max_per_transaction: u64,
        privacy_level: Option<PrivacyLevel>,
    ) -> PrismResult<ContextIdentity> {
        let current = self
            .ledger
            .fetch_root(&root.owner)
            .await?
            .ok_or(PrismError::Rejected(RejectReason::NotFound))?;
        *root = current;

        let index = root.next_context_index()?;
        let expected = derive_context_address(&root.address, u64::from(index))?;
        let privacy_level = privacy_level.unwrap_or(root.privacy_level);

        let context = self
            .ledger
            .create_context(&root.address, context_type, max_per_transaction, privacy_level)
            .await?;

        if context.address != expected.address {
            warn!(
                expected = %expected.address,
                got = %context.address,
                "ledger placed context at an unexpected address"
            );
        }
        root.context_count = u32::from(context.index) + 1;
        info!(
            context = %context.address,
            index = context.index,
            context_type = %context_type,
            "context created"
        );
        Ok(context)
    }

    /// Look up the context at `index` under `root`.
    pub async fn fetch_context(
        &self,
        root: &RootIdentity,
        index: u64,
    ) -> PrismResult<Option<ContextIdentity>> {
        let derived = derive_context_address(&root.address, index)?;
        Ok(self.ledger.fetch_context(&derived.address).await?)
    }

    /// After an indeterminate `create_context`, find out whether the context
    /// at `expected_index` landed. `Some` means it did and must not be
    /// created again.
    pub async fn reconcile_context(
        &self,
        root: &RootIdentity,
        expected_index: u64,
    ) -> PrismResult<Option<ContextIdentity>> {
        let found = self.fetch_context(root, expected_index).await?;
        debug!(index = expected_index, landed = found.is_some(), "reconciled context");
        Ok(found)
    }

    /// Revoke the context at `index`. Revoking twice is not an error.
    ///
    /// `root` must be the owner's own root: a record whose address does not
    /// derive from its owner is refused `Unauthorized` before the ledger is
    /// asked.
    pub async fn revoke_context(
        &self,
        root: &RootIdentity,
        index: u64,
    ) -> PrismResult<Revocation> {
        if derive_root_address(&root.owner)?.address != root.address {
            return Err(PrismError::Rejected(RejectReason::Unauthorized));
        }
        let derived = derive_context_address(&root.address, index)?;
        let context = self
            .ledger
            .fetch_context(&derived.address)
            .await?
            .ok_or(PrismError::Rejected(RejectReason::NotFound))?;

        if context.root != root.address {
            return Err(PrismError::Rejected(RejectReason::ContextMismatch));
        }
        if context.revoked {
            return Ok(Revocation::AlreadyRevoked(context));
        }

        match self.ledger.revoke_context(&root.address, context.index).await {
            Ok(revoked) => {
                info!(context = %revoked.address, "context revoked");
                Ok(Revocation::Revoked(revoked))
            }
            Err(LedgerError::Rejected(RejectReason::ContextAlreadyRevoked)) => {
                let current = self
                    .ledger
                    .fetch_context(&derived.address)
                    .await?
                    .ok_or(PrismError::Rejected(RejectReason::NotFound))?;
                Ok(Revocation::AlreadyRevoked(current))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Local pre-flight for a spend; see
    /// [`ContextIdentity::check_spending_limit`].
    pub fn check_spending_limit(&self, context: &ContextIdentity, amount: u64) -> PrismResult<()> {
        context.check_spending_limit(amount)
    }

    /// Record a spend against the context's running total. Obvious refusals
    /// are caught locally; overflow is left to the ledger, which owns the
    /// authoritative total.
    pub async fn record_spending(
        &self,
        context: &ContextIdentity,
        amount: u64,
    ) -> PrismResult<ContextIdentity> {
        context.check_spending_limit(amount)?;
        let updated = self.ledger.record_spending(&context.address, amount).await?;
        debug!(context = %updated.address, total = updated.total_spent, "spending recorded");
        Ok(updated)
    }

    /// Change the root's privacy level. `root` is updated in place.
    pub async fn update_privacy_level(
        &self,
        root: &mut RootIdentity,
        privacy_level: PrivacyLevel,
    ) -> PrismResult<()> {
        let updated = self
            .ledger
            .update_privacy_level(&root.owner, privacy_level)
            .await?;
        *root = updated;
        Ok(())
    }
}
