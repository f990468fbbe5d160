//! In-process ledger.
//!
//! Implements the identity program's rules over a couple of hash maps. Used
//! by tests, the CLI's offline mode and anyone who wants to exercise the
//! lifecycle without a chain. Faults can be queued to reproduce the awkward
//! cases a real network produces: refusals, timeouts that did or did not
//! land, dropped connections.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tracing::debug;

use super::{LedgerError, LedgerEvent, LedgerService};
use crate::error::RejectReason;
use crate::identity::{
    derive_context_address, derive_root_address, Address, ContextIdentity, ContextType,
    PrivacyLevel, RootIdentity,
};

/// A failure to inject into the next mutating call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectedFault {
    /// Refuse the transaction without applying it.
    Reject(RejectReason),
    /// Time out before the transaction is applied.
    TimeoutBeforeApply,
    /// Apply the transaction, then report a timeout anyway.
    TimeoutAfterApply,
    /// Fail at the transport layer without applying anything.
    Unreachable,
}

#[derive(Default)]
struct LedgerState {
    /// Keyed by root address.
    roots: HashMap<Address, RootIdentity>,
    /// Keyed by context address.
    contexts: HashMap<Address, ContextIdentity>,
    events: Vec<LedgerEvent>,
}

/// A [`LedgerService`] backed by process memory.
#[derive(Default)]
pub struct InMemoryLedger {
    state: RwLock<LedgerState>,
    faults: Mutex<VecDeque<InjectedFault>>,
    latency: Mutex<Option<Duration>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a fault. Faults are consumed in order, one per mutating call;
    /// reads are never faulted.
    pub fn inject(&self, fault: InjectedFault) {
        self.faults.lock().push_back(fault);
    }

    /// Delay every call by `latency`. `None` removes the delay.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    /// Everything emitted so far, oldest first.
    pub fn events(&self) -> Vec<LedgerEvent> {
        self.state.read().events.clone()
    }

    pub fn root_count(&self) -> usize {
        self.state.read().roots.len()
    }

    pub fn context_count(&self) -> usize {
        self.state.read().contexts.len()
    }

    async fn simulate_latency(&self) {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    /// Run one transaction against the state, honouring any queued fault.
    async fn transact<T>(
        &self,
        apply: impl FnOnce(&mut LedgerState) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        self.simulate_latency().await;

        let fault = self.faults.lock().pop_front();
        match fault {
            None => apply(&mut self.state.write()),
            Some(InjectedFault::Reject(reason)) => Err(LedgerError::Rejected(reason)),
            Some(InjectedFault::TimeoutBeforeApply) => Err(LedgerError::Timeout),
            Some(InjectedFault::TimeoutAfterApply) => {
                let landed = apply(&mut self.state.write());
                debug!(landed = landed.is_ok(), "injected timeout after apply");
                Err(LedgerError::Timeout)
            }
            Some(InjectedFault::Unreachable) => {
                Err(LedgerError::Unreachable("injected transport failure".into()))
            }
        }
    }
}

fn invalid_seed(err: impl std::fmt::Display) -> LedgerError {
    LedgerError::Rejected(RejectReason::Other(err.to_string()))
}

#[async_trait]
impl LedgerService for InMemoryLedger {
    async fn create_root(
        &self,
        owner: &Address,
        privacy_level: PrivacyLevel,
    ) -> Result<RootIdentity, LedgerError> {
        let derived = derive_root_address(owner).map_err(invalid_seed)?;
        let owner = *owner;

        self.transact(move |state| {
            if state.roots.contains_key(&derived.address) {
                return Err(LedgerError::Rejected(RejectReason::AccountAlreadyExists));
            }
            let now = Utc::now();
            let root = RootIdentity {
                owner,
                address: derived.address,
                bump: derived.bump,
                created_at: now,
                privacy_level,
                context_count: 0,
            };
            state.roots.insert(root.address, root.clone());
            state.events.push(LedgerEvent::RootIdentityCreated {
                owner,
                root: root.address,
                privacy_level,
                timestamp: now,
            });
            debug!(root = %root.address, "root identity created");
            Ok(root)
        })
        .await
    }

    async fn create_context(
        &self,
        root: &Address,
        context_type: ContextType,
        max_per_transaction: u64,
        privacy_level: PrivacyLevel,
    ) -> Result<ContextIdentity, LedgerError> {
        let root_address = *root;

        self.transact(move |state| {
            let LedgerState {
                roots,
                contexts,
                events,
            } = state;

            let root = roots
                .get_mut(&root_address)
                .ok_or(LedgerError::Rejected(RejectReason::NotFound))?;
            let index = root.next_context_index().map_err(invalid_seed)?;
            let derived =
                derive_context_address(&root_address, u64::from(index)).map_err(invalid_seed)?;
            if contexts.contains_key(&derived.address) {
                return Err(LedgerError::Rejected(RejectReason::AccountAlreadyExists));
            }

            let now = Utc::now();
            let context = ContextIdentity {
                address: derived.address,
                root: root_address,
                index,
                bump: derived.bump,
                context_type,
                privacy_level,
                created_at: now,
                max_per_transaction,
                total_spent: 0,
                revoked: false,
            };
            contexts.insert(context.address, context.clone());
            root.context_count += 1;
            events.push(LedgerEvent::ContextCreated {
                root: root_address,
                context: context.address,
                context_type,
                max_per_transaction,
                index,
                timestamp: now,
            });
            debug!(context = %context.address, index, "context created");
            Ok(context)
        })
        .await
    }

    async fn revoke_context(
        &self,
        root: &Address,
        index: u16,
    ) -> Result<ContextIdentity, LedgerError> {
        let root_address = *root;
        let derived =
            derive_context_address(&root_address, u64::from(index)).map_err(invalid_seed)?;

        self.transact(move |state| {
            let context = state
                .contexts
                .get_mut(&derived.address)
                .ok_or(LedgerError::Rejected(RejectReason::NotFound))?;
            if context.root != root_address {
                return Err(LedgerError::Rejected(RejectReason::ContextMismatch));
            }
            if context.revoked {
                return Err(LedgerError::Rejected(RejectReason::ContextAlreadyRevoked));
            }
            context.revoked = true;
            let revoked = context.clone();
            state.events.push(LedgerEvent::ContextRevoked {
                root: root_address,
                context: revoked.address,
                context_type: revoked.context_type,
                total_spent: revoked.total_spent,
                timestamp: Utc::now(),
            });
            debug!(context = %revoked.address, "context revoked");
            Ok(revoked)
        })
        .await
    }

    async fn fetch_root(&self, owner: &Address) -> Result<Option<RootIdentity>, LedgerError> {
        self.simulate_latency().await;
        let derived = derive_root_address(owner).map_err(invalid_seed)?;
        Ok(self.state.read().roots.get(&derived.address).cloned())
    }

    async fn fetch_context(
        &self,
        address: &Address,
    ) -> Result<Option<ContextIdentity>, LedgerError> {
        self.simulate_latency().await;
        Ok(self.state.read().contexts.get(address).cloned())
    }

    async fn record_spending(
        &self,
        context: &Address,
        amount: u64,
    ) -> Result<ContextIdentity, LedgerError> {
        let context_address = *context;

        self.transact(move |state| {
            let context = state
                .contexts
                .get_mut(&context_address)
                .ok_or(LedgerError::Rejected(RejectReason::NotFound))?;
            if context.revoked {
                return Err(LedgerError::Rejected(RejectReason::ContextRevoked));
            }
            if amount > context.max_per_transaction {
                return Err(LedgerError::Rejected(RejectReason::ExceedsTransactionLimit));
            }
            context.total_spent = context
                .total_spent
                .checked_add(amount)
                .ok_or(LedgerError::Rejected(RejectReason::SpendingOverflow))?;

            let updated = context.clone();
            state.events.push(LedgerEvent::SpendingRecorded {
                context: updated.address,
                amount,
                total_spent: updated.total_spent,
                timestamp: Utc::now(),
            });
            Ok(updated)
        })
        .await
    }

    async fn update_privacy_level(
        &self,
        owner: &Address,
        privacy_level: PrivacyLevel,
    ) -> Result<RootIdentity, LedgerError> {
        let derived = derive_root_address(owner).map_err(invalid_seed)?;

        self.transact(move |state| {
            let root = state
                .roots
                .get_mut(&derived.address)
                .ok_or(LedgerError::Rejected(RejectReason::NotFound))?;
            let old_level = root.privacy_level;
            root.privacy_level = privacy_level;
            let updated = root.clone();
            state.events.push(LedgerEvent::PrivacyLevelUpdated {
                root: updated.address,
                old_level,
                new_level: privacy_level,
                timestamp: Utc::now(),
            });
            Ok(updated)
        })
        .await
    }
}
