//! # Encrypted Access
//!
//! The one-call flows built on the three components:
//!
//! - [`EncryptedAccess::generate_encrypted_solvency_proof`]: commit to a value
//!   for a context and prove it meets a threshold, in parallel.
//! - [`EncryptedAccess::quick_access`]: the same, on a brand-new `Temporary`
//!   context under the owner's root (created if needed).
//!
//! The commitment and the proof are produced from the same value but are not
//! cryptographically linked to each other. Both are tied to the context: the
//! commitment through its binding key, the proof through its context input.

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::amount::ensure_fits_field;
use crate::binder::{
    verify_commitment_format, BinderMode, Commitment, CommitmentBinder, MpcEncryptionService,
};
use crate::config::{IdentityConfig, PrismConfig};
use crate::error::{PrismError, PrismResult};
use crate::identity::{Address, ContextIdentity, ContextType, IdentityManager, RootIdentity};
use crate::ledger::LedgerService;
use crate::zkp::{ProverMode, ProverState, ProvingBackend, SolvencyProof, SolvencyProver};

/// A commitment and a proof for the same value and context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedSolvencyProof {
    pub commitment: Commitment,
    pub proof: SolvencyProof,
}

/// Everything a quick access produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickAccess {
    pub root: RootIdentity,
    /// Whether this call created the root.
    pub root_created: bool,
    pub context: ContextIdentity,
    pub commitment: Commitment,
    pub proof: SolvencyProof,
}

/// Modes of both capability-dependent components. `binder` is `None` until
/// the binder has been initialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessStatus {
    pub binder: Option<BinderMode>,
    pub prover: ProverState,
}

impl AccessStatus {
    pub fn is_live(&self) -> bool {
        self.binder == Some(BinderMode::Live)
            && self.prover == ProverState::Ready(ProverMode::Live)
    }
}

/// Orchestrates identity, binder and prover.
pub struct EncryptedAccess {
    identity: IdentityManager,
    binder: CommitmentBinder,
    prover: SolvencyProver,
    defaults: IdentityConfig,
}

impl EncryptedAccess {
    pub fn new(
        config: PrismConfig,
        ledger: Arc<dyn LedgerService>,
        mpc: Option<Arc<dyn MpcEncryptionService>>,
        backend: Option<Arc<dyn ProvingBackend>>,
    ) -> Self {
        Self {
            identity: IdentityManager::new(ledger),
            binder: CommitmentBinder::new(config.binder, mpc),
            prover: SolvencyProver::new(config.prover, backend),
            defaults: config.identity,
        }
    }

    pub fn identity(&self) -> &IdentityManager {
        &self.identity
    }

    pub fn binder(&self) -> &CommitmentBinder {
        &self.binder
    }

    pub fn prover(&self) -> &SolvencyProver {
        &self.prover
    }

    /// Resolve both components up front instead of on first use.
    pub async fn initialize(&self) -> PrismResult<AccessStatus> {
        self.binder.initialize().await?;
        self.prover.initialize().await?;
        let status = self.status();
        info!(binder = ?status.binder, prover = ?status.prover, "encrypted access ready");
        Ok(status)
    }

    pub fn status(&self) -> AccessStatus {
        AccessStatus {
            binder: self.binder.mode(),
            prover: self.prover.status(),
        }
    }

    /// Fail `CapabilityUnavailable` unless both components run live.
    pub async fn require_live(&self) -> PrismResult<()> {
        let binder = self.binder.initialize().await?;
        let prover = self.prover.initialize().await?;
        if binder != BinderMode::Live || prover != ProverMode::Live {
            return Err(PrismError::CapabilityUnavailable(format!(
                "binder is {binder:?}, prover is {prover:?}"
            )));
        }
        Ok(())
    }

    /// Commit to `actual_value` for `context` and prove it meets `threshold`.
    ///
    /// Everything that can be rejected locally is, before either component
    /// contacts its service.
    pub async fn generate_encrypted_solvency_proof(
        &self,
        actual_value: &U256,
        threshold: &U256,
        context: &Address,
    ) -> PrismResult<EncryptedSolvencyProof> {
        check_feasible(actual_value, threshold)?;

        let (commitment, proof) = futures::try_join!(
            self.binder.encrypt(actual_value, context),
            self.prover.generate_bound_proof(actual_value, threshold, context),
        )?;

        debug!(context = %context, "encrypted solvency proof generated");
        Ok(EncryptedSolvencyProof { commitment, proof })
    }

    /// Third-party check of an [`EncryptedSolvencyProof`]: well-formed
    /// commitment, both halves bound to the same context, proof verifies.
    pub async fn verify_encrypted_solvency_proof(
        &self,
        artefacts: &EncryptedSolvencyProof,
    ) -> PrismResult<bool> {
        if !verify_commitment_format(&artefacts.commitment) {
            return Ok(false);
        }
        if artefacts.proof.context() != Some(&artefacts.commitment.binding_key) {
            return Ok(false);
        }
        self.prover.verify_proof(&artefacts.proof).await
    }

    /// Get-or-create the owner's root, open a fresh `Temporary` context and
    /// run [`Self::generate_encrypted_solvency_proof`] against it.
    ///
    /// Infeasible or oversized inputs fail before any identity is touched,
    /// so a doomed request never burns a context index.
    pub async fn quick_access(
        &self,
        owner: &Address,
        actual_value: &U256,
        threshold: &U256,
    ) -> PrismResult<QuickAccess> {
        check_feasible(actual_value, threshold)?;

        let outcome = self
            .identity
            .create_root_identity(owner, self.defaults.default_privacy)
            .await?;
        let root_created = outcome.was_created();
        let mut root = outcome.into_inner();

        let context = self
            .identity
            .create_context(
                &mut root,
                ContextType::Temporary,
                self.defaults.quick_access_ceiling,
                None,
            )
            .await?;

        let EncryptedSolvencyProof { commitment, proof } = self
            .generate_encrypted_solvency_proof(actual_value, threshold, &context.address)
            .await?;

        info!(context = %context.address, index = context.index, "quick access granted");
        Ok(QuickAccess {
            root,
            root_created,
            context,
            commitment,
            proof,
        })
    }
}

fn check_feasible(actual_value: &U256, threshold: &U256) -> PrismResult<()> {
    ensure_fits_field(actual_value)?;
    ensure_fits_field(threshold)?;
    if actual_value < threshold {
        return Err(PrismError::ProofInfeasible {
            threshold: threshold.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::{open_commitment, LocalMpcCluster};
    use crate::config::{BinderConfig, ProverConfig, SimulationPolicy};
    use crate::ledger::InMemoryLedger;
    use crate::zkp::Groth16Backend;
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    fn owner() -> Address {
        Address::from_bytes(SigningKey::generate(&mut OsRng).verifying_key().to_bytes())
    }

    fn simulated() -> (Arc<InMemoryLedger>, EncryptedAccess) {
        let ledger = Arc::new(InMemoryLedger::new());
        let access = EncryptedAccess::new(PrismConfig::default(), ledger.clone(), None, None);
        (ledger, access)
    }

    #[tokio::test]
    async fn quick_access_in_simulation() {
        let (ledger, access) = simulated();
        let owner = owner();
        let value = U256::from(5_000u64);
        let threshold = U256::from(1_000u64);

        let first = access.quick_access(&owner, &value, &threshold).await.unwrap();
        assert!(first.root_created);
        assert_eq!(first.context.context_type, ContextType::Temporary);
        assert_eq!(first.context.index, 0);
        assert_eq!(first.root.context_count, 1);
        assert_eq!(first.commitment.binding_key, first.context.address);
        assert!(open_commitment(&first.commitment, &value));
        assert!(first.proof.is_solvent());

        let second = access.quick_access(&owner, &value, &threshold).await.unwrap();
        assert!(!second.root_created);
        assert_eq!(second.context.index, 1);
        assert_eq!(ledger.root_count(), 1);
        assert_eq!(ledger.context_count(), 2);
    }

    #[tokio::test]
    async fn infeasible_quick_access_touches_nothing() {
        let (ledger, access) = simulated();
        let err = access
            .quick_access(&owner(), &U256::from(50u64), &U256::from(100u64))
            .await
            .unwrap_err();
        assert!(matches!(err, PrismError::ProofInfeasible { .. }));
        assert_eq!(ledger.root_count(), 0);
        assert_eq!(ledger.context_count(), 0);
    }

    #[tokio::test]
    async fn status_and_require_live_in_simulation() {
        let (_ledger, access) = simulated();
        let status = access.initialize().await.unwrap();
        assert_eq!(status.binder, Some(BinderMode::Simulated));
        assert_eq!(status.prover, ProverState::Ready(ProverMode::Simulated));
        assert!(!status.is_live());
        assert!(matches!(
            access.require_live().await,
            Err(PrismError::CapabilityUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn mismatched_halves_do_not_verify() {
        let (_ledger, access) = simulated();
        let value = U256::from(10u64);
        let a = access
            .generate_encrypted_solvency_proof(&value, &U256::one(), &Address::from_bytes([1; 32]))
            .await
            .unwrap();
        let b = access
            .generate_encrypted_solvency_proof(&value, &U256::one(), &Address::from_bytes([2; 32]))
            .await
            .unwrap();
        assert!(access.verify_encrypted_solvency_proof(&a).await.unwrap());

        let spliced = EncryptedSolvencyProof {
            commitment: a.commitment,
            proof: b.proof,
        };
        assert!(!access.verify_encrypted_solvency_proof(&spliced).await.unwrap());
    }

    fn live(binder_policy: SimulationPolicy) -> (Arc<LocalMpcCluster>, EncryptedAccess) {
        let cluster = Arc::new(LocalMpcCluster::new("cluster-1"));
        let config = PrismConfig {
            binder: BinderConfig {
                mpc_cluster: Some("cluster-1".into()),
                mpc_program: Some("program-1".into()),
                simulation: binder_policy,
            },
            prover: ProverConfig {
                simulation: SimulationPolicy::Deny,
            },
            ..PrismConfig::default()
        };
        let mpc: Arc<dyn MpcEncryptionService> = cluster.clone();
        let backend: Arc<dyn ProvingBackend> = Arc::new(Groth16Backend::with_seed(42));
        let access = EncryptedAccess::new(
            config,
            Arc::new(InMemoryLedger::new()),
            Some(mpc),
            Some(backend),
        );
        (cluster, access)
    }

    #[tokio::test]
    async fn unreachable_cluster_downgrades_binder_only() {
        let (cluster, access) = live(SimulationPolicy::Allow);
        cluster.set_available(false);

        let status = access.initialize().await.unwrap();
        assert_eq!(status.binder, Some(BinderMode::Simulated));
        assert_eq!(status.prover, ProverState::Ready(ProverMode::Live));
        assert!(!status.is_live());

        let value = U256::from(10u64);
        let artefacts = access
            .generate_encrypted_solvency_proof(&value, &U256::one(), &Address::from_bytes([3; 32]))
            .await
            .unwrap();
        assert_eq!(artefacts.commitment.mode, BinderMode::Simulated);
        assert_eq!(artefacts.proof.mode, ProverMode::Live);
        assert!(access.verify_encrypted_solvency_proof(&artefacts).await.unwrap());
    }

    #[tokio::test]
    async fn unreachable_cluster_fails_initialize_under_deny() {
        let (cluster, access) = live(SimulationPolicy::Deny);
        cluster.set_available(false);
        assert!(matches!(
            access.initialize().await,
            Err(PrismError::CapabilityUnavailable(_))
        ));
        assert_eq!(access.status().binder, None);
    }

    #[tokio::test]
    async fn fully_live_flow() {
        let (cluster, access) = live(SimulationPolicy::Deny);

        access.require_live().await.unwrap();
        assert!(access.status().is_live());

        let value = U256::from(500_000_000_000u64);
        let granted = access
            .quick_access(&owner(), &value, &U256::from(10_000_000_000u64))
            .await
            .unwrap();
        assert_eq!(granted.commitment.mode, BinderMode::Live);
        assert_eq!(granted.proof.mode, ProverMode::Live);
        assert_eq!(
            cluster.decrypt(&granted.commitment).unwrap(),
            crate::amount::to_le_bytes(&value).to_vec()
        );

        let artefacts = EncryptedSolvencyProof {
            commitment: granted.commitment,
            proof: granted.proof,
        };
        assert!(access.verify_encrypted_solvency_proof(&artefacts).await.unwrap());
    }
}
