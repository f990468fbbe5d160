//! # Solvency Prover
//!
//! Proves `value >= threshold` without revealing `value`.
//!
//! ```text
//! Uninitialized ──initialize()──▶ Initializing ──▶ Ready(Live)
//!                                              └──▶ Ready(Simulated)
//! ```
//!
//! Initialization loads the backend circuit once, however many callers race
//! on it. A missing or broken backend downgrades to simulation unless the
//! configured [`SimulationPolicy`] is `Deny`.
//!
//! Feasibility is checked locally before the backend is touched: asking for
//! a proof of `50 >= 100` fails `ProofInfeasible` straight away, and the
//! error never mentions the private value.
//!
//! In simulated mode the public fields are reported faithfully, but there
//! is no zero-knowledge computation behind them and verification just reads
//! the claim back.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::backend::{BackendError, PrivateInputs, ProvingBackend, PublicInputs};
use crate::amount::{ensure_fits_field, to_le_bytes};
use crate::config::{ProverConfig, SimulationPolicy};
use crate::crypto::hash::domain_separated_hash;
use crate::error::{PrismError, PrismResult};
use crate::identity::Address;

const SIMULATED_PROOF_CONTEXT: &str = "prism v1 simulated solvency proof";

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// How proofs are produced once the prover is ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProverMode {
    Live,
    Simulated,
}

/// Where the prover is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProverState {
    Uninitialized,
    Initializing,
    Ready(ProverMode),
}

/// Puts the state back to `Uninitialized` if initialization is dropped
/// half-way, e.g. by a caller's timeout.
struct ResetOnDrop<'a>(&'a Mutex<ProverState>);

impl Drop for ResetOnDrop<'_> {
    fn drop(&mut self) {
        let mut state = self.0.lock();
        if *state == ProverState::Initializing {
            *state = ProverState::Uninitialized;
        }
    }
}

// ---------------------------------------------------------------------------
// SolvencyProof
// ---------------------------------------------------------------------------

/// A proof that some private value meets a public threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolvencyProof {
    /// Opaque proof bytes (compressed Groth16 in live mode).
    #[serde(with = "crate::encoding::hex_bytes")]
    pub proof: Vec<u8>,
    pub public_inputs: PublicInputs,
    pub timestamp: DateTime<Utc>,
    pub mode: ProverMode,
    /// Backend that produced the proof (live only).
    pub backend_id: Option<String>,
}

impl SolvencyProof {
    pub fn is_solvent(&self) -> bool {
        self.public_inputs.is_solvent
    }

    pub fn threshold(&self) -> &U256 {
        &self.public_inputs.threshold
    }

    pub fn context(&self) -> Option<&Address> {
        self.public_inputs.context.as_ref()
    }
}

// ---------------------------------------------------------------------------
// SolvencyProver
// ---------------------------------------------------------------------------

/// Generates and verifies solvency proofs.
pub struct SolvencyProver {
    config: ProverConfig,
    backend: Option<Arc<dyn ProvingBackend>>,
    ready: OnceCell<ProverMode>,
    state: Mutex<ProverState>,
}

impl SolvencyProver {
    pub fn new(config: ProverConfig, backend: Option<Arc<dyn ProvingBackend>>) -> Self {
        Self {
            config,
            backend,
            ready: OnceCell::new(),
            state: Mutex::new(ProverState::Uninitialized),
        }
    }

    /// A prover with no backend that simulates.
    pub fn simulated() -> Self {
        Self::new(ProverConfig::default(), None)
    }

    /// Current lifecycle state.
    pub fn status(&self) -> ProverState {
        *self.state.lock()
    }

    /// Resolved mode, `None` until initialized.
    pub fn mode(&self) -> Option<ProverMode> {
        self.ready.get().copied()
    }

    /// Load the backend, once. Concurrent callers wait for the same result.
    ///
    /// Fails `CapabilityUnavailable` only when simulation is denied and no
    /// working backend is available; the prover then stays uninitialized
    /// and a later call retries.
    pub async fn initialize(&self) -> PrismResult<ProverMode> {
        self.ready
            .get_or_try_init(|| self.resolve_mode())
            .await
            .copied()
    }

    async fn resolve_mode(&self) -> PrismResult<ProverMode> {
        *self.state.lock() = ProverState::Initializing;
        let _reset = ResetOnDrop(&self.state);

        let result = match &self.backend {
            Some(backend) => match backend.load_circuit().await {
                Ok(()) => {
                    info!(backend = backend.name(), "solvency prover running live");
                    Ok(ProverMode::Live)
                }
                Err(e) => self.downgrade(format!("proving backend failed to load: {e}")),
            },
            None => self.downgrade("no proving backend configured".to_string()),
        };

        *self.state.lock() = match &result {
            Ok(mode) => ProverState::Ready(*mode),
            Err(_) => ProverState::Uninitialized,
        };
        result
    }

    fn downgrade(&self, reason: String) -> PrismResult<ProverMode> {
        match self.config.simulation {
            SimulationPolicy::Allow => {
                warn!(%reason, "solvency prover running simulated");
                Ok(ProverMode::Simulated)
            }
            SimulationPolicy::Deny => Err(PrismError::CapabilityUnavailable(reason)),
        }
    }

    fn live_backend(&self) -> PrismResult<&Arc<dyn ProvingBackend>> {
        self.backend
            .as_ref()
            .ok_or_else(|| PrismError::CapabilityUnavailable("no proving backend".into()))
    }

    /// Prove `actual_value >= threshold`.
    pub async fn generate_proof(
        &self,
        actual_value: &U256,
        threshold: &U256,
    ) -> PrismResult<SolvencyProof> {
        self.prove(actual_value, threshold, None).await
    }

    /// Prove `actual_value >= threshold`, bound to `context`.
    pub async fn generate_bound_proof(
        &self,
        actual_value: &U256,
        threshold: &U256,
        context: &Address,
    ) -> PrismResult<SolvencyProof> {
        self.prove(actual_value, threshold, Some(*context)).await
    }

    async fn prove(
        &self,
        actual_value: &U256,
        threshold: &U256,
        context: Option<Address>,
    ) -> PrismResult<SolvencyProof> {
        ensure_fits_field(actual_value)?;
        ensure_fits_field(threshold)?;
        if actual_value < threshold {
            return Err(PrismError::ProofInfeasible {
                threshold: threshold.to_string(),
            });
        }

        let mode = self.initialize().await?;
        let public_inputs = PublicInputs {
            threshold: *threshold,
            is_solvent: true,
            context,
        };

        let (proof, backend_id) = match mode {
            ProverMode::Live => {
                let backend = self.live_backend()?;
                let private = PrivateInputs {
                    value: *actual_value,
                };
                let bytes = backend.prove(&private, &public_inputs).await?;
                (bytes, Some(backend.name().to_string()))
            }
            ProverMode::Simulated => (simulated_proof_bytes(&public_inputs), None),
        };

        debug!(threshold = %threshold, ?mode, bound = context.is_some(), "solvency proof generated");

        Ok(SolvencyProof {
            proof,
            public_inputs,
            timestamp: Utc::now(),
            mode,
            backend_id,
        })
    }

    /// Check a proof.
    ///
    /// Live: the proof bytes must verify against the public inputs *and*
    /// claim solvency, so a flipped flag comes back `false`. Simulated: the
    /// claim is returned as-is.
    pub async fn verify_proof(&self, proof: &SolvencyProof) -> PrismResult<bool> {
        match self.initialize().await? {
            ProverMode::Simulated => Ok(proof.is_solvent()),
            ProverMode::Live => {
                let backend = self.live_backend()?;
                match backend.verify(&proof.proof, &proof.public_inputs).await {
                    Ok(valid) => Ok(valid && proof.is_solvent()),
                    Err(BackendError::MalformedProof(reason)) => {
                        debug!(%reason, "proof bytes rejected");
                        Ok(false)
                    }
                    Err(e) => Err(e.into()),
                }
            }
        }
    }
}

/// Placeholder bytes for simulated proofs: a digest of the public inputs,
/// so two simulated proofs for the same claim look alike and nothing else
/// can be read out of them.
fn simulated_proof_bytes(public: &PublicInputs) -> Vec<u8> {
    let mut data = to_le_bytes(&public.threshold).to_vec();
    if let Some(ctx) = &public.context {
        data.extend_from_slice(ctx.as_bytes());
    }
    domain_separated_hash(SIMULATED_PROOF_CONTEXT, &data).to_vec()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
