//! # Proving Backend
//!
//! The prover talks to its proof system through [`ProvingBackend`]. The
//! bundled implementation is [`Groth16Backend`]: Groth16 over BN254 for the
//! [`SolvencyCircuit`], with the circuit-specific setup run in-process.
//!
//! 1. **Load**: `load_circuit()` runs the setup once on a blocking thread
//!    and keeps the proving key and prepared verifying key in memory.
//!    In production the keys come from a ceremony, not from local setup.
//! 2. **Prove**: witness in, ~128-byte compressed proof out.
//! 3. **Verify**: three pairings against the public inputs. Constant time
//!    regardless of circuit size.

use ark_bn254::{Bn254, Fr};
use ark_ff::Zero;
use ark_groth16::{prepare_verifying_key, Groth16, PreparedVerifyingKey, ProvingKey};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_snark::SNARK;
use ark_std::rand::{rngs::StdRng, thread_rng, SeedableRng};
use async_trait::async_trait;
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::circuit::{public_inputs, SolvencyCircuit};
use crate::amount::to_field;
use crate::config::MAX_VALUE_BITS;
use crate::crypto::hash::hash_to_field;
use crate::error::PrismError;
use crate::identity::Address;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// What the verifier sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicInputs {
    pub threshold: U256,
    pub is_solvent: bool,
    /// Context the proof is bound to, if any.
    pub context: Option<Address>,
}

impl PublicInputs {
    /// Field encoding, in circuit order.
    fn to_field_elements(&self) -> Vec<Fr> {
        let binding = self
            .context
            .map(|addr| hash_to_field(addr.as_bytes()))
            .unwrap_or_else(Fr::zero);
        public_inputs(to_field(&self.threshold), self.is_solvent, binding)
    }
}

/// What only the prover knows.
#[derive(Clone)]
pub struct PrivateInputs {
    pub value: U256,
}

impl fmt::Debug for PrivateInputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateInputs { value: <redacted> }")
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Errors from a proving backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("circuit not loaded")]
    NotLoaded,

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("circuit setup failed: {0}")]
    Setup(String),

    #[error("witness does not satisfy the circuit: {0}")]
    Unsatisfiable(String),

    #[error("proof generation failed: {0}")]
    Proving(String),

    #[error("malformed proof: {0}")]
    MalformedProof(String),
}

impl From<BackendError> for PrismError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Unavailable(msg) => PrismError::CapabilityUnavailable(msg),
            other => PrismError::Backend(other.to_string()),
        }
    }
}

/// A zero-knowledge proof system for the solvency relation.
#[async_trait]
pub trait ProvingBackend: Send + Sync {
    /// Short identifier recorded on proofs.
    fn name(&self) -> &str;

    /// Prepare keys. Called once by the prover; must be idempotent.
    async fn load_circuit(&self) -> Result<(), BackendError>;

    /// Produce proof bytes for `private` against `public`.
    async fn prove(
        &self,
        private: &PrivateInputs,
        public: &PublicInputs,
    ) -> Result<Vec<u8>, BackendError>;

    /// Check proof bytes against `public`.
    async fn verify(&self, proof: &[u8], public: &PublicInputs) -> Result<bool, BackendError>;
}

// ---------------------------------------------------------------------------
// Groth16Backend
// ---------------------------------------------------------------------------

struct CircuitKeys {
    pk: ProvingKey<Bn254>,
    pvk: PreparedVerifyingKey<Bn254>,
}

/// Groth16 over BN254, keys generated in-process.
pub struct Groth16Backend {
    setup_seed: Option<u64>,
    keys: OnceCell<Arc<CircuitKeys>>,
}

impl Groth16Backend {
    /// Setup randomness from the thread RNG.
    pub fn new() -> Self {
        Self {
            setup_seed: None,
            keys: OnceCell::new(),
        }
    }

    /// Deterministic setup. Only for tests and benchmarks: anyone who knows
    /// the seed knows the toxic waste.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            setup_seed: Some(seed),
            keys: OnceCell::new(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.keys.initialized()
    }

    /// Compressed verifying key, for handing to third-party verifiers.
    pub fn verifying_key_bytes(&self) -> Result<Vec<u8>, BackendError> {
        let keys = self.loaded_keys()?;
        let mut buf = Vec::new();
        keys.pk
            .vk
            .serialize_compressed(&mut buf)
            .map_err(|e| BackendError::Setup(e.to_string()))?;
        Ok(buf)
    }

    fn loaded_keys(&self) -> Result<Arc<CircuitKeys>, BackendError> {
        self.keys.get().cloned().ok_or(BackendError::NotLoaded)
    }
}

impl Default for Groth16Backend {
    fn default() -> Self {
        Self::new()
    }
}

fn check_width(label: &str, value: &U256) -> Result<(), BackendError> {
    if value.bits() > MAX_VALUE_BITS {
        return Err(BackendError::Unsatisfiable(format!(
            "{label} exceeds {MAX_VALUE_BITS} bits"
        )));
    }
    Ok(())
}

#[async_trait]
impl ProvingBackend for Groth16Backend {
    fn name(&self) -> &str {
        "groth16-bn254"
    }

    async fn load_circuit(&self) -> Result<(), BackendError> {
        let seed = self.setup_seed;
        self.keys
            .get_or_try_init(|| async move {
                let keys = tokio::task::spawn_blocking(move || {
                    let blank = SolvencyCircuit::blank();
                    let (pk, vk) = match seed {
                        Some(seed) => Groth16::<Bn254>::circuit_specific_setup(
                            blank,
                            &mut StdRng::seed_from_u64(seed),
                        ),
                        None => Groth16::<Bn254>::circuit_specific_setup(blank, &mut thread_rng()),
                    }
                    .map_err(|e| BackendError::Setup(e.to_string()))?;
                    let pvk = prepare_verifying_key(&vk);
                    Ok::<_, BackendError>(CircuitKeys { pk, pvk })
                })
                .await
                .map_err(|e| BackendError::Setup(format!("setup task failed: {e}")))??;

                info!("groth16 solvency circuit loaded");
                Ok::<_, BackendError>(Arc::new(keys))
            })
            .await?;
        Ok(())
    }

    async fn prove(
        &self,
        private: &PrivateInputs,
        public: &PublicInputs,
    ) -> Result<Vec<u8>, BackendError> {
        let keys = self.loaded_keys()?;

        check_width("value", &private.value)?;
        check_width("threshold", &public.threshold)?;
        if !public.is_solvent {
            return Err(BackendError::Unsatisfiable("claim must be is_solvent = true".into()));
        }
        // ark-groth16 does not reject an unsatisfied witness in release
        // builds; it returns a proof that will never verify.
        if private.value < public.threshold {
            return Err(BackendError::Unsatisfiable("value below threshold".into()));
        }

        let inputs = public.to_field_elements();
        let circuit = SolvencyCircuit::new(to_field(&private.value), inputs[0], inputs[2]);

        let bytes = tokio::task::spawn_blocking(move || {
            let proof = Groth16::<Bn254>::prove(&keys.pk, circuit, &mut thread_rng())
                .map_err(|e| BackendError::Proving(e.to_string()))?;
            let mut bytes = Vec::new();
            proof
                .serialize_compressed(&mut bytes)
                .map_err(|e| BackendError::Proving(format!("proof serialization failed: {e}")))?;
            Ok::<_, BackendError>(bytes)
        })
        .await
        .map_err(|e| BackendError::Proving(format!("proving task failed: {e}")))??;

        debug!(size = bytes.len(), "groth16 proof generated");
        Ok(bytes)
    }

    async fn verify(&self, proof: &[u8], public: &PublicInputs) -> Result<bool, BackendError> {
        let keys = self.loaded_keys()?;
        let proof = ark_groth16::Proof::<Bn254>::deserialize_compressed(proof)
            .map_err(|e| BackendError::MalformedProof(e.to_string()))?;
        if public.threshold.bits() > MAX_VALUE_BITS {
            return Ok(false);
        }

        Groth16::<Bn254>::verify_with_processed_vk(&keys.pvk, &public.to_field_elements(), &proof)
            .map_err(|e| BackendError::MalformedProof(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn public(threshold: u64, context: Option<Address>) -> PublicInputs {
        PublicInputs {
            threshold: U256::from(threshold),
            is_solvent: true,
            context,
        }
    }

    fn private(value: u64) -> PrivateInputs {
        PrivateInputs {
            value: U256::from(value),
        }
    }

    async fn loaded() -> Groth16Backend {
        let backend = Groth16Backend::with_seed(42);
        backend.load_circuit().await.unwrap();
        backend
    }

    #[tokio::test]
    async fn prove_before_load_fails() {
        let backend = Groth16Backend::with_seed(42);
        assert!(!backend.is_loaded());
        let err = backend.prove(&private(10), &public(5, None)).await.unwrap_err();
        assert!(matches!(err, BackendError::NotLoaded));
    }

    #[tokio::test]
    async fn valid_proof_verifies_and_tampering_does_not() {
        let backend = loaded().await;
        let ctx = Address::from_bytes([5; 32]);
        let claim = public(200, Some(ctx));

        let proof = backend.prove(&private(1_000), &claim).await.unwrap();
        assert!(proof.len() < 400, "proof should be compact");
        assert!(backend.verify(&proof, &claim).await.unwrap());

        let mut flipped = claim.clone();
        flipped.is_solvent = false;
        assert!(!backend.verify(&proof, &flipped).await.unwrap());

        let mut other_threshold = claim.clone();
        other_threshold.threshold = U256::from(999u64);
        assert!(!backend.verify(&proof, &other_threshold).await.unwrap());

        let mut other_context = claim.clone();
        other_context.context = Some(Address::from_bytes([6; 32]));
        assert!(!backend.verify(&proof, &other_context).await.unwrap());

        let mut unbound = claim;
        unbound.context = None;
        assert!(!backend.verify(&proof, &unbound).await.unwrap());
    }

    #[tokio::test]
    async fn exact_threshold_proves() {
        let backend = loaded().await;
        let claim = public(500, None);
        let proof = backend.prove(&private(500), &claim).await.unwrap();
        assert!(backend.verify(&proof, &claim).await.unwrap());
    }

    #[tokio::test]
    async fn unsatisfiable_witness_is_refused() {
        let backend = loaded().await;
        let err = backend.prove(&private(10), &public(100, None)).await.unwrap_err();
        assert!(matches!(err, BackendError::Unsatisfiable(_)));
    }

    #[tokio::test]
    async fn garbage_proof_is_malformed() {
        let backend = loaded().await;
        let err = backend.verify(&[0xFF; 16], &public(1, None)).await.unwrap_err();
        assert!(matches!(err, BackendError::MalformedProof(_)));
    }

    #[tokio::test]
    async fn load_is_idempotent_and_vk_exports() {
        let backend = loaded().await;
        let vk = backend.verifying_key_bytes().unwrap();
        backend.load_circuit().await.unwrap();
        assert_eq!(backend.verifying_key_bytes().unwrap(), vk);
        assert!(!vk.is_empty());
    }

    #[test]
    fn private_inputs_do_not_print() {
        let shown = format!("{:?}", private(123_456_789));
        assert!(!shown.contains("123456789"));
    }
}
