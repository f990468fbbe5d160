//! # Solvency R1CS Circuit
//!
//! The statement proved inside the Groth16 SNARK:
//!
//! ```text
//! "I know `value` such that value >= threshold",
//! bound to a context and to the claim `is_solvent = 1`.
//! ```
//!
//! ## Constraint breakdown
//!
//! ### Range check (value >= threshold)
//!
//! Let `delta = value - threshold`. We bit-decompose `delta` into
//! [`RANGE_BITS`] (248) bits and enforce:
//!
//! 1. Each bit `b_i` is boolean: `b_i * (1 - b_i) = 0`.
//! 2. `sum(b_i * 2^i) = delta`.
//!
//! `2^248` is far below the BN254 scalar modulus (~`2^254`), so a negative
//! `delta` wraps to a field element around `2^254` that has no 248-bit
//! decomposition. A satisfied system therefore implies
//! `0 <= delta < 2^248` in the integers, provided both inputs fit in 248
//! bits (checked before the circuit is ever built).
//!
//! ### The public claim
//!
//! `is_solvent` is a public boolean constrained to `true`. A verifier that
//! is handed a proof with the flag flipped to `false` evaluates the pairing
//! equation on a different public input and rejects it.
//!
//! ### Context binding
//!
//! `context_binding` is the hash-to-field of the context address (zero if
//! unbound). Groth16 only binds public inputs that appear in a constraint,
//! so it is squared once; the result is otherwise unused.
//!
//! Total: ~248 (boolean) + 1 (sum) + 2 (claim) + 1 (binding) constraints.
//!
//! ## Public inputs (in order)
//!
//! | index | value |
//! |-------|-------|
//! | 0     | `threshold` |
//! | 1     | `is_solvent` (1 or 0) |
//! | 2     | `context_binding` |

use ark_bn254::Fr;
use ark_ff::{One, PrimeField, Zero};
use ark_r1cs_std::{
    alloc::AllocVar,
    boolean::Boolean,
    eq::EqGadget,
    fields::{fp::FpVar, FieldVar},
};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

use super::RANGE_BITS;

// ---------------------------------------------------------------------------
// Circuit definition
// ---------------------------------------------------------------------------

/// Groth16 R1CS circuit proving `value >= threshold`.
///
/// Witness and input slots are `Option<_>` so the blank circuit can be used
/// for key generation.
#[derive(Clone, Default)]
pub struct SolvencyCircuit {
    // -- Private witness ----------------------------------------------------
    pub value: Option<Fr>,

    // -- Public inputs ------------------------------------------------------
    pub threshold: Option<Fr>,
    pub context_binding: Option<Fr>,
}

impl SolvencyCircuit {
    /// A fully populated circuit for proving.
    pub fn new(value: Fr, threshold: Fr, context_binding: Fr) -> Self {
        Self {
            value: Some(value),
            threshold: Some(threshold),
            context_binding: Some(context_binding),
        }
    }

    /// A blank circuit for CRS generation. Same topology, no witness.
    pub fn blank() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Constraint synthesizer
// ---------------------------------------------------------------------------

impl ConstraintSynthesizer<Fr> for SolvencyCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        // ===================================================================
        // 1. Public inputs, in the order the verifier supplies them
        // ===================================================================

        let threshold_var = FpVar::<Fr>::new_input(ark_relations::ns!(cs, "threshold"), || {
            self.threshold.ok_or(SynthesisError::AssignmentMissing)
        })?;

        let is_solvent_var =
            Boolean::<Fr>::new_input(ark_relations::ns!(cs, "is_solvent"), || Ok(true))?;
        is_solvent_var.enforce_equal(&Boolean::TRUE)?;

        let binding_var =
            FpVar::<Fr>::new_input(ark_relations::ns!(cs, "context_binding"), || {
                self.context_binding.ok_or(SynthesisError::AssignmentMissing)
            })?;
        let _binding_sq = binding_var.square()?;

        // ===================================================================
        // 2. Private witness
        // ===================================================================

        let value_var = FpVar::<Fr>::new_witness(ark_relations::ns!(cs, "value"), || {
            self.value.ok_or(SynthesisError::AssignmentMissing)
        })?;

        // ===================================================================
        // 3. Range check: delta = value - threshold in [0, 2^RANGE_BITS)
        // ===================================================================

        let delta_var = &value_var - &threshold_var;
        let delta_bits = delta_to_bits(self.value, self.threshold);

        let mut reconstructed = FpVar::<Fr>::zero();
        let mut power_of_two = FpVar::<Fr>::one();
        let two = FpVar::<Fr>::constant(Fr::from(2u64));

        for i in 0..RANGE_BITS {
            let bit = Boolean::<Fr>::new_witness(ark_relations::ns!(cs, "delta_bit"), || {
                delta_bits
                    .as_ref()
                    .map(|bits| bits[i])
                    .ok_or(SynthesisError::AssignmentMissing)
            })?;

            reconstructed += FpVar::<Fr>::from(bit) * &power_of_two;
            power_of_two *= &two;
        }

        reconstructed.enforce_equal(&delta_var)?;

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Little-endian bits of `value - threshold`, truncated to `RANGE_BITS`.
/// `None` in key-generation mode.
fn delta_to_bits(value: Option<Fr>, threshold: Option<Fr>) -> Option<Vec<bool>> {
    let delta = value? - threshold?;

    let bigint = delta.into_bigint();
    let bits: Vec<bool> = bigint
        .0
        .iter()
        .flat_map(|limb| (0..64).map(move |i| (limb >> i) & 1 == 1))
        .take(RANGE_BITS)
        .collect();

    Some(bits)
}

/// The public input vector, in `generate_constraints` allocation order.
pub fn public_inputs(threshold: Fr, is_solvent: bool, context_binding: Fr) -> Vec<Fr> {
    let flag = if is_solvent { Fr::one() } else { Fr::zero() };
    vec![threshold, flag, context_binding]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
