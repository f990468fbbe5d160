//! # Zero-Knowledge Solvency Proofs
//!
//! Proves that a private value meets a public threshold using Groth16 over
//! BN254. The proof is bound to a context address and carries an explicit
//! `is_solvent` claim that the verifier checks as a public input.
//!
//! ## Architecture
//!
//! ```text
//! circuit.rs   R1CS relation (SolvencyCircuit)
//! backend.rs   ProvingBackend trait + Groth16Backend
//! prover.rs    SolvencyProver state machine, SolvencyProof
//! ```
//!
//! ## Security Model
//!
//! - **Soundness**: Groth16 knowledge-soundness in the generic group model.
//! - **Range check**: bit-decomposition to 248 bits with boolean enforcement
//!   on every bit; no wrap-around below the ~254-bit field modulus.
//! - **Binding**: threshold, claim and context are all public inputs, so
//!   altering any of them after the fact breaks verification.
//!
//! The trusted setup is per-circuit and local. Replace it with ceremony
//! keys before anything real depends on it.

pub mod backend;
pub mod circuit;
pub mod prover;

pub use backend::{BackendError, Groth16Backend, PrivateInputs, ProvingBackend, PublicInputs};
pub use circuit::SolvencyCircuit;
pub use prover::{ProverMode, ProverState, SolvencyProof, SolvencyProver};

/// Bits in the range decomposition. Matches the amount width cap.
pub const RANGE_BITS: usize = crate::config::MAX_VALUE_BITS;
