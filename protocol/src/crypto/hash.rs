//! # Hashing Utilities
//!
//! Two hash functions, each with a job:
//!
//! - **SHA-256**: anything a third party has to recompute: derived
//!   addresses (the ledger runtime fixes this choice) and commitment digests
//!   (relying parties check them with whatever stdlib they have lying around).
//!
//! - **BLAKE3**: everything internal: key derivation, keystreams for the
//!   simulated binder, payload digests, and mapping context addresses into
//!   the BN254 scalar field.

use ark_bn254::Fr;
use ark_ff::PrimeField;
use sha2::{Digest, Sha256};

/// SHA-256 over several slices without concatenating them first.
pub fn sha256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let mut output = [0u8; 32];
    output.copy_from_slice(&hasher.finalize());
    output
}

/// SHA-256 of a single buffer.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    sha256_multi(&[data])
}

/// BLAKE3 of a single buffer.
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Fill `out` with BLAKE3 extendable output keyed by a context string.
///
/// Used as a keystream generator. Different contexts never collide because
/// `derive_key` mode swaps the internal IV per context.
pub fn blake3_xof(context: &str, seed: &[u8], out: &mut [u8]) {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    hasher.update(seed);
    hasher.finalize_xof().fill(out);
}

/// Hash arbitrary data to a BN254 scalar field element.
///
/// BLAKE3, then little-endian reduce mod `r`. The bias from reducing 256
/// bits into a ~254-bit field is negligible for our use (binding a context
/// address into a proof, not sampling secrets).
pub fn hash_to_field(data: &[u8]) -> Fr {
    Fr::from_le_bytes_mod_order(&blake3_hash(data))
}

/// Domain-separated BLAKE3. `domain_separated_hash("a", x)` and
/// `domain_separated_hash("b", x)` never collide.
pub fn domain_separated_hash(context: &str, data: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    hasher.update(data);
    *hasher.finalize().as_bytes()
}
