//! # Commitments
//!
//! A commitment pairs an opaque ciphertext with a public hash anyone can
//! check once the secret is revealed:
//!
//! ```text
//! commitment = hex(SHA-256(secret_le32 || binding_key || nonce))
//! ```
//!
//! The binding key (normally a context address) pins the commitment to one
//! context. The 96-bit nonce makes two commitments to the same secret
//! unlinkable. Everything needed to recompute the hash except the secret is
//! published in the [`Commitment`] itself.

use chrono::{DateTime, Utc};
use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::amount::to_le_bytes;
use crate::config::{
    AES_NONCE_LENGTH, AES_TAG_LENGTH, COMMITMENT_HEX_LENGTH, MAX_FIELD_PAYLOAD_BYTES,
    SECRET_ENCODING_LENGTH,
};
use crate::crypto::hash::{blake3_hash, sha256_multi};
use crate::identity::Address;

/// How a binder produced its ciphertexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinderMode {
    /// Per-call key agreement with the MPC cluster, AES-256-GCM.
    Live,
    /// Local keystream. Not hiding; for tests and offline use.
    Simulated,
}

/// The output of one binder call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    /// Encrypted payload. Opaque to everyone but the MPC cluster.
    #[serde(with = "crate::encoding::hex_bytes")]
    pub ciphertext: Vec<u8>,
    /// Lowercase hex SHA-256, see the module docs.
    pub commitment: String,
    /// What the commitment is bound to.
    pub binding_key: Address,
    /// Commitment nonce, also the cipher nonce in live mode.
    #[serde(with = "crate::encoding::hex_bytes")]
    pub nonce: [u8; AES_NONCE_LENGTH],
    pub timestamp: DateTime<Utc>,
    pub mode: BinderMode,
    /// The payload was wider than a field element and was hashed first.
    pub payload_digested: bool,
    /// Client ephemeral X25519 key (live only), so the cluster can derive the
    /// session key.
    #[serde(default, with = "crate::encoding::hex_bytes_opt")]
    pub ephemeral_public_key: Option<[u8; 32]>,
    /// MPC cluster that can decrypt (live only).
    pub backend_id: Option<String>,
}

/// Hash the commitment inputs.
pub fn compute_commitment(
    payload: &[u8],
    binding_key: &Address,
    nonce: &[u8; AES_NONCE_LENGTH],
) -> String {
    hex::encode(sha256_multi(&[payload, binding_key.as_bytes(), nonce]))
}

/// Payloads wider than one field element are replaced by a truncated BLAKE3
/// digest. Returns the bytes to commit to and whether digesting happened.
pub(crate) fn prepare_payload(data: &[u8]) -> (Vec<u8>, bool) {
    if data.len() > MAX_FIELD_PAYLOAD_BYTES {
        (blake3_hash(data)[..MAX_FIELD_PAYLOAD_BYTES].to_vec(), true)
    } else {
        (data.to_vec(), false)
    }
}

/// Structural check only: says nothing about what was committed.
pub fn verify_commitment_format(c: &Commitment) -> bool {
    let hash_ok = c.commitment.len() == COMMITMENT_HEX_LENGTH
        && c
            .commitment
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));

    // The widest payload is a 32-byte secret encoding.
    let shape_ok = match c.mode {
        BinderMode::Live => {
            c.ephemeral_public_key.is_some()
                && c.ciphertext.len() >= AES_TAG_LENGTH
                && c.ciphertext.len() <= SECRET_ENCODING_LENGTH + AES_TAG_LENGTH
        }
        BinderMode::Simulated => {
            c.ephemeral_public_key.is_none() && c.ciphertext.len() <= SECRET_ENCODING_LENGTH
        }
    };

    hash_ok && shape_ok
}

/// Producer-side check that `c` commits to `secret`.
pub fn open_commitment(c: &Commitment, secret: &U256) -> bool {
    compute_commitment(&to_le_bytes(secret), &c.binding_key, &c.nonce) == c.commitment
}

/// Producer-side check that `c` commits to `data`, applying the same
/// digest rule as the binder.
pub fn open_data_commitment(c: &Commitment, data: &[u8]) -> bool {
    let (payload, digested) = prepare_payload(data);
    digested == c.payload_digested
        && compute_commitment(&payload, &c.binding_key, &c.nonce) == c.commitment
}
