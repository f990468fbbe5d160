//! # Cryptographic Primitives for PRISM
//!
//! Thin, type-safe wrappers around audited implementations:
//!
//! - **SHA-256** for derived addresses and commitment digests.
//! - **BLAKE3** for key derivation, keystreams and hash-to-field.
//! - **X25519** for the per-call key agreement with the MPC cluster.
//! - **AES-256-GCM** for the live binder cipher.
//!
//! Nothing in here is clever, and it should stay that way.

pub mod encryption;
pub mod hash;
pub mod pfs;

pub use encryption::{decrypt_with_nonce, encrypt_with_nonce, random_nonce};
pub use hash::{blake3_hash, hash_to_field, sha256, sha256_multi};
pub use pfs::{CompletedPfsSession, PfsSession};
