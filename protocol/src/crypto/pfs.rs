//! # Ephemeral Key Agreement
//!
//! Every live binder call runs one of these: a fresh X25519 keypair, one
//! Diffie-Hellman with the MPC cluster's public key, one session key, and
//! then everything is thrown away. A compromised session key exposes exactly
//! one encrypted value.
//!
//! ## Key Derivation
//!
//! The raw DH output is never used as a key. It goes through BLAKE3's
//! `derive_key` mode together with both public keys (sorted, so both sides
//! land on the same bytes):
//!
//! ```text
//! session_key = BLAKE3-derive-key(
//!     "prism v1 mpc session key",
//!     shared_secret || min(pub_a, pub_b) || max(pub_a, pub_b))
//! ```

use rand::rngs::OsRng;
use thiserror::Error;
use x25519_dalek::{EphemeralSecret, PublicKey, SharedSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::config::AES_KEY_LENGTH;

const SESSION_KEY_CONTEXT: &str = "prism v1 mpc session key";

/// Errors in the ephemeral key exchange.
#[derive(Debug, Error)]
pub enum PfsError {
    #[error("key exchange failed: peer public key is a low-order point")]
    InvalidPublicKey,
}

/// One side of an ephemeral X25519 exchange.
///
/// [`PfsSession::complete`] consumes the session, and `EphemeralSecret`
/// cannot be cloned or serialized, so a session derives at most one key.
pub struct PfsSession {
    secret: EphemeralSecret,
    public_key: PublicKey,
}

/// A finished exchange. The session key is wiped when this is dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct CompletedPfsSession {
    session_key: [u8; AES_KEY_LENGTH],
}

impl PfsSession {
    /// Fresh ephemeral keypair from the OS CSPRNG.
    pub fn new() -> Self {
        let secret = EphemeralSecret::random_from_rng(OsRng);
        let public_key = PublicKey::from(&secret);
        Self { secret, public_key }
    }

    /// The public half, for sending to the peer.
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.public_key.to_bytes()
    }

    /// Consume the ephemeral secret and derive the session key.
    ///
    /// Fails if the peer handed us a low-order point (the DH output would be
    /// all zeros and carry no entropy at all).
    pub fn complete(self, peer_public_key_bytes: &[u8; 32]) -> Result<CompletedPfsSession, PfsError> {
        let peer = PublicKey::from(*peer_public_key_bytes);
        let raw: SharedSecret = self.secret.diffie_hellman(&peer);
        if !raw.was_contributory() {
            return Err(PfsError::InvalidPublicKey);
        }

        let our_public_key = self.public_key.to_bytes();
        Ok(CompletedPfsSession {
            session_key: derive_session_key(raw.as_bytes(), &our_public_key, peer_public_key_bytes),
        })
    }
}

impl Default for PfsSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletedPfsSession {
    /// The derived AES-256 key.
    pub fn session_key(&self) -> &[u8; AES_KEY_LENGTH] {
        &self.session_key
    }
}

/// Derive a session key from the DH output and both public keys.
///
/// Public keys are fed in canonical order so the client (ephemeral secret)
/// and the cluster (static secret) compute identical keys.
pub(crate) fn derive_session_key(
    shared_secret: &[u8; 32],
    our_public: &[u8; 32],
    peer_public: &[u8; 32],
) -> [u8; AES_KEY_LENGTH] {
    let mut hasher = blake3::Hasher::new_derive_key(SESSION_KEY_CONTEXT);
    hasher.update(shared_secret);

    let (first, second) = if our_public <= peer_public {
        (our_public, peer_public)
    } else {
        (peer_public, our_public)
    };
    hasher.update(first);
    hasher.update(second);

    let mut session_key = [0u8; AES_KEY_LENGTH];
    hasher.finalize_xof().fill(&mut session_key);
    session_key
}
