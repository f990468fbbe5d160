//! # MPC Encryption Service
//!
//! The binder's live mode hands values to a multi-party computation cluster.
//! The protocol with the cluster is small:
//!
//! 1. **Key agreement.** The client sends a fresh ephemeral X25519 public key
//!    and gets the cluster's public key back. Both sides derive the same
//!    session key (see [`crate::crypto::pfs`]).
//! 2. **Encryption.** The payload is sealed under the session key with the
//!    commitment nonce, binding key as AAD. The default implementation does
//!    this client-side with AES-256-GCM, which is what the cluster expects.
//!
//! [`LocalMpcCluster`] is an in-process cluster with a static key. It can
//! decrypt what the binder produces, which is what tests need to check that
//! live mode really encrypts the right thing.

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::OsRng;
use thiserror::Error;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use super::commitment::{BinderMode, Commitment};
use crate::config::AES_NONCE_LENGTH;
use crate::crypto::encryption::{decrypt_with_nonce, encrypt_with_nonce, EncryptionError};
use crate::crypto::pfs::{derive_session_key, CompletedPfsSession};
use crate::error::{PrismError, RejectReason};

/// Errors from an MPC encryption service.
#[derive(Debug, Error)]
pub enum MpcError {
    /// The cluster is not reachable right now.
    #[error("mpc cluster unreachable: {0}")]
    Unreachable(String),

    /// The request named a cluster this service does not front.
    #[error("unknown mpc cluster {0}")]
    UnknownCluster(String),

    #[error(transparent)]
    Cipher(#[from] EncryptionError),
}

impl From<MpcError> for PrismError {
    fn from(err: MpcError) -> Self {
        match err {
            MpcError::Unreachable(msg) => PrismError::CapabilityUnavailable(msg),
            MpcError::UnknownCluster(id) => {
                PrismError::Rejected(RejectReason::Other(format!("unknown mpc cluster {id}")))
            }
            MpcError::Cipher(e) => PrismError::Encryption(e),
        }
    }
}

/// An MPC cluster that accepts encrypted inputs.
#[async_trait]
pub trait MpcEncryptionService: Send + Sync {
    /// Check that the cluster at `service_address` is reachable. Services
    /// without a cheaper check report healthy and let the key agreement fail.
    async fn ping(&self, _service_address: &str) -> Result<(), MpcError> {
        Ok(())
    }

    /// Exchange public keys with the cluster at `service_address`. Returns
    /// the cluster's X25519 public key.
    async fn key_agreement(
        &self,
        service_address: &str,
        client_public: &[u8; 32],
    ) -> Result<[u8; 32], MpcError>;

    /// Seal `plaintext` under the agreed session key.
    async fn encrypt(
        &self,
        session: &CompletedPfsSession,
        plaintext: &[u8],
        nonce: &[u8; AES_NONCE_LENGTH],
        aad: &[u8],
    ) -> Result<Vec<u8>, MpcError> {
        Ok(encrypt_with_nonce(session.session_key(), nonce, plaintext, aad)?)
    }
}

// ---------------------------------------------------------------------------
// LocalMpcCluster
// ---------------------------------------------------------------------------

/// In-process cluster holding a static X25519 key.
pub struct LocalMpcCluster {
    address: String,
    secret: StaticSecret,
    public: PublicKey,
    available: Mutex<bool>,
}

impl LocalMpcCluster {
    pub fn new(address: impl Into<String>) -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self {
            address: address.into(),
            secret,
            public,
            available: Mutex::new(true),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.public.to_bytes()
    }

    /// Take the cluster offline (or back online).
    pub fn set_available(&self, available: bool) {
        *self.available.lock() = available;
    }

    /// Recover the plaintext of a live commitment made against this cluster.
    pub fn decrypt(&self, commitment: &Commitment) -> Result<Vec<u8>, MpcError> {
        if commitment.mode != BinderMode::Live {
            return Err(MpcError::Cipher(EncryptionError::DecryptFailed));
        }
        let client_public = commitment
            .ephemeral_public_key
            .ok_or(MpcError::Cipher(EncryptionError::DecryptFailed))?;

        let shared = self.secret.diffie_hellman(&PublicKey::from(client_public));
        let key = Zeroizing::new(derive_session_key(
            shared.as_bytes(),
            &self.public.to_bytes(),
            &client_public,
        ));
        Ok(decrypt_with_nonce(
            &key,
            &commitment.nonce,
            &commitment.ciphertext,
            commitment.binding_key.as_bytes(),
        )?)
    }

    fn check_reachable(&self, service_address: &str) -> Result<(), MpcError> {
        if !*self.available.lock() {
            return Err(MpcError::Unreachable(self.address.clone()));
        }
        if service_address != self.address {
            return Err(MpcError::UnknownCluster(service_address.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl MpcEncryptionService for LocalMpcCluster {
    async fn ping(&self, service_address: &str) -> Result<(), MpcError> {
        self.check_reachable(service_address)
    }

    async fn key_agreement(
        &self,
        service_address: &str,
        _client_public: &[u8; 32],
    ) -> Result<[u8; 32], MpcError> {
        self.check_reachable(service_address)?;
        Ok(self.public.to_bytes())
    }
}
