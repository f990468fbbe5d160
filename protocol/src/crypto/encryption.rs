//! # AES-256-GCM Encryption
//!
//! Authenticated encryption for the live binder. The binder owns the nonce
//! (it doubles as the commitment nonce and is published alongside the
//! ciphertext), so unlike a general-purpose `encrypt()` this module takes
//! the nonce as an argument instead of drawing one itself.
//!
//! ## Nonce management
//!
//! GCM falls apart under nonce reuse with the same key. Here every key is a
//! fresh per-call session key from an ephemeral X25519 exchange, and every
//! nonce is 96 random bits from the OS. Reuse would need both to collide.
//!
//! ## AAD
//!
//! The binding key (context address) goes in as additional authenticated
//! data. Lifting a ciphertext onto a different context breaks the tag.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use thiserror::Error;

use crate::config::{AES_KEY_LENGTH, AES_NONCE_LENGTH};

/// Errors that can occur during encryption/decryption.
///
/// Kept vague on purpose: "wrong key" versus "corrupted ciphertext" is
/// nobody's business.
#[derive(Debug, Error)]
pub enum EncryptionError {
    #[error("encryption failed")]
    EncryptFailed,

    #[error("decryption failed -- wrong key or corrupted ciphertext")]
    DecryptFailed,

    #[error("invalid key length: expected {AES_KEY_LENGTH} bytes")]
    InvalidKeyLength,
}

/// Draw a fresh 96-bit nonce from the OS CSPRNG.
pub fn random_nonce() -> [u8; AES_NONCE_LENGTH] {
    let mut nonce = [0u8; AES_NONCE_LENGTH];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Encrypt `plaintext` under `key` with an explicit nonce and AAD.
///
/// Returns the ciphertext with the 16-byte GCM tag appended.
pub fn encrypt_with_nonce(
    key: &[u8; AES_KEY_LENGTH],
    nonce: &[u8; AES_NONCE_LENGTH],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, EncryptionError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EncryptionError::InvalidKeyLength)?;
    let payload = Payload {
        msg: plaintext,
        aad,
    };
    cipher
        .encrypt(Nonce::from_slice(nonce), payload)
        .map_err(|_| EncryptionError::EncryptFailed)
}

/// Decrypt ciphertext produced by [`encrypt_with_nonce`]. Nonce and AAD must
/// match, or authentication fails.
pub fn decrypt_with_nonce(
    key: &[u8; AES_KEY_LENGTH],
    nonce: &[u8; AES_NONCE_LENGTH],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, EncryptionError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EncryptionError::InvalidKeyLength)?;
    let payload = Payload {
        msg: ciphertext,
        aad,
    };
    cipher
        .decrypt(Nonce::from_slice(nonce), payload)
        .map_err(|_| EncryptionError::DecryptFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AES_TAG_LENGTH;

    fn test_key() -> [u8; 32] {
        let mut key = [0u8; 32];
        for (i, byte) in key.iter_mut().enumerate() {
            *byte = i as u8;
        }
        key
    }

    #[test]
    fn test_roundtrip_with_aad() {
        let key = test_key();
        let nonce = random_nonce();
        let sealed = encrypt_with_nonce(&key, &nonce, b"500000000000", b"ctx-addr").unwrap();
        let opened = decrypt_with_nonce(&key, &nonce, &sealed, b"ctx-addr").unwrap();
        assert_eq!(opened, b"500000000000");
    }

    #[test]
    fn test_ciphertext_length() {
        let key = test_key();
        let nonce = random_nonce();
        let plaintext = [7u8; 32];
        let sealed = encrypt_with_nonce(&key, &nonce, &plaintext, b"").unwrap();
        assert_eq!(sealed.len(), plaintext.len() + AES_TAG_LENGTH);
    }

    #[test]
    fn test_wrong_aad_fails() {
        let key = test_key();
        let nonce = random_nonce();
        let sealed = encrypt_with_nonce(&key, &nonce, b"secret", b"context-a").unwrap();
        assert!(decrypt_with_nonce(&key, &nonce, &sealed, b"context-b").is_err());
    }

    #[test]
    fn test_wrong_key_fails() {
        let key = test_key();
        let nonce = random_nonce();
        let sealed = encrypt_with_nonce(&key, &nonce, b"secret", b"").unwrap();

        let mut wrong = test_key();
        wrong[0] ^= 0xFF;
        assert!(decrypt_with_nonce(&wrong, &nonce, &sealed, b"").is_err());
    }

    #[test]
    fn test_modified_ciphertext_fails() {
        let key = test_key();
        let nonce = random_nonce();
        let mut sealed = encrypt_with_nonce(&key, &nonce, b"secret", b"").unwrap();
        sealed[0] ^= 0x01;
        assert!(decrypt_with_nonce(&key, &nonce, &sealed, b"").is_err());
    }

    #[test]
    fn test_unique_nonces() {
        assert_ne!(random_nonce(), random_nonce());
    }
}
