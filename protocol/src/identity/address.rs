//! # Derived Addresses
//!
//! Root and context identities live at program-derived addresses: SHA-256
//! over a list of seeds, the program id and a fixed marker, with a one-byte
//! bump walked down from 255 until the digest is *not* a valid Ed25519
//! point. Off-curve means no private key exists for the address, so only
//! the program can ever sign for it.
//!
//! ```text
//! root    = PDA(["root",    owner],                  program_id)
//! context = PDA(["context", root, u16_le(index)],    program_id)
//! PDA(seeds, p) = first SHA-256(seeds || [bump] || p || "ProgramDerivedAddress")
//!                 that is off-curve, bump = 255, 254, ...
//! ```
//!
//! Everything here is pure and network-free: same inputs, same address,
//! on every machine, forever.

use curve25519_dalek::edwards::CompressedEdwardsY;
use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::{
    ADDRESS_LENGTH, CONTEXT_SEED, MAX_CONTEXT_INDEX, PDA_MARKER, PROGRAM_ID, ROOT_SEED,
};
use crate::crypto::hash::sha256_multi;
use crate::error::{PrismError, PrismResult};

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A 32-byte ledger address, base58 on the outside.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    pub const fn from_bytes(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// Base58 string form.
    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }

    /// Parse a base58 address. Length is checked; curve membership is not
    /// (derived addresses are deliberately off-curve).
    pub fn from_base58(s: &str) -> PrismResult<Self> {
        let bytes = bs58::decode(s.trim())
            .into_vec()
            .map_err(|e| PrismError::InvalidKey(format!("not base58: {e}")))?;
        let bytes: [u8; ADDRESS_LENGTH] = bytes.as_slice().try_into().map_err(|_| {
            PrismError::InvalidKey(format!(
                "expected {ADDRESS_LENGTH} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    /// Whether these bytes decompress to an Ed25519 curve point.
    pub fn is_on_curve(&self) -> bool {
        CompressedEdwardsY(self.0).decompress().is_some()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_base58())
    }
}

impl FromStr for Address {
    type Err = PrismError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_base58(s)
    }
}

impl Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_base58())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            Address::from_base58(&s).map_err(serde::de::Error::custom)
        } else {
            let bytes = <Vec<u8>>::deserialize(deserializer)?;
            let bytes: [u8; ADDRESS_LENGTH] = bytes.as_slice().try_into().map_err(|_| {
                serde::de::Error::custom(format!("expected 32-byte address, got {}", bytes.len()))
            })?;
            Ok(Address(bytes))
        }
    }
}

/// The fixed program id all identities are derived under.
pub fn program_id() -> Address {
    Address::from_base58(PROGRAM_ID).expect("static program id is valid base58")
}

/// Parse and validate an owner key: base58, 32 bytes, and a real Ed25519
/// public key. Owners sign transactions, so an off-curve owner is nonsense.
pub fn parse_owner(s: &str) -> PrismResult<Address> {
    let address = Address::from_base58(s)?;
    validate_owner(&address)?;
    Ok(address)
}

fn validate_owner(owner: &Address) -> PrismResult<()> {
    VerifyingKey::from_bytes(owner.as_bytes())
        .map(|_| ())
        .map_err(|_| PrismError::InvalidKey(format!("{owner} is not a valid Ed25519 public key")))
}

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// A derived address together with the bump that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedAddress {
    pub address: Address,
    pub bump: u8,
}

/// Walk bumps from 255 down to 0 and return the first off-curve digest.
fn find_program_address(seeds: &[&[u8]], program: &Address) -> PrismResult<DerivedAddress> {
    for bump in (0..=u8::MAX).rev() {
        let bump_seed = [bump];
        let mut parts: Vec<&[u8]> = Vec::with_capacity(seeds.len() + 3);
        parts.extend_from_slice(seeds);
        parts.push(&bump_seed);
        parts.push(program.as_bytes());
        parts.push(PDA_MARKER);

        let candidate = Address(sha256_multi(&parts));
        if !candidate.is_on_curve() {
            return Ok(DerivedAddress {
                address: candidate,
                bump,
            });
        }
    }
    // Each bump has roughly even odds; 256 straight misses does not happen.
    Err(PrismError::InvalidKey("no viable bump seed for address".into()))
}

/// Address of `owner`'s root identity.
///
/// Fails `InvalidKey` when `owner` is not a valid Ed25519 public key.
pub fn derive_root_address(owner: &Address) -> PrismResult<DerivedAddress> {
    validate_owner(owner)?;
    find_program_address(&[ROOT_SEED, owner.as_bytes()], &program_id())
}

/// Address of the context at `index` under `root`.
///
/// Fails `IndexOutOfRange` above `u16::MAX`.
pub fn derive_context_address(root: &Address, index: u64) -> PrismResult<DerivedAddress> {
    if index > u64::from(MAX_CONTEXT_INDEX) {
        return Err(PrismError::IndexOutOfRange {
            index,
            max: u64::from(MAX_CONTEXT_INDEX),
        });
    }
    let index_le = (index as u16).to_le_bytes();
    find_program_address(&[CONTEXT_SEED, root.as_bytes(), &index_le], &program_id())
}
