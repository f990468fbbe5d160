//! # Protocol Configuration & Constants
//!
//! Every magic number in PRISM lives here, next to the runtime
//! configuration that decides which external services the core talks to.
//!
//! The derivation constants (program id, seeds) define every address the
//! system has ever handed out. Changing them orphans every root and context
//! identity on the ledger, so treat them as frozen.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PrismError;
use crate::identity::PrivacyLevel;

// ---------------------------------------------------------------------------
// Address Derivation
// ---------------------------------------------------------------------------

/// The ledger program that owns root and context identity records.
/// Base58, 32 bytes. All derived addresses are scoped to this id.
pub const PROGRAM_ID: &str = "DkD3vtS6K8dJFnGmm9X9CphNDU5LYTYyP8Ve5EEVENdu";

/// Seed prefix for root identity addresses: `["root", owner]`.
pub const ROOT_SEED: &[u8] = b"root";

/// Seed prefix for context identity addresses: `["context", root, index_le]`.
pub const CONTEXT_SEED: &[u8] = b"context";

/// Domain marker appended to every derived-address preimage. Fixed by the
/// ledger runtime, not by us.
pub const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

/// Address length in bytes. Owners and derived addresses share it.
pub const ADDRESS_LENGTH: usize = 32;

/// Largest context index a root can address. Indices are encoded as
/// little-endian `u16` in the context seed.
pub const MAX_CONTEXT_INDEX: u32 = u16::MAX as u32;

/// Ceiling on a root's `context_count`. The ledger keeps the counter in a
/// `u16` and increments it after each creation, so the last index it will
/// ever hand out is `MAX_CONTEXT_COUNT - 1`.
pub const MAX_CONTEXT_COUNT: u32 = u16::MAX as u32;

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// AES-256-GCM key length in bytes.
pub const AES_KEY_LENGTH: usize = 32;

/// AES-256-GCM nonce length in bytes. Twelve. Also the commitment nonce.
pub const AES_NONCE_LENGTH: usize = 12;

/// AES-256-GCM authentication tag length in bytes.
pub const AES_TAG_LENGTH: usize = 16;

/// Hash output length in bytes (SHA-256 and BLAKE3 alike).
pub const HASH_OUTPUT_LENGTH: usize = 32;

/// Hex length of a commitment digest.
pub const COMMITMENT_HEX_LENGTH: usize = HASH_OUTPUT_LENGTH * 2;

/// Width of the fixed little-endian encoding of a secret before hashing
/// and encryption.
pub const SECRET_ENCODING_LENGTH: usize = 32;

/// Largest payload (in bytes) the MPC backend accepts as a single field
/// element. Anything longer is digested first.
pub const MAX_FIELD_PAYLOAD_BYTES: usize = 31;

/// Maximum bit width of any amount that enters a circuit or the MPC
/// backend. BN254's scalar field is ~2^253.6; capping at 248 bits keeps the
/// bit decomposition of `value - threshold` unique with room to spare, so a
/// negative difference can never masquerade as a small positive one.
pub const MAX_VALUE_BITS: usize = 248;

/// ZKP curve: BN254. Groth16 support in arkworks is mature and the verifier
/// is cheap enough to run anywhere.
pub const ZKP_CURVE: &str = "BN254";

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Spending ceiling (base units) for contexts opened by quick access.
/// 1 SOL-equivalent: enough for one trade, small enough to not matter if lost.
pub const DEFAULT_QUICK_ACCESS_CEILING: u64 = 1_000_000_000;

// ---------------------------------------------------------------------------
// Runtime Configuration
// ---------------------------------------------------------------------------

/// Whether a component may fall back to its local simulation when the real
/// backend is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationPolicy {
    /// Downgrade silently. Fine for tests and offline demos.
    #[default]
    Allow,
    /// Refuse to initialize without the live backend.
    Deny,
}

/// Coordinates of the MPC encryption service. The binder runs live only when
/// both are present and the cluster answers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinderConfig {
    /// Address of the MPC cluster the key agreement is performed against.
    pub mpc_cluster: Option<String>,
    /// Address of the program that consumes the encrypted payloads.
    pub mpc_program: Option<String>,
    /// What to do when the cluster is missing or unreachable.
    pub simulation: SimulationPolicy,
}

impl BinderConfig {
    /// Both coordinates present and non-empty.
    pub fn has_live_coordinates(&self) -> bool {
        let present = |c: &Option<String>| c.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.mpc_cluster) && present(&self.mpc_program)
    }
}

/// Prover settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProverConfig {
    /// What to do when no proving backend is available.
    pub simulation: SimulationPolicy,
}

/// Identity defaults used by the orchestrator's one-call flows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Privacy level for roots created implicitly by quick access.
    pub default_privacy: PrivacyLevel,
    /// Spending ceiling for quick-access contexts.
    pub quick_access_ceiling: u64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            default_privacy: PrivacyLevel::High,
            quick_access_ceiling: DEFAULT_QUICK_ACCESS_CEILING,
        }
    }
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrismConfig {
    pub binder: BinderConfig,
    pub prover: ProverConfig,
    pub identity: IdentityConfig,
}

impl PrismConfig {
    /// Load a JSON configuration file. Missing sections fall back to defaults.
    pub fn load(path: &Path) -> Result<Self, PrismError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PrismError::InvalidInput(format!("cannot read config {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    /// Parse a JSON configuration document.
    pub fn from_json(raw: &str) -> Result<Self, PrismError> {
        serde_json::from_str(raw)
            .map_err(|e| PrismError::InvalidInput(format!("malformed config: {e}")))
    }
}
