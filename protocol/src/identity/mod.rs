//! # Identity
//!
//! One root identity per owner key, and up to 65,536 context identities
//! under it. Each context is a separate address with its own spending
//! ceiling, and can be revoked without touching the root or its siblings.
//!
//! ```text
//! owner (Ed25519 key)
//!   └── root      PDA("root", owner)
//!         ├── context #0   PDA("context", root, 0)   DeFi,   1 SOL / tx
//!         ├── context #1   PDA("context", root, 1)   Social, 0.1 SOL / tx
//!         └── ...
//! ```
//!
//! - [`address`]: pure address derivation and owner-key validation.
//! - [`types`]: the records and outcome types.
//! - [`manager`]: lifecycle operations against a ledger.

pub mod address;
pub mod manager;
pub mod types;

pub use address::{
    derive_context_address, derive_root_address, parse_owner, program_id, Address,
    DerivedAddress,
};
pub use manager::IdentityManager;
pub use types::{
    ContextIdentity, ContextType, Outcome, PrivacyLevel, Revocation, RootIdentity,
};
