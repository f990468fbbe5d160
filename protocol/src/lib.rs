// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # PRISM Core Library
//!
//! PRISM gives an account on a public ledger a way to act through
//! disposable, spending-limited sub-identities ("contexts") hanging off one
//! durable root identity, and to prove "my balance is at least X" to a third
//! party without saying what the balance is, with that proof tied to one
//! specific context.
//!
//! ## Architecture
//!
//! - **identity**: Deterministic address derivation and the root/context
//!   lifecycle. Pure functions first, ledger calls second.
//! - **ledger**: The persistence port, plus an in-memory ledger that
//!   enforces the same rules as the on-chain program.
//! - **binder**: Commits a secret to a context and encrypts it for an MPC
//!   cluster (or simulates doing so when there is none).
//! - **zkp**: Groth16 solvency proofs over BN254.
//! - **access**: The one-call flows that tie the above together.
//! - **crypto**: Hashes, AES-256-GCM, ephemeral X25519 sessions.
//! - **amount**: 256-bit unsigned amounts. No floats, ever.
//! - **config**: Protocol constants and runtime configuration.
//!
//! ## Design Philosophy
//!
//! 1. Anything that can be rejected locally is rejected before a network
//!    call.
//! 2. A confirmed rejection and an unknown outcome are different errors.
//!    Only one of them is safe to retry blindly, and it is not the second.
//! 3. Missing backends downgrade to simulation, loudly, and the mode is
//!    always queryable.
//! 4. Secrets do not appear in logs or error messages.

pub mod access;
pub mod amount;
pub mod binder;
pub mod config;
pub mod crypto;
pub mod encoding;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod zkp;

pub use access::{AccessStatus, EncryptedAccess, EncryptedSolvencyProof, QuickAccess};
pub use config::PrismConfig;
pub use error::{PrismError, PrismResult, RejectReason};
