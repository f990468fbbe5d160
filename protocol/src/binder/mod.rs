//! # Commitment Binder
//!
//! Encrypts a secret for a specific context and publishes a hash commitment
//! to it. See [`engine`] for the flow, [`commitment`] for the hash and
//! [`mpc`] for the cluster interface.

pub mod commitment;
pub mod engine;
pub mod mpc;

pub use commitment::{
    compute_commitment, open_commitment, open_data_commitment, verify_commitment_format,
    BinderMode, Commitment,
};
pub use engine::CommitmentBinder;
pub use mpc::{LocalMpcCluster, MpcEncryptionService, MpcError};
