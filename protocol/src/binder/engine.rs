//! # Commitment Binder
//!
//! Encrypts a value for one context and returns a [`Commitment`].
//!
//! The mode is fixed by the first [`CommitmentBinder::initialize`]: live when
//! both MPC coordinates are configured, a service was supplied *and* the
//! cluster answers a ping. Anything short of that is a downgrade to
//! simulation, logged once, unless the configured [`SimulationPolicy`] is
//! `Deny`; then initialization fails and a later call retries.
//!
//! A live binder whose cluster drops out later follows the same policy per
//! call: under `Allow` that one commitment is simulated and says so in its
//! `mode`, under `Deny` the call fails `CapabilityUnavailable`.
//!
//! ## Per-call flow (live)
//!
//! ```text
//! nonce      <- OsRng (12 bytes)
//! commitment  = SHA-256(payload || binding_key || nonce)
//! session     = PfsSession::new()                    fresh X25519 key
//! cluster_pk  = service.key_agreement(cluster, session.pk)
//! key         = session.complete(cluster_pk)          zeroized on drop
//! ciphertext  = AES-256-GCM(key, nonce, payload, aad = binding_key)
//! ```
//!
//! Nothing survives the call except the commitment.

use chrono::Utc;
use primitive_types::U256;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::commitment::{compute_commitment, prepare_payload, BinderMode, Commitment};
use super::mpc::MpcEncryptionService;
use crate::amount::{ensure_fits_field, to_le_bytes};
use crate::config::{BinderConfig, SimulationPolicy, AES_NONCE_LENGTH};
use crate::crypto::encryption::random_nonce;
use crate::crypto::hash::blake3_xof;
use crate::crypto::pfs::PfsSession;
use crate::error::{PrismError, PrismResult};
use crate::identity::Address;

const SIMULATED_KEYSTREAM_CONTEXT: &str = "prism v1 simulated binder keystream";

/// Binds secrets to contexts.
pub struct CommitmentBinder {
    config: BinderConfig,
    service: Option<Arc<dyn MpcEncryptionService>>,
    mode: OnceCell<BinderMode>,
}

impl CommitmentBinder {
    pub fn new(config: BinderConfig, service: Option<Arc<dyn MpcEncryptionService>>) -> Self {
        Self {
            config,
            service,
            mode: OnceCell::new(),
        }
    }

    /// A binder that always simulates.
    pub fn simulated() -> Self {
        Self::new(BinderConfig::default(), None)
    }

    /// Resolve the mode, once. Concurrent callers wait for the same result.
    ///
    /// Fails `CapabilityUnavailable` only when simulation is denied and the
    /// cluster is missing or unreachable.
    pub async fn initialize(&self) -> PrismResult<BinderMode> {
        self.mode
            .get_or_try_init(|| self.resolve_mode())
            .await
            .copied()
    }

    /// Resolved mode, `None` until initialized.
    pub fn mode(&self) -> Option<BinderMode> {
        self.mode.get().copied()
    }

    async fn resolve_mode(&self) -> PrismResult<BinderMode> {
        let Some((service, cluster)) = self.live_target() else {
            return self.downgrade(format!(
                "mpc cluster not configured (coordinates: {}, service: {})",
                self.config.has_live_coordinates(),
                self.service.is_some()
            ));
        };

        match service.ping(cluster).await {
            Ok(()) => {
                info!(cluster, "commitment binder running live");
                Ok(BinderMode::Live)
            }
            Err(e) => self.downgrade(format!("mpc cluster {cluster} not reachable: {e}")),
        }
    }

    fn live_target(&self) -> Option<(&Arc<dyn MpcEncryptionService>, &str)> {
        if !self.config.has_live_coordinates() {
            return None;
        }
        match (&self.service, self.config.mpc_cluster.as_deref()) {
            (Some(service), Some(cluster)) => Some((service, cluster)),
            _ => None,
        }
    }

    fn downgrade(&self, reason: String) -> PrismResult<BinderMode> {
        match self.config.simulation {
            SimulationPolicy::Allow => {
                warn!(%reason, "commitment binder running simulated");
                Ok(BinderMode::Simulated)
            }
            SimulationPolicy::Deny => Err(PrismError::CapabilityUnavailable(reason)),
        }
    }

    /// Commit to a numeric secret.
    ///
    /// The secret is encoded as 32 little-endian bytes and must fit the
    /// backend field.
    pub async fn encrypt(&self, secret: &U256, binding_key: &Address) -> PrismResult<Commitment> {
        ensure_fits_field(secret)?;
        self.seal(&to_le_bytes(secret), binding_key, false).await
    }

    /// Commit to arbitrary bytes. Payloads wider than one field element are
    /// digested first; the commitment says so.
    pub async fn encrypt_data(&self, data: &[u8], binding_key: &Address) -> PrismResult<Commitment> {
        let (payload, digested) = prepare_payload(data);
        self.seal(&payload, binding_key, digested).await
    }

    async fn seal(
        &self,
        payload: &[u8],
        binding_key: &Address,
        payload_digested: bool,
    ) -> PrismResult<Commitment> {
        let resolved = self.initialize().await?;
        let nonce = random_nonce();
        let commitment = compute_commitment(payload, binding_key, &nonce);

        let (ciphertext, ephemeral_public_key, backend_id, mode) = match resolved {
            BinderMode::Live => match self.seal_live(payload, binding_key, &nonce).await {
                Ok((ciphertext, client_public, cluster)) => {
                    (ciphertext, Some(client_public), Some(cluster), BinderMode::Live)
                }
                Err(PrismError::CapabilityUnavailable(reason))
                    if self.config.simulation == SimulationPolicy::Allow =>
                {
                    warn!(%reason, binding_key = %binding_key, "mpc cluster dropped out, commitment simulated");
                    (simulate_cipher(payload, &nonce), None, None, BinderMode::Simulated)
                }
                Err(e) => return Err(e),
            },
            BinderMode::Simulated => {
                (simulate_cipher(payload, &nonce), None, None, BinderMode::Simulated)
            }
        };

        debug!(binding_key = %binding_key, ?mode, "value committed");

        Ok(Commitment {
            ciphertext,
            commitment,
            binding_key: *binding_key,
            nonce,
            timestamp: Utc::now(),
            mode,
            payload_digested,
            ephemeral_public_key,
            backend_id,
        })
    }

    async fn seal_live(
        &self,
        payload: &[u8],
        binding_key: &Address,
        nonce: &[u8; AES_NONCE_LENGTH],
    ) -> PrismResult<(Vec<u8>, [u8; 32], String)> {
        let (service, cluster) = match (&self.service, &self.config.mpc_cluster) {
            (Some(service), Some(cluster)) => (service, cluster),
            _ => {
                return Err(PrismError::CapabilityUnavailable(
                    "live binder without mpc service".into(),
                ))
            }
        };

        let session = PfsSession::new();
        let client_public = session.public_key_bytes();
        let cluster_public = service.key_agreement(cluster, &client_public).await?;
        let completed = session.complete(&cluster_public)?;

        let ciphertext = service
            .encrypt(&completed, payload, nonce, binding_key.as_bytes())
            .await?;
        drop(completed);

        Ok((ciphertext, client_public, cluster.clone()))
    }
}

/// XOR with a BLAKE3 keystream seeded by the nonce. Anyone holding the
/// commitment can undo it.
fn simulate_cipher(payload: &[u8], nonce: &[u8; AES_NONCE_LENGTH]) -> Vec<u8> {
    let mut keystream = vec![0u8; payload.len()];
    blake3_xof(SIMULATED_KEYSTREAM_CONTEXT, nonce, &mut keystream);
    payload
        .iter()
        .zip(keystream.iter())
        .map(|(p, k)| p ^ k)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::commitment::{open_commitment, open_data_commitment, verify_commitment_format};
    use crate::binder::mpc::LocalMpcCluster;

    fn context(byte: u8) -> Address {
        Address::from_bytes([byte; 32])
    }

    fn live_config(simulation: SimulationPolicy) -> BinderConfig {
        BinderConfig {
            mpc_cluster: Some("cluster-1".into()),
            mpc_program: Some("program-1".into()),
            simulation,
        }
    }

    fn live_binder_with(simulation: SimulationPolicy) -> (Arc<LocalMpcCluster>, CommitmentBinder) {
        let cluster = Arc::new(LocalMpcCluster::new("cluster-1"));
        let binder = CommitmentBinder::new(live_config(simulation), Some(cluster.clone()));
        (cluster, binder)
    }

    fn live_binder() -> (Arc<LocalMpcCluster>, CommitmentBinder) {
        live_binder_with(SimulationPolicy::Allow)
    }

    #[tokio::test]
    async fn mode_resolution() {
        let binder = CommitmentBinder::simulated();
        assert_eq!(binder.mode(), None);
        assert_eq!(binder.initialize().await.unwrap(), BinderMode::Simulated);
        assert_eq!(binder.mode(), Some(BinderMode::Simulated));

        // Coordinates without a service, and a service without coordinates.
        let binder = CommitmentBinder::new(live_config(SimulationPolicy::Allow), None);
        assert_eq!(binder.initialize().await.unwrap(), BinderMode::Simulated);
        let cluster = Arc::new(LocalMpcCluster::new("cluster-1"));
        let binder = CommitmentBinder::new(BinderConfig::default(), Some(cluster));
        assert_eq!(binder.initialize().await.unwrap(), BinderMode::Simulated);

        let (_cluster, binder) = live_binder();
        assert_eq!(binder.initialize().await.unwrap(), BinderMode::Live);
        assert_eq!(binder.initialize().await.unwrap(), BinderMode::Live);
    }

    #[tokio::test]
    async fn unreachable_cluster_at_startup_downgrades() {
        let (cluster, binder) = live_binder();
        cluster.set_available(false);

        assert_eq!(binder.initialize().await.unwrap(), BinderMode::Simulated);
        let c = binder.encrypt(&U256::from(5u64), &context(1)).await.unwrap();
        assert_eq!(c.mode, BinderMode::Simulated);
        assert!(c.ephemeral_public_key.is_none());
        assert!(open_commitment(&c, &U256::from(5u64)));

        // Fixed once resolved.
        cluster.set_available(true);
        assert_eq!(binder.initialize().await.unwrap(), BinderMode::Simulated);
    }

    #[tokio::test]
    async fn wrong_cluster_address_downgrades() {
        let cluster = Arc::new(LocalMpcCluster::new("cluster-2"));
        let binder = CommitmentBinder::new(live_config(SimulationPolicy::Allow), Some(cluster));
        assert_eq!(binder.initialize().await.unwrap(), BinderMode::Simulated);
    }

    #[tokio::test]
    async fn deny_refuses_unreachable_cluster_until_it_returns() {
        let (cluster, binder) = live_binder_with(SimulationPolicy::Deny);
        cluster.set_available(false);

        let err = binder.initialize().await.unwrap_err();
        assert!(matches!(err, PrismError::CapabilityUnavailable(_)));
        assert_eq!(binder.mode(), None);
        assert!(matches!(
            binder.encrypt(&U256::from(1u64), &context(1)).await,
            Err(PrismError::CapabilityUnavailable(_))
        ));

        cluster.set_available(true);
        assert_eq!(binder.initialize().await.unwrap(), BinderMode::Live);
    }

    #[tokio::test]
    async fn deny_without_coordinates_fails() {
        let config = BinderConfig {
            simulation: SimulationPolicy::Deny,
            ..BinderConfig::default()
        };
        let binder = CommitmentBinder::new(config, None);
        assert!(matches!(
            binder.initialize().await,
            Err(PrismError::CapabilityUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn simulated_commitments() {
        let binder = CommitmentBinder::simulated();
        let secret = U256::from(500_000_000_000u64);

        let a = binder.encrypt(&secret, &context(1)).await.unwrap();
        let b = binder.encrypt(&secret, &context(1)).await.unwrap();
        let c = binder.encrypt(&secret, &context(2)).await.unwrap();

        for commitment in [&a, &b, &c] {
            assert!(verify_commitment_format(commitment));
            assert!(open_commitment(commitment, &secret));
            assert_eq!(commitment.mode, BinderMode::Simulated);
        }
        // Fresh nonces, and a different binding key, both change the hash.
        assert_ne!(a.commitment, b.commitment);
        assert_ne!(a.commitment, c.commitment);

        // The simulated cipher is a reversible XOR.
        let recovered = simulate_cipher(&a.ciphertext, &a.nonce);
        assert_eq!(recovered, to_le_bytes(&secret).to_vec());
    }

    #[tokio::test]
    async fn live_commitment_decrypts_at_cluster() {
        let (cluster, binder) = live_binder();
        let secret = U256::from(42u64);

        let c = binder.encrypt(&secret, &context(3)).await.unwrap();
        assert_eq!(c.mode, BinderMode::Live);
        assert_eq!(c.backend_id.as_deref(), Some("cluster-1"));
        assert!(verify_commitment_format(&c));
        assert!(open_commitment(&c, &secret));

        let plaintext = cluster.decrypt(&c).unwrap();
        assert_eq!(plaintext, to_le_bytes(&secret).to_vec());
    }

    #[tokio::test]
    async fn live_sessions_are_not_reused() {
        let (_cluster, binder) = live_binder();
        let secret = U256::from(7u64);
        let a = binder.encrypt(&secret, &context(1)).await.unwrap();
        let b = binder.encrypt(&secret, &context(1)).await.unwrap();
        assert_ne!(a.ephemeral_public_key, b.ephemeral_public_key);
        assert_ne!(a.nonce, b.nonce);
    }

    #[tokio::test]
    async fn live_ciphertext_is_bound_to_context() {
        let (cluster, binder) = live_binder();
        let mut c = binder.encrypt(&U256::from(9u64), &context(1)).await.unwrap();
        c.binding_key = context(2);
        assert!(cluster.decrypt(&c).is_err());
    }

    #[tokio::test]
    async fn oversized_secret_fails_before_any_call() {
        let (cluster, binder) = live_binder();
        cluster.set_available(false);
        let err = binder
            .encrypt(&(U256::one() << 250), &context(1))
            .await
            .unwrap_err();
        assert!(matches!(err, PrismError::ValueTooLarge { bits: 251, .. }));
        assert_eq!(binder.mode(), None);
    }

    #[tokio::test]
    async fn outage_after_startup_simulates_that_call() {
        let (cluster, binder) = live_binder();
        assert_eq!(binder.initialize().await.unwrap(), BinderMode::Live);

        cluster.set_available(false);
        let secret = U256::from(1u64);
        let c = binder.encrypt(&secret, &context(1)).await.unwrap();
        assert_eq!(c.mode, BinderMode::Simulated);
        assert!(c.backend_id.is_none());
        assert!(open_commitment(&c, &secret));
        assert_eq!(binder.mode(), Some(BinderMode::Live));

        cluster.set_available(true);
        let c = binder.encrypt(&secret, &context(1)).await.unwrap();
        assert_eq!(c.mode, BinderMode::Live);
    }

    #[tokio::test]
    async fn outage_after_startup_fails_under_deny() {
        let (cluster, binder) = live_binder_with(SimulationPolicy::Deny);
        assert_eq!(binder.initialize().await.unwrap(), BinderMode::Live);

        cluster.set_available(false);
        let err = binder.encrypt(&U256::from(1u64), &context(1)).await.unwrap_err();
        assert!(matches!(err, PrismError::CapabilityUnavailable(_)));
        assert_eq!(binder.mode(), Some(BinderMode::Live));
    }

    #[tokio::test]
    async fn encrypt_data_digests_wide_payloads() {
        let binder = CommitmentBinder::simulated();

        let short = binder.encrypt_data(b"hello", &context(1)).await.unwrap();
        assert!(!short.payload_digested);
        assert_eq!(short.ciphertext.len(), 5);
        assert!(open_data_commitment(&short, b"hello"));

        let wide = vec![0xAB; 100];
        let long = binder.encrypt_data(&wide, &context(1)).await.unwrap();
        assert!(long.payload_digested);
        assert_eq!(long.ciphertext.len(), 31);
        assert!(verify_commitment_format(&long));
        assert!(open_data_commitment(&long, &wide));
        assert!(!open_data_commitment(&long, &wide[..99]));
    }
}
