// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # PRISM CLI
//!
//! Entry point for the `prism` binary. Parses arguments, initializes
//! logging, wires the core to the in-process reference adapters and prints
//! every result as pretty JSON on stdout.
//!
//! - `derive-root`: root identity address of an owner key
//! - `derive-context`: context address under a root
//! - `access`: root, temporary context and solvency proof in one go
//! - `status`: binder and prover modes
//! - `version`: build and protocol information

mod cli;
mod logging;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use serde::Serialize;

use prism_protocol::amount::parse_amount;
use prism_protocol::binder::{LocalMpcCluster, MpcEncryptionService};
use prism_protocol::config::{SimulationPolicy, PROGRAM_ID, ZKP_CURVE};
use prism_protocol::identity::{derive_context_address, derive_root_address, parse_owner, Address};
use prism_protocol::ledger::{InMemoryLedger, LedgerService};
use prism_protocol::zkp::{Groth16Backend, ProvingBackend};
use prism_protocol::{EncryptedAccess, PrismConfig};

use cli::{BackendArgs, Commands, PrismCli};

/// Cluster address used for the local MPC cluster when none is configured.
const LOCAL_MPC_CLUSTER: &str = "local-mpc-cluster";
/// Program address paired with [`LOCAL_MPC_CLUSTER`].
const LOCAL_MPC_PROGRAM: &str = "local-mpc-program";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = PrismCli::parse();
    logging::init_logging(&cli.log_level, cli.log_format);

    let config = match &cli.config {
        Some(path) => PrismConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => PrismConfig::default(),
    };

    match cli.command {
        Commands::DeriveRoot(args) => {
            let owner = parse_owner(&args.owner).context("invalid owner key")?;
            print_json(&derive_root_address(&owner)?)
        }
        Commands::DeriveContext(args) => {
            let root: Address = args.root.parse().context("invalid root address")?;
            print_json(&derive_context_address(&root, args.index)?)
        }
        Commands::Access(args) => {
            let value = parse_amount(&args.value).context("invalid --value")?;
            let threshold = parse_amount(&args.threshold).context("invalid --threshold")?;
            let owner = match &args.owner {
                Some(raw) => parse_owner(raw).context("invalid --owner")?,
                None => {
                    let owner = throwaway_owner();
                    tracing::info!(%owner, "generated throwaway owner key");
                    owner
                }
            };

            let access = build_access(config, &args.backend);
            let granted = access
                .quick_access(&owner, &value, &threshold)
                .await
                .context("quick access failed")?;
            print_json(&granted)
        }
        Commands::Status(args) => {
            let access = build_access(config, &args);
            let status = access
                .initialize()
                .await
                .context("failed to initialize backends")?;
            print_json(&status)
        }
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Wire the core to the in-process adapters. With `--live` the MPC cluster
/// and Groth16 backend are brought up and simulation is refused.
fn build_access(mut config: PrismConfig, args: &BackendArgs) -> EncryptedAccess {
    if let Some(cluster) = &args.mpc_cluster {
        config.binder.mpc_cluster = Some(cluster.clone());
    }
    if let Some(program) = &args.mpc_program {
        config.binder.mpc_program = Some(program.clone());
    }

    let ledger: Arc<dyn LedgerService> = Arc::new(InMemoryLedger::new());
    if !args.live {
        return EncryptedAccess::new(config, ledger, None, None);
    }

    let cluster_address = config
        .binder
        .mpc_cluster
        .get_or_insert_with(|| LOCAL_MPC_CLUSTER.to_string())
        .clone();
    config
        .binder
        .mpc_program
        .get_or_insert_with(|| LOCAL_MPC_PROGRAM.to_string());
    config.binder.simulation = SimulationPolicy::Deny;
    config.prover.simulation = SimulationPolicy::Deny;

    tracing::info!(cluster = %cluster_address, "live backends configured");
    let mpc: Arc<dyn MpcEncryptionService> = Arc::new(LocalMpcCluster::new(cluster_address));
    let backend: Arc<dyn ProvingBackend> = Arc::new(match args.setup_seed {
        Some(seed) => Groth16Backend::with_seed(seed),
        None => Groth16Backend::new(),
    });
    EncryptedAccess::new(config, ledger, Some(mpc), Some(backend))
}

fn throwaway_owner() -> Address {
    Address::from_bytes(SigningKey::generate(&mut OsRng).verifying_key().to_bytes())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to serialize result")?;
    println!("{rendered}");
    Ok(())
}

fn print_version() {
    println!("prism      {}", env!("CARGO_PKG_VERSION"));
    println!("program id {}", PROGRAM_ID);
    println!("zkp curve  {}", ZKP_CURVE);
}
