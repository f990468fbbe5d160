//! # CLI Interface
//!
//! Command-line argument structure for `prism`, using `clap` derive. Every
//! option that configures the core can also come from a `PRISM_*`
//! environment variable.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::logging::LogFormat;

/// PRISM client.
///
/// Derives identity addresses and runs solvency proofs against the
/// in-process reference ledger, MPC cluster and Groth16 backend.
#[derive(Parser, Debug)]
#[command(name = "prism", about = "PRISM command-line client", version, propagate_version = true)]
pub struct PrismCli {
    /// JSON runtime configuration. Flags override what it sets.
    #[arg(long, short = 'c', global = true, env = "PRISM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Default log filter when `RUST_LOG` is not set.
    #[arg(long, global = true, env = "PRISM_LOG_LEVEL", default_value = "prism=info,prism_protocol=info")]
    pub log_level: String,

    /// Log output format: `pretty` or `json`.
    #[arg(long, global = true, env = "PRISM_LOG_FORMAT", default_value = "pretty", value_parser = parse_log_format)]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Derive the root identity address of an owner key.
    DeriveRoot(DeriveRootArgs),
    /// Derive the address of a context under a root.
    DeriveContext(DeriveContextArgs),
    /// Open a temporary context and prove the value meets the threshold.
    Access(AccessArgs),
    /// Resolve and print the binder and prover modes.
    Status(BackendArgs),
    /// Print version information and exit.
    Version,
}

#[derive(Parser, Debug)]
pub struct DeriveRootArgs {
    /// Base58 Ed25519 owner public key.
    pub owner: String,
}

#[derive(Parser, Debug)]
pub struct DeriveContextArgs {
    /// Base58 root identity address.
    pub root: String,
    /// Context index (0..=65535).
    pub index: u64,
}

#[derive(Parser, Debug)]
pub struct AccessArgs {
    /// Private value, in base units. Never logged.
    #[arg(long)]
    pub value: String,

    /// Public threshold, in base units.
    #[arg(long)]
    pub threshold: String,

    /// Base58 owner key. A throwaway key is generated when omitted.
    #[arg(long, env = "PRISM_OWNER")]
    pub owner: Option<String>,

    #[command(flatten)]
    pub backend: BackendArgs,
}

/// Which backends the reference stack brings up.
#[derive(Parser, Debug, Clone)]
pub struct BackendArgs {
    /// Run against a local MPC cluster and a Groth16 backend instead of
    /// the simulations. Fails rather than downgrading.
    #[arg(long, env = "PRISM_LIVE")]
    pub live: bool,

    /// MPC cluster address.
    #[arg(long, env = "PRISM_MPC_CLUSTER")]
    pub mpc_cluster: Option<String>,

    /// MPC program address.
    #[arg(long, env = "PRISM_MPC_PROGRAM")]
    pub mpc_program: Option<String>,

    /// Fixed seed for the Groth16 setup. Random when omitted.
    #[arg(long, env = "PRISM_SETUP_SEED")]
    pub setup_seed: Option<u64>,
}

fn parse_log_format(s: &str) -> Result<LogFormat, String> {
    match s.to_lowercase().as_str() {
        "pretty" => Ok(LogFormat::Pretty),
        "json" => Ok(LogFormat::Json),
        other => Err(format!("unknown log format `{other}` (expected pretty or json)")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        PrismCli::command().debug_assert();
    }

    #[test]
    fn parses_access_flags() {
        let cli = PrismCli::try_parse_from([
            "prism",
            "access",
            "--value",
            "500",
            "--threshold",
            "100",
            "--live",
            "--setup-seed",
            "7",
        ])
        .unwrap();
        match cli.command {
            Commands::Access(args) => {
                assert_eq!(args.value, "500");
                assert_eq!(args.threshold, "100");
                assert!(args.backend.live);
                assert_eq!(args.backend.setup_seed, Some(7));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_log_format() {
        assert!(PrismCli::try_parse_from(["prism", "--log-format", "xml", "version"]).is_err());
    }
}
