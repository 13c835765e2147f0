//! # CLI Interface
//!
//! Defines the command-line argument structure for `crowdsale-node` using
//! `clap` derive. Supports three subcommands: `serve`, `deploy`, and
//! `version`.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Default deployer account: owns the token, the allow-list, and the sale.
pub const DEFAULT_DEPLOYER: &str = "0xd0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0";

/// Allow-listed token sale node.
///
/// Deploys a token, an allow-list, and a sale coordinator in memory, then
/// serves their read/write surface over HTTP.
#[derive(Parser, Debug)]
#[command(
    name = "crowdsale-node",
    about = "Allow-listed token sale node",
    version,
    propagate_version = true
)]
pub struct CrowdsaleNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Deploy the sale and serve the HTTP API.
    Serve(ServeArgs),
    /// Deploy the sale, print its snapshot as JSON, and exit.
    Deploy(DeployArgs),
    /// Print version information and exit.
    Version,
}

/// Options shared by every subcommand that deploys a sale.
#[derive(Args, Debug, Clone)]
pub struct DeploymentArgs {
    /// Path to a JSON deployment file (token, sale parameters, funding).
    ///
    /// When omitted, the devnet defaults are used.
    #[arg(long, short = 'c', env = "CROWDSALE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Hex address of the deployer.
    #[arg(long, env = "CROWDSALE_DEPLOYER", default_value = DEFAULT_DEPLOYER)]
    pub deployer: String,

    /// Default log filter when `RUST_LOG` is not set.
    #[arg(long, env = "CROWDSALE_LOG", default_value = "crowdsale_node=info,crowdsale_contracts=info")]
    pub log_level: String,

    /// Log output format: `pretty` or `json`.
    #[arg(long, env = "CROWDSALE_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

/// Arguments for the `serve` subcommand.
#[derive(Parser, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub deployment: DeploymentArgs,

    /// Port for the HTTP API.
    #[arg(long, env = "CROWDSALE_API_PORT", default_value_t = 9741)]
    pub api_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "CROWDSALE_METRICS_PORT", default_value_t = 9742)]
    pub metrics_port: u16,
}

/// Arguments for the `deploy` subcommand.
#[derive(Parser, Debug)]
pub struct DeployArgs {
    #[command(flatten)]
    pub deployment: DeploymentArgs,
}
