// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Crowdsale Node
//!
//! Entry point for the `crowdsale-node` binary. Parses CLI arguments,
//! initializes logging and metrics, deploys the token, the allow-list, and
//! the sale coordinator in memory, then serves the HTTP API.
//!
//! The binary supports three subcommands:
//!
//! - `serve`: deploy and serve the HTTP API and metrics endpoint
//! - `deploy`: deploy, print the sale snapshot as JSON, and exit
//! - `version`: print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;

use crowdsale_contracts::{Address, Deployment, DeploymentConfig, InMemoryLedger};

use cli::{Commands, CrowdsaleNodeCli, DeploymentArgs};
use logging::LogFormat;
use metrics::SaleMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CrowdsaleNodeCli::parse();

    match cli.command {
        Commands::Serve(args) => serve(args).await,
        Commands::Deploy(args) => deploy(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Deploys the sale and serves the API and metrics until shutdown.
async fn serve(args: cli::ServeArgs) -> Result<()> {
    init_logging(&args.deployment)?;
    let deployment = deploy_from_args(&args.deployment)?;

    tracing::info!(
        api_port = args.api_port,
        metrics_port = args.metrics_port,
        sale = %deployment.sale.address(),
        "starting crowdsale-node"
    );

    // --- Metrics ---
    let sale_metrics = Arc::new(SaleMetrics::new().context("failed to register metrics")?);

    // --- Application state ---
    let app_state = api::AppState::new(
        env!("CARGO_PKG_VERSION"),
        deployment,
        Arc::clone(&sale_metrics),
    );

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.api_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&sale_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    tracing::info!("crowdsale-node stopped");
    Ok(())
}

/// Deploys the sale and prints its snapshot to stdout.
fn deploy(args: cli::DeployArgs) -> Result<()> {
    init_logging(&args.deployment)?;
    let deployment = deploy_from_args(&args.deployment)?;

    let snapshot = serde_json::to_string_pretty(&deployment.sale.snapshot())
        .context("failed to encode sale snapshot")?;
    println!("{}", snapshot);
    Ok(())
}

fn init_logging(args: &DeploymentArgs) -> Result<()> {
    let format: LogFormat = args.log_format.parse()?;
    logging::init_logging(&args.log_level, format)
}

/// Loads the deployment file (or defaults) and deploys against a fresh
/// native ledger.
fn deploy_from_args(args: &DeploymentArgs) -> Result<Deployment> {
    let config = load_config(args.config.as_deref())?;
    let deployer: Address = args
        .deployer
        .parse()
        .with_context(|| format!("invalid deployer address {:?}", args.deployer))?;

    let native = InMemoryLedger::native(Address::ZERO).into_shared();
    let deployment =
        Deployment::deploy(&config, deployer, native).context("deployment rejected")?;

    tracing::info!(
        deployer = %deployer,
        token = %deployment.sale.unit_source_address(),
        gate = %deployment.sale.gate_address(),
        sale = %deployment.sale.address(),
        price = %deployment.sale.price(),
        "sale deployed"
    );
    Ok(deployment)
}

/// Reads a JSON deployment file. Without a path, returns the defaults.
fn load_config(path: Option<&Path>) -> Result<DeploymentConfig> {
    let Some(path) = path else {
        tracing::debug!("no deployment file given, using defaults");
        return Ok(DeploymentConfig::default());
    };

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read deployment file {}", path.display()))?;
    DeploymentConfig::from_json(&raw)
        .with_context(|| format!("invalid deployment file {}", path.display()))
}

/// Prints version information to stdout.
fn print_version() {
    println!("crowdsale-node {}", env!("CARGO_PKG_VERSION"));
    println!("rustc          {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported. If a handler cannot be
/// installed, that signal is never observed.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
