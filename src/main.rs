// src/main.rs

//! # Certificate Verifier - Main Entry Point
//!
//! Issues certificates against a content hash of the certificate document
//! and verifies them later by ID, by hash, or by re-uploading the document.
//!
//! ## Architecture Overview
//! 1. **Storage Layer**: `CertificateStore`, in memory or on an EVM ledger
//! 2. **Blockchain Layer**: ethers client and `CertificateVerifier` deployment
//! 3. **Services Layer**: issuance, verification and the HTTP API
//! 4. **Proof Layer**: display-only proof artifacts
//!
//! ## Commands
//! - `serve` (default): start the API server
//! - `deploy`: publish the contract and write the deployment record
//!
//! Configuration is described in [`config`]; `.env` is loaded first.

use crate::blockchain::deployment::{deploy_contract, smoke_test, ContractArtifact, DeploymentInfo};
use crate::blockchain::ledger_client::LedgerClient;
use crate::config::{AppConfig, StoreBackend};
use crate::contracts::certificate_verifier::CertificateVerifierContract;
use crate::services::api_server::ApiServer;
use crate::storage::ledger::LedgerStore;
use crate::storage::memory::InMemoryStore;
use crate::storage::CertificateStore;
use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

// Module declarations (organized by functional domain)
mod blockchain; // ledger client and contract deployment
mod config; // layered configuration
mod contracts; // typed contract wrappers
mod error; // shared error type
mod models; // data structures
mod services; // business logic and API
mod storage; // certificate stores
mod utils; // hashing, IDs, retries, JSON helpers
mod zkp; // proof artifacts

/// Certificate issuance and verification service.
#[derive(Parser, Debug)]
#[command(name = "cert-verifier", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP API server.
    Serve,
    /// Publish the CertificateVerifier contract and record its address.
    Deploy {
        /// Hardhat/Truffle compilation artifact (JSON with `abi` and `bytecode`).
        #[arg(long)]
        artifact: PathBuf,
        /// Network name written to the deployment record.
        #[arg(long, default_value = "ganache")]
        network: String,
        /// Do not store and read back the sample certificate after deploying.
        #[arg(long)]
        skip_smoke_test: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = AppConfig::load().context("failed to load configuration")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Deploy {
            artifact,
            network,
            skip_smoke_test,
        } => deploy(config, artifact, network, skip_smoke_test).await,
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let addr = config.socket_addr()?;
    let store = build_store(&config).await?;
    info!("Using {:?} certificate store", config.store.backend);

    let api_server = ApiServer::new(store, config.upload.clone());
    api_server.run(addr).await.context("API server failed")
}

/// Selects the store backend named in the configuration.
async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn CertificateStore>> {
    match config.store.backend {
        StoreBackend::Memory => Ok(Arc::new(InMemoryStore::new())),
        StoreBackend::Ledger => {
            let client = connect_ledger(config).await?;
            let deployment = DeploymentInfo::load(&config.ledger.deployment_path)?;
            info!(
                "Using CertificateVerifier at {:#x} ({})",
                deployment.address, deployment.network
            );
            let contract =
                CertificateVerifierContract::from_deployment(client, &deployment, config.ledger.gas_limit)?;
            Ok(Arc::new(LedgerStore::new(contract, config.ledger.options())))
        }
    }
}

async fn connect_ledger(config: &AppConfig) -> anyhow::Result<LedgerClient> {
    let private_key = config.ledger.require_private_key()?;
    let client = LedgerClient::connect(&config.ledger.rpc_url, private_key)
        .await
        .with_context(|| format!("failed to connect to {}", config.ledger.rpc_url))?;
    info!("Connected to {} as {:#x}", config.ledger.rpc_url, client.address());
    Ok(client)
}

async fn deploy(
    config: AppConfig,
    artifact_path: PathBuf,
    network: String,
    skip_smoke_test: bool,
) -> anyhow::Result<()> {
    let artifact = ContractArtifact::load(&artifact_path)
        .with_context(|| format!("failed to read artifact {}", artifact_path.display()))?;
    let client = connect_ledger(&config).await?;

    let deployment = deploy_contract(&client, &artifact, &network).await?;
    let abi_path = deployment
        .save(&config.ledger.deployment_path)
        .context("failed to write deployment record")?;
    info!(
        "Deployment saved to {} (ABI in {})",
        config.ledger.deployment_path.display(),
        abi_path.display()
    );

    if skip_smoke_test {
        return Ok(());
    }
    let contract =
        CertificateVerifierContract::from_deployment(client, &deployment, config.ledger.gas_limit)?;
    let store = LedgerStore::new(contract, config.ledger.options());
    smoke_test(&store).await.context("smoke test failed")?;
    info!("Deployment completed successfully");
    Ok(())
}
