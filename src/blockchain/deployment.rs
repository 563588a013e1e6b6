// src/blockchain/deployment.rs
//! Contract publication and the deployment record.
//!
//! `deploy` publishes the compiled `CertificateVerifier` contract once and
//! writes `{address, abi, network, deploymentTime}` to disk; the server reads
//! that file back at startup when running against the ledger.

use crate::blockchain::ledger_client::LedgerClient;
use crate::error::CertError;
use crate::models::certificate::{CertificateRecord, ContentHash, IssueDate};
use crate::storage::CertificateStore;
use crate::utils::serialization::{read_json_file, write_json_file};
use chrono::{DateTime, Utc};
use ethers::utils::hex;
use ethers_contract::ContractFactory;
use ethers_core::abi::Abi;
use ethers_core::types::{Address, Bytes};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the bare-ABI file written next to the deployment record.
pub const ABI_FILE_NAME: &str = "contract_abi.json";

/// Persisted result of a contract deployment.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentInfo {
    pub address: Address,
    pub abi: serde_json::Value,
    pub network: String,
    pub deployment_time: DateTime<Utc>,
}

impl DeploymentInfo {
    pub fn load(path: &Path) -> Result<Self, CertError> {
        read_json_file(path).map_err(|e| match e {
            CertError::Io(io) => CertError::Config(format!(
                "cannot read deployment record {}: {} (run `deploy` first)",
                path.display(),
                io
            )),
            other => other,
        })
    }

    /// Writes the deployment record and a bare ABI file beside it.
    pub fn save(&self, path: &Path) -> Result<PathBuf, CertError> {
        write_json_file(path, self)?;
        let abi_path = path.with_file_name(ABI_FILE_NAME);
        write_json_file(&abi_path, &self.abi)?;
        Ok(abi_path)
    }

    /// The recorded ABI, or the embedded one if the record has none.
    pub fn abi(&self) -> Result<Abi, CertError> {
        if self.abi.is_null() {
            return Ok(crate::contracts::certificate_verifier::embedded_abi());
        }
        serde_json::from_value(self.abi.clone())
            .map_err(|e| CertError::Config(format!("deployment record has an invalid ABI: {}", e)))
    }
}

/// The parts of a Hardhat/Truffle compilation artifact needed to deploy.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ContractArtifact {
    #[serde(default)]
    pub contract_name: Option<String>,
    pub abi: serde_json::Value,
    pub bytecode: String,
}

impl ContractArtifact {
    pub fn load(path: &Path) -> Result<Self, CertError> {
        read_json_file(path)
    }

    pub fn bytecode(&self) -> Result<Bytes, CertError> {
        let raw = self.bytecode.trim().trim_start_matches("0x");
        if raw.is_empty() {
            return Err(CertError::Config(
                "artifact has no bytecode (abstract contract or interface?)".into(),
            ));
        }
        hex::decode(raw)
            .map(Bytes::from)
            .map_err(|e| CertError::Config(format!("artifact bytecode is not hex: {}", e)))
    }

    pub fn abi(&self) -> Result<Abi, CertError> {
        serde_json::from_value(self.abi.clone())
            .map_err(|e| CertError::Config(format!("artifact has an invalid ABI: {}", e)))
    }
}

/// Publishes the contract and returns the record to persist.
pub async fn deploy_contract(
    client: &LedgerClient,
    artifact: &ContractArtifact,
    network: &str,
) -> Result<DeploymentInfo, CertError> {
    let name = artifact.contract_name.as_deref().unwrap_or("CertificateVerifier");
    info!("Deploying {} to {} from {:#x}", name, network, client.address());

    let factory = ContractFactory::new(artifact.abi()?, artifact.bytecode()?, client.signer());
    let deployer = factory
        .deploy(())
        .map_err(|e| CertError::Upstream(format!("cannot build deployment transaction: {}", e)))?;
    let (contract, receipt) = deployer
        .send_with_receipt()
        .await
        .map_err(|e| CertError::Upstream(format!("deployment failed: {}", e)))?;

    info!(
        "{} deployed at {:#x} (tx {:#x}, block {:?}, gas {:?})",
        name,
        contract.address(),
        receipt.transaction_hash,
        receipt.block_number,
        receipt.gas_used
    );

    Ok(DeploymentInfo {
        address: contract.address(),
        abi: artifact.abi.clone(),
        network: network.to_string(),
        deployment_time: Utc::now(),
    })
}

/// Post-deployment check: count, store a fixed sample, read it back.
pub async fn smoke_test(store: &dyn CertificateStore) -> Result<CertificateRecord, CertError> {
    let initial = store.count().await?;
    info!("Initial certificate count: {}", initial);

    let sample = CertificateRecord::new(
        "CERT-2024-001",
        ContentHash::parse(&"a".repeat(ContentHash::HEX_LEN))?,
        "John Doe",
        "Bachelor of Computer Science",
        Some("MIT".to_string()),
        IssueDate::now(),
    );
    let receipt = store.put(sample.clone()).await?;
    info!("Sample certificate stored (tx {:?})", receipt.transaction_hash);

    let stored = store
        .get_by_id(&sample.certificate_id)
        .await?
        .ok_or_else(|| CertError::NotFound(format!("Certificate {}", sample.certificate_id)))?;
    if stored.holder_name != sample.holder_name || stored.content_hash != sample.content_hash {
        return Err(CertError::Upstream(
            "sample certificate read back with different contents".into(),
        ));
    }
    info!(
        "Sample certificate verified: {} / {} / {}",
        stored.holder_name, stored.certificate_type, stored.institution
    );
    Ok(stored)
}
