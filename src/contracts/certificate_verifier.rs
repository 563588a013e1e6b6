// src/contracts/certificate_verifier.rs
//! `CertificateVerifier` smart contract interface.
//!
//! Wraps the deployed contract behind the [`CertificateContract`] trait so the
//! ledger-backed store never sees ethers types. Supports storing a certificate,
//! looking it up by ID or by content hash, and enumerating stored IDs.

use crate::blockchain::deployment::DeploymentInfo;
use crate::blockchain::ledger_client::{LedgerClient, SignerClient};
use crate::error::CertError;
use crate::models::certificate::{CertificateRecord, CertificateStatus, ContentHash, IssueDate};
use crate::storage::ledger::{CertificateContract, NetworkInfo};
use crate::storage::InsertReceipt;
use async_trait::async_trait;
use ethers_contract::{Contract, ContractError};
use ethers_core::abi::Abi;
use ethers_core::types::{Address, U256, U64};
use log::debug;
use once_cell::sync::Lazy;

/// ABI compiled into the binary, used when a deployment record carries none.
static EMBEDDED_ABI: Lazy<Abi> = Lazy::new(|| {
    serde_json::from_slice(include_bytes!("abi/CertificateVerifier.json"))
        .expect("embedded CertificateVerifier ABI is valid JSON")
});

pub fn embedded_abi() -> Abi {
    EMBEDDED_ABI.clone()
}

/// `verifyCertificateById`: exists, hash, holder, type, institution, issueDate, timestamp, issuer
type ByIdOutput = (bool, String, String, String, String, U256, U256, Address);
/// `verifyCertificateByHash`: exists, id, holder, type, institution
type ByHashOutput = (bool, String, String, String, String);
/// `getCertificateByIndex`: id, holder, type, institution, issueDate
type ByIndexOutput = (String, String, String, String, U256);

/// CertificateVerifier contract wrapper.
///
/// This struct provides methods to interact with the contract:
/// - Store new certificates (one transaction each, fixed gas limit)
/// - Look certificates up by ID or hash (view calls)
/// - Enumerate stored certificates by index
pub struct CertificateVerifierContract {
    client: LedgerClient,
    contract: Contract<SignerClient>,
    gas_limit: u64,
}

impl CertificateVerifierContract {
    pub fn new(client: LedgerClient, address: Address, abi: Abi, gas_limit: u64) -> Self {
        let contract = client.contract(address, abi);
        Self {
            client,
            contract,
            gas_limit,
        }
    }

    /// Binds to the contract recorded in a deployment file.
    pub fn from_deployment(
        client: LedgerClient,
        deployment: &DeploymentInfo,
        gas_limit: u64,
    ) -> Result<Self, CertError> {
        let abi = deployment.abi()?;
        Ok(Self::new(client, deployment.address, abi, gas_limit))
    }

    pub fn address(&self) -> Address {
        self.contract.address()
    }
}

fn call_error(method: &str, err: ContractError<SignerClient>) -> CertError {
    CertError::Upstream(format!("{} failed: {}", method, err))
}

fn abi_error(method: &str, err: impl std::fmt::Display) -> CertError {
    CertError::Upstream(format!("cannot encode {}: {}", method, err))
}

fn to_u64(value: U256, field: &str) -> Result<u64, CertError> {
    if value > U256::from(u64::MAX) {
        return Err(CertError::Upstream(format!("{} {} out of range", field, value)));
    }
    Ok(value.as_u64())
}

fn to_i64(value: U256, field: &str) -> Result<i64, CertError> {
    i64::try_from(to_u64(value, field)?)
        .map_err(|_| CertError::Upstream(format!("{} {} out of range", field, value)))
}

/// Maps a failed `storeCertificate` send; the contract reverts on an existing ID.
fn store_error(certificate_id: &str, err: ContractError<SignerClient>) -> CertError {
    let reason = err
        .decode_revert::<String>()
        .unwrap_or_else(|| err.to_string());
    if reason.to_lowercase().contains("already exists") {
        CertError::DuplicateId(certificate_id.to_string())
    } else {
        CertError::Upstream(format!("storeCertificate failed: {}", reason))
    }
}

#[async_trait]
impl CertificateContract for CertificateVerifierContract {
    async fn certificate_exists(&self, certificate_id: &str) -> Result<bool, CertError> {
        self.contract
            .method::<_, bool>("certificateExists", certificate_id.to_string())
            .map_err(|e| abi_error("certificateExists", e))?
            .call()
            .await
            .map_err(|e| call_error("certificateExists", e))
    }

    async fn store_certificate(&self, record: &CertificateRecord) -> Result<InsertReceipt, CertError> {
        let issue_date = u64::try_from(record.issue_date.as_unix())
            .map_err(|_| CertError::invalid("Issue date must not precede 1970-01-01"))?;
        let params = (
            record.certificate_id.clone(),
            record.content_hash.to_string(),
            record.holder_name.clone(),
            record.certificate_type.clone(),
            record.institution.clone(),
            U256::from(issue_date),
        );

        let call = self
            .contract
            .method::<_, ()>("storeCertificate", params)
            .map_err(|e| abi_error("storeCertificate", e))?
            .gas(self.gas_limit);

        let pending = call
            .send()
            .await
            .map_err(|e| store_error(&record.certificate_id, e))?;
        let receipt = pending
            .await
            .map_err(|e| CertError::Upstream(format!("waiting for receipt failed: {}", e)))?
            .ok_or_else(|| CertError::Upstream("transaction dropped before being mined".into()))?;

        if receipt.status == Some(U64::zero()) {
            return Err(CertError::Upstream(format!(
                "storeCertificate reverted in transaction {:#x}",
                receipt.transaction_hash
            )));
        }

        Ok(InsertReceipt {
            transaction_hash: Some(format!("{:#x}", receipt.transaction_hash)),
            block_number: receipt.block_number.map(|block| block.as_u64()),
            gas_used: receipt.gas_used.map(|gas| gas.low_u64()),
        })
    }

    async fn verify_certificate_by_id(
        &self,
        certificate_id: &str,
    ) -> Result<Option<CertificateRecord>, CertError> {
        let result = self
            .contract
            .method::<_, ByIdOutput>("verifyCertificateById", certificate_id.to_string())
            .map_err(|e| abi_error("verifyCertificateById", e))?
            .call()
            .await;

        let (exists, hash, holder_name, certificate_type, institution, issue_date, timestamp, issuer) =
            match result {
                Ok(output) => output,
                // Some contract revisions revert instead of returning exists = false.
                Err(ContractError::Revert(_)) => return Ok(None),
                Err(err) => return Err(call_error("verifyCertificateById", err)),
            };
        if !exists {
            debug!("certificate {} not on the ledger", certificate_id);
            return Ok(None);
        }

        let content_hash = ContentHash::parse(&hash).map_err(|_| {
            CertError::Upstream(format!("ledger holds a malformed hash for {}", certificate_id))
        })?;

        Ok(Some(CertificateRecord {
            certificate_id: certificate_id.to_string(),
            content_hash,
            holder_name,
            certificate_type,
            institution,
            issue_date: IssueDate::from_unix(to_i64(issue_date, "issueDate")?),
            status: CertificateStatus::Verified,
            registered_at: to_i64(timestamp, "timestamp")?,
            issuer: Some(format!("{:#x}", issuer)),
        }))
    }

    async fn verify_certificate_by_hash(&self, hash: &ContentHash) -> Result<Option<String>, CertError> {
        let result = self
            .contract
            .method::<_, ByHashOutput>("verifyCertificateByHash", hash.to_string())
            .map_err(|e| abi_error("verifyCertificateByHash", e))?
            .call()
            .await;

        match result {
            Ok((true, certificate_id, ..)) => Ok(Some(certificate_id)),
            Ok(_) | Err(ContractError::Revert(_)) => Ok(None),
            Err(err) => Err(call_error("verifyCertificateByHash", err)),
        }
    }

    async fn certificate_count(&self) -> Result<u64, CertError> {
        let count: U256 = self
            .contract
            .method::<_, U256>("getCertificateCount", ())
            .map_err(|e| abi_error("getCertificateCount", e))?
            .call()
            .await
            .map_err(|e| call_error("getCertificateCount", e))?;
        to_u64(count, "certificate count")
    }

    async fn certificate_id_at(&self, index: u64) -> Result<String, CertError> {
        let (certificate_id, ..): ByIndexOutput = self
            .contract
            .method::<_, ByIndexOutput>("getCertificateByIndex", U256::from(index))
            .map_err(|e| abi_error("getCertificateByIndex", e))?
            .call()
            .await
            .map_err(|e| call_error("getCertificateByIndex", e))?;
        Ok(certificate_id)
    }

    async fn network_info(&self) -> Result<NetworkInfo, CertError> {
        let (chain_id, latest_block) = self.client.chain_status().await?;
        Ok(NetworkInfo {
            chain_id,
            latest_block,
            account: format!("{:#x}", self.client.address()),
            contract_address: format!("{:#x}", self.address()),
        })
    }
}
