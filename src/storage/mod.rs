// src/storage/mod.rs
//! Certificate record store.
//!
//! [`CertificateStore`] is the single seam between the services and
//! persistence. Two implementations exist:
//! - [`memory::InMemoryStore`]: arena + index maps, used for tests and demos
//! - [`ledger::LedgerStore`]: adapter over the deployed `CertificateVerifier` contract
//!
//! The backend is chosen from configuration at startup and injected as
//! `Arc<dyn CertificateStore>`.

pub mod ledger;
pub mod memory;

use crate::error::CertError;
use crate::models::certificate::{CertificateRecord, ContentHash};
use async_trait::async_trait;
use serde::Serialize;

/// What a successful insert produced.
///
/// The in-memory store leaves every field `None`; the ledger store fills
/// them from the transaction receipt.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InsertReceipt {
    pub transaction_hash: Option<String>,
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
}

/// Backend status as reported by `/api/blockchain/info`.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BackendInfo {
    pub backend: &'static str,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_block: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<String>,
    pub certificate_count: usize,
}

/// Append-only certificate storage.
///
/// Records are never updated or deleted once inserted. Implementations must
/// make a concurrent `put` of the same ID succeed at most once, and a reader
/// must see either the state before or after a `put`, never in between.
#[async_trait]
pub trait CertificateStore: Send + Sync {
    /// Inserts a validated record; `CertError::DuplicateId` if the ID is taken.
    async fn put(&self, record: CertificateRecord) -> Result<InsertReceipt, CertError>;

    /// Exact-match lookup by certificate ID.
    async fn get_by_id(&self, certificate_id: &str) -> Result<Option<CertificateRecord>, CertError>;

    /// Lookup by content hash. If several records share the hash, the most
    /// recently inserted one wins.
    async fn get_by_hash(&self, hash: &ContentHash) -> Result<Option<CertificateRecord>, CertError>;

    /// All records in insertion order.
    async fn list(&self) -> Result<Vec<CertificateRecord>, CertError>;

    async fn count(&self) -> Result<usize, CertError>;

    async fn backend_info(&self) -> Result<BackendInfo, CertError>;
}
