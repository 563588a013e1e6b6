// src/storage/ledger.rs
//! Ledger-backed certificate store.
//!
//! Adapts any [`CertificateContract`] (in production the ethers-based
//! `CertificateVerifierContract`) to the [`CertificateStore`] interface.
//!
//! # Timeouts and retries
//! Every contract call is bounded by `call_timeout`; expiry surfaces as
//! `CertError::UpstreamTimeout`. Reads that time out are retried with
//! backoff. Writes are never retried here: a timed-out transaction may still
//! be mined, and a blind resend would come back as a duplicate.
//!
//! # Duplicates
//! `put` checks `certificateExists` before sending, but the check is not
//! atomic with the transaction. When the send reverts, the ID is looked up
//! again and a now-present ID is reported as `CertError::DuplicateId`.

use super::{BackendInfo, CertificateStore, InsertReceipt};
use crate::error::CertError;
use crate::models::certificate::{CertificateRecord, ContentHash};
use crate::utils::retry::{retry_with_backoff, RetryConfig};
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use log::{info, warn};
use std::future::Future;
use std::time::Duration;

/// Upper bound on concurrent contract reads while walking the index.
const LIST_CONCURRENCY: usize = 8;

/// Chain-side facts about the connection, for status reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInfo {
    pub chain_id: u64,
    pub latest_block: u64,
    pub account: String,
    pub contract_address: String,
}

/// The `CertificateVerifier` contract surface the store relies on.
///
/// Implementations translate contract reverts for an existing ID into
/// `CertError::DuplicateId` and leave timeouts to the caller.
#[async_trait]
pub trait CertificateContract: Send + Sync {
    async fn certificate_exists(&self, certificate_id: &str) -> Result<bool, CertError>;

    async fn store_certificate(&self, record: &CertificateRecord) -> Result<InsertReceipt, CertError>;

    async fn verify_certificate_by_id(
        &self,
        certificate_id: &str,
    ) -> Result<Option<CertificateRecord>, CertError>;

    /// Resolves a content hash to the certificate ID the contract indexed it under.
    async fn verify_certificate_by_hash(&self, hash: &ContentHash) -> Result<Option<String>, CertError>;

    async fn certificate_count(&self) -> Result<u64, CertError>;

    async fn certificate_id_at(&self, index: u64) -> Result<String, CertError>;

    async fn network_info(&self) -> Result<NetworkInfo, CertError>;
}

/// Timing policy for contract calls.
#[derive(Debug, Clone)]
pub struct LedgerOptions {
    pub call_timeout: Duration,
    pub retry: RetryConfig,
}

impl Default for LedgerOptions {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
        }
    }
}

/// [`CertificateStore`] over a deployed contract.
pub struct LedgerStore<C> {
    contract: C,
    options: LedgerOptions,
}

impl<C: CertificateContract> LedgerStore<C> {
    pub fn new(contract: C, options: LedgerOptions) -> Self {
        Self { contract, options }
    }

    async fn bounded<T>(&self, call: impl Future<Output = Result<T, CertError>>) -> Result<T, CertError> {
        match tokio::time::timeout(self.options.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(CertError::UpstreamTimeout(self.options.call_timeout)),
        }
    }

    async fn read<T, F, Fut>(&self, name: &str, mut call: F) -> Result<T, CertError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CertError>>,
    {
        retry_with_backoff(&self.options.retry, name, || self.bounded(call())).await
    }
}

#[async_trait]
impl<C: CertificateContract> CertificateStore for LedgerStore<C> {
    async fn put(&self, record: CertificateRecord) -> Result<InsertReceipt, CertError> {
        record.validate()?;
        if record.issue_date.as_unix() < 0 {
            return Err(CertError::invalid("Issue date must not precede 1970-01-01"));
        }

        let id = record.certificate_id.as_str();
        if self
            .read("certificateExists", || self.contract.certificate_exists(id))
            .await?
        {
            warn!("certificate {} already exists on the ledger", id);
            return Err(CertError::DuplicateId(record.certificate_id.clone()));
        }

        let receipt = match self.bounded(self.contract.store_certificate(&record)).await {
            Ok(receipt) => receipt,
            Err(CertError::Upstream(reason)) => {
                // Another writer may have claimed the ID after the pre-check.
                let claimed = self
                    .read("certificateExists", || self.contract.certificate_exists(id))
                    .await;
                if matches!(claimed, Ok(true)) {
                    warn!("certificate {} was stored concurrently: {}", id, reason);
                    return Err(CertError::DuplicateId(record.certificate_id.clone()));
                }
                return Err(CertError::Upstream(reason));
            }
            Err(err) => return Err(err),
        };
        info!(
            "stored certificate {} on the ledger (tx {:?}, block {:?})",
            id, receipt.transaction_hash, receipt.block_number
        );
        Ok(receipt)
    }

    async fn get_by_id(&self, certificate_id: &str) -> Result<Option<CertificateRecord>, CertError> {
        self.read("verifyCertificateById", || {
            self.contract.verify_certificate_by_id(certificate_id)
        })
        .await
    }

    async fn get_by_hash(&self, hash: &ContentHash) -> Result<Option<CertificateRecord>, CertError> {
        let id = self
            .read("verifyCertificateByHash", || self.contract.verify_certificate_by_hash(hash))
            .await?;
        match id {
            Some(id) => self.get_by_id(&id).await,
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<CertificateRecord>, CertError> {
        let count = self
            .read("getCertificateCount", || self.contract.certificate_count())
            .await?;

        let ids: Vec<String> = stream::iter(0..count)
            .map(|index| {
                self.read("getCertificateByIndex", move || self.contract.certificate_id_at(index))
            })
            .buffered(LIST_CONCURRENCY)
            .try_collect()
            .await?;

        let records: Vec<Option<CertificateRecord>> = stream::iter(ids)
            .map(|id| async move { self.get_by_id(&id).await })
            .buffered(LIST_CONCURRENCY)
            .try_collect()
            .await?;
        Ok(records.into_iter().flatten().collect())
    }

    async fn count(&self) -> Result<usize, CertError> {
        let count = self
            .read("getCertificateCount", || self.contract.certificate_count())
            .await?;
        usize::try_from(count).map_err(|_| CertError::Upstream(format!("certificate count {} out of range", count)))
    }

    async fn backend_info(&self) -> Result<BackendInfo, CertError> {
        let network = match self.bounded(self.contract.network_info()).await {
            Ok(network) => network,
            Err(err) => {
                warn!("ledger unreachable: {}", err);
                return Ok(BackendInfo {
                    backend: "ledger",
                    connected: false,
                    chain_id: None,
                    latest_block: None,
                    account: None,
                    contract_address: None,
                    certificate_count: 0,
                });
            }
        };

        Ok(BackendInfo {
            backend: "ledger",
            connected: true,
            chain_id: Some(network.chain_id),
            latest_block: Some(network.latest_block),
            account: Some(network.account),
            contract_address: Some(network.contract_address),
            certificate_count: self.count().await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::certificate::IssueDate;
    use crate::utils::crypto::compute_hash;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Emulates the contract's storage: id-keyed records plus a hash → latest id index.
    #[derive(Default)]
    struct FakeContract {
        records: Mutex<Vec<CertificateRecord>>,
        slow_reads: AtomicUsize,
        slow_writes: bool,
        reports_exists: bool,
        /// Number of `certificate_exists` calls that report absent regardless of state.
        blind_prechecks: AtomicUsize,
        /// Answer a duplicate send like a mined, reverted transaction.
        reverts_on_duplicate: bool,
        /// Revert every send.
        always_reverts: bool,
        store_calls: AtomicUsize,
        read_calls: AtomicUsize,
        in_flight: AtomicUsize,
        peak_in_flight: AtomicUsize,
    }

    impl FakeContract {
        async fn maybe_stall(&self) {
            self.read_calls.fetch_add(1, Ordering::SeqCst);
            let stall = self
                .slow_reads
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if stall {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }

        async fn track_in_flight(&self) {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl CertificateContract for FakeContract {
        async fn certificate_exists(&self, certificate_id: &str) -> Result<bool, CertError> {
            self.maybe_stall().await;
            let blind = self
                .blind_prechecks
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if blind {
                return Ok(false);
            }
            Ok(self.reports_exists
                || self
                    .records
                    .lock()
                    .unwrap()
                    .iter()
                    .any(|r| r.certificate_id == certificate_id))
        }

        async fn store_certificate(&self, record: &CertificateRecord) -> Result<InsertReceipt, CertError> {
            self.store_calls.fetch_add(1, Ordering::SeqCst);
            if self.slow_writes {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            let mut records = self.records.lock().unwrap();
            if self.always_reverts {
                return Err(CertError::Upstream("storeCertificate reverted in transaction 0x02".into()));
            }
            if records.iter().any(|r| r.certificate_id == record.certificate_id) {
                if self.reverts_on_duplicate {
                    return Err(CertError::Upstream("storeCertificate reverted in transaction 0x01".into()));
                }
                return Err(CertError::DuplicateId(record.certificate_id.clone()));
            }
            records.push(record.clone());
            Ok(InsertReceipt {
                transaction_hash: Some(format!("0x{:064x}", records.len())),
                block_number: Some(records.len() as u64),
                gas_used: Some(210_000),
            })
        }

        async fn verify_certificate_by_id(
            &self,
            certificate_id: &str,
        ) -> Result<Option<CertificateRecord>, CertError> {
            self.maybe_stall().await;
            self.track_in_flight().await;
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.certificate_id == certificate_id)
                .cloned())
        }

        async fn verify_certificate_by_hash(&self, hash: &ContentHash) -> Result<Option<String>, CertError> {
            self.maybe_stall().await;
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|r| &r.content_hash == hash)
                .map(|r| r.certificate_id.clone()))
        }

        async fn certificate_count(&self) -> Result<u64, CertError> {
            self.maybe_stall().await;
            Ok(self.records.lock().unwrap().len() as u64)
        }

        async fn certificate_id_at(&self, index: u64) -> Result<String, CertError> {
            self.maybe_stall().await;
            self.track_in_flight().await;
            self.records
                .lock()
                .unwrap()
                .get(index as usize)
                .map(|r| r.certificate_id.clone())
                .ok_or_else(|| CertError::Upstream("index out of bounds".into()))
        }

        async fn network_info(&self) -> Result<NetworkInfo, CertError> {
            Ok(NetworkInfo {
                chain_id: 1337,
                latest_block: 12,
                account: "0x90f8bf6a479f320ead074411a4b0e7944ea8c9c1".into(),
                contract_address: "0x5fbdb2315678afecb367f032d93f642f64180aa3".into(),
            })
        }
    }

    fn options(retries: u32) -> LedgerOptions {
        LedgerOptions {
            call_timeout: Duration::from_millis(50),
            retry: RetryConfig {
                initial_delay: Duration::from_millis(1),
                ..RetryConfig::default().with_max_retries(retries)
            },
        }
    }

    fn record(id: &str, content: &[u8]) -> CertificateRecord {
        CertificateRecord::new(
            id,
            compute_hash(content),
            "John Doe",
            "Bachelor of Computer Science",
            Some("MIT".into()),
            IssueDate::from_unix(1_718_000_000),
        )
    }

    #[tokio::test]
    async fn test_put_and_lookup_through_contract() {
        let store = LedgerStore::new(FakeContract::default(), options(0));
        let cert = record("CERT-2024-001", b"diploma");

        let receipt = store.put(cert.clone()).await.unwrap();
        assert_eq!(receipt.block_number, Some(1));
        assert!(receipt.transaction_hash.is_some());

        assert_eq!(store.get_by_id("CERT-2024-001").await.unwrap(), Some(cert.clone()));
        assert_eq!(store.get_by_hash(&cert.content_hash).await.unwrap(), Some(cert));
        assert_eq!(store.get_by_id("CERT-2024-002").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_rejected_before_sending() {
        let store = LedgerStore::new(FakeContract::default(), options(0));
        store.put(record("CERT-2024-001", b"diploma")).await.unwrap();

        let result = store.put(record("CERT-2024-001", b"other")).await;
        assert!(matches!(result, Err(CertError::DuplicateId(_))));
        assert_eq!(store.contract.store_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_existing_id_reported_by_contract() {
        let contract = FakeContract {
            reports_exists: true,
            ..FakeContract::default()
        };
        let store = LedgerStore::new(contract, options(0));
        let result = store.put(record("CERT-2024-001", b"diploma")).await;
        assert!(matches!(result, Err(CertError::DuplicateId(_))));
        assert_eq!(store.contract.store_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_reverted_send_is_duplicate() {
        let contract = FakeContract {
            blind_prechecks: AtomicUsize::new(2),
            reverts_on_duplicate: true,
            ..FakeContract::default()
        };
        let store = LedgerStore::new(contract, options(0));

        let (first, second) = tokio::join!(
            store.put(record("CERT-RACE", b"first")),
            store.put(record("CERT-RACE", b"second"))
        );
        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            outcomes
                .iter()
                .filter(|r| matches!(r, Err(CertError::DuplicateId(id)) if id == "CERT-RACE"))
                .count(),
            1
        );
        assert_eq!(store.contract.store_calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reverted_send_for_new_id_stays_upstream() {
        let contract = FakeContract {
            always_reverts: true,
            ..FakeContract::default()
        };
        let store = LedgerStore::new(contract, options(0));
        let result = store.put(record("CERT-2024-001", b"diploma")).await;
        assert!(matches!(result, Err(CertError::Upstream(reason)) if reason.contains("reverted")));
    }

    #[tokio::test]
    async fn test_negative_issue_date_rejected() {
        let store = LedgerStore::new(FakeContract::default(), options(0));
        let mut cert = record("CERT-OLD", b"1969");
        cert.issue_date = IssueDate::from_unix(-1);
        assert!(matches!(store.put(cert).await, Err(CertError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_read_timeout_surfaces_as_upstream_timeout() {
        let contract = FakeContract {
            slow_reads: AtomicUsize::new(usize::MAX),
            ..FakeContract::default()
        };
        let store = LedgerStore::new(contract, options(0));
        let result = store.get_by_id("CERT-2024-001").await;
        assert!(matches!(result, Err(CertError::UpstreamTimeout(_))));
    }

    #[tokio::test]
    async fn test_read_timeout_is_retried() {
        let contract = FakeContract {
            slow_reads: AtomicUsize::new(2),
            ..FakeContract::default()
        };
        let store = LedgerStore::new(contract, options(2));
        assert_eq!(store.get_by_id("CERT-2024-001").await.unwrap(), None);
        assert_eq!(store.contract.read_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_write_timeout_is_not_retried() {
        let contract = FakeContract {
            slow_writes: true,
            ..FakeContract::default()
        };
        let store = LedgerStore::new(contract, options(3));
        let result = store.put(record("CERT-2024-001", b"diploma")).await;
        assert!(matches!(result, Err(CertError::UpstreamTimeout(_))));
        assert_eq!(store.contract.store_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_list_walks_indices_in_order() {
        let store = LedgerStore::new(FakeContract::default(), options(0));
        for id in ["CERT-B", "CERT-A", "CERT-C"] {
            store.put(record(id, id.as_bytes())).await.unwrap();
        }
        let ids: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.certificate_id)
            .collect();
        assert_eq!(ids, vec!["CERT-B", "CERT-A", "CERT-C"]);
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_list_bounds_concurrent_reads() {
        let store = LedgerStore::new(FakeContract::default(), options(0));
        let total = LIST_CONCURRENCY * 3;
        for n in 0..total {
            let id = format!("CERT-{:03}", n);
            store.put(record(&id, id.as_bytes())).await.unwrap();
        }

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), total);
        assert_eq!(listed[0].certificate_id, "CERT-000");
        assert_eq!(listed[total - 1].certificate_id, format!("CERT-{:03}", total - 1));

        let peak = store.contract.peak_in_flight.load(Ordering::SeqCst);
        assert!((2..=LIST_CONCURRENCY).contains(&peak), "peak in flight {}", peak);
    }

    #[tokio::test]
    async fn test_backend_info_reports_network() {
        let store = LedgerStore::new(FakeContract::default(), options(0));
        store.put(record("CERT-2024-001", b"diploma")).await.unwrap();
        let info = store.backend_info().await.unwrap();
        assert!(info.connected);
        assert_eq!(info.backend, "ledger");
        assert_eq!(info.chain_id, Some(1337));
        assert_eq!(info.certificate_count, 1);
    }
}
