// src/services/verifier.rs
//! Certificate verification service.
//!
//! Answers "is this certificate genuine?" for three kinds of query: by
//! certificate ID, by content hash, or by re-uploading the document itself.
//! A document whose bytes changed after registration hashes differently and
//! is reported as tampered.

use crate::error::CertError;
use crate::models::certificate::{CertificateRecord, ContentHash};
use crate::storage::CertificateStore;
use crate::utils::crypto::compute_hash;
use log::{debug, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// What the caller wants verified.
#[derive(Debug, Clone)]
pub enum VerificationQuery {
    ById(String),
    ByHash(String),
    ByFile(Vec<u8>),
}

/// Why a well-formed query found nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mismatch {
    NotFound,
    /// The document hashes to nothing on record; it may have been altered.
    Tampered,
}

/// Outcome of a verification.
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationResult {
    Verified(CertificateRecord),
    NotVerified(Mismatch),
    InvalidInput(String),
}

impl VerificationResult {
    /// Message shown to the user for this outcome.
    pub fn message(&self) -> String {
        match self {
            VerificationResult::Verified(_) => "Certificate verified successfully".to_string(),
            VerificationResult::NotVerified(Mismatch::NotFound) => "Certificate not found".to_string(),
            VerificationResult::NotVerified(Mismatch::Tampered) => {
                CertError::TamperedContent.to_string()
            }
            VerificationResult::InvalidInput(reason) => reason.clone(),
        }
    }

    /// Collapses the outcome into the error taxonomy; only `Verified` is `Ok`.
    pub fn into_result(self) -> Result<CertificateRecord, CertError> {
        match self {
            VerificationResult::Verified(record) => Ok(record),
            VerificationResult::NotVerified(Mismatch::NotFound) => {
                Err(CertError::NotFound("Certificate".into()))
            }
            VerificationResult::NotVerified(Mismatch::Tampered) => Err(CertError::TamperedContent),
            VerificationResult::InvalidInput(reason) => Err(CertError::InvalidInput(reason)),
        }
    }
}

/// Point-in-time copy of the verification counters.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VerificationStats {
    pub total_verifications: u64,
    pub successful_verifications: u64,
    pub failed_verifications: u64,
    pub invalid_requests: u64,
}

impl VerificationStats {
    /// Percentage of well-formed queries that verified, 0 when none were made.
    pub fn success_rate(&self) -> f64 {
        let answered = self.successful_verifications + self.failed_verifications;
        if answered == 0 {
            return 0.0;
        }
        self.successful_verifications as f64 * 100.0 / answered as f64
    }
}

#[derive(Default)]
struct Counters {
    total: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
    invalid: AtomicU64,
}

/// Verification engine over any [`CertificateStore`].
pub struct Verifier {
    store: Arc<dyn CertificateStore>,
    counters: Counters,
}

impl Verifier {
    pub fn new(store: Arc<dyn CertificateStore>) -> Self {
        Self {
            store,
            counters: Counters::default(),
        }
    }

    /// Runs a query against the store.
    ///
    /// Misses and malformed input are reported through the returned
    /// [`VerificationResult`]; only store failures come back as `Err`.
    pub async fn verify(&self, query: VerificationQuery) -> Result<VerificationResult, CertError> {
        self.counters.total.fetch_add(1, Ordering::Relaxed);
        let result = self.run(query).await?;

        let counter = match &result {
            VerificationResult::Verified(_) => &self.counters.successful,
            VerificationResult::NotVerified(_) => &self.counters.failed,
            VerificationResult::InvalidInput(reason) => {
                warn!("rejected verification request: {}", reason);
                &self.counters.invalid
            }
        };
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(result)
    }

    async fn run(&self, query: VerificationQuery) -> Result<VerificationResult, CertError> {
        match query {
            VerificationQuery::ById(certificate_id) => {
                if certificate_id.trim().is_empty() {
                    return Ok(invalid("Certificate ID is required"));
                }
                debug!("verifying certificate {}", certificate_id);
                let found = self.store.get_by_id(&certificate_id).await?;
                Ok(found_or(found, Mismatch::NotFound))
            }
            VerificationQuery::ByHash(hash) => {
                if hash.trim().is_empty() {
                    return Ok(invalid("Certificate hash is required"));
                }
                let hash = match ContentHash::parse(&hash) {
                    Ok(hash) => hash,
                    Err(err) => return Ok(VerificationResult::InvalidInput(err.to_string())),
                };
                debug!("verifying hash {}", hash);
                let found = self.store.get_by_hash(&hash).await?;
                Ok(found_or(found, Mismatch::NotFound))
            }
            VerificationQuery::ByFile(content) => {
                if content.is_empty() {
                    return Ok(invalid("No file provided"));
                }
                let hash = compute_hash(&content);
                debug!("verifying uploaded document with hash {}", hash);
                let found = self.store.get_by_hash(&hash).await?;
                Ok(found_or(found, Mismatch::Tampered))
            }
        }
    }

    /// Plain ID lookup that does not count towards verification statistics.
    pub async fn lookup(&self, certificate_id: &str) -> Result<CertificateRecord, CertError> {
        self.run(VerificationQuery::ById(certificate_id.to_string()))
            .await?
            .into_result()
    }

    pub fn stats(&self) -> VerificationStats {
        VerificationStats {
            total_verifications: self.counters.total.load(Ordering::Relaxed),
            successful_verifications: self.counters.successful.load(Ordering::Relaxed),
            failed_verifications: self.counters.failed.load(Ordering::Relaxed),
            invalid_requests: self.counters.invalid.load(Ordering::Relaxed),
        }
    }
}

fn invalid(reason: &str) -> VerificationResult {
    VerificationResult::InvalidInput(reason.to_string())
}

fn found_or(found: Option<CertificateRecord>, miss: Mismatch) -> VerificationResult {
    match found {
        Some(record) => VerificationResult::Verified(record),
        None => VerificationResult::NotVerified(miss),
    }
}
