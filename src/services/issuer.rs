// src/services/issuer.rs
//! Certificate issuance service.
//!
//! Turns a submitted document plus its metadata into a stored
//! [`CertificateRecord`]: hashes the document, assigns an ID when the caller
//! did not supply one, validates, and writes through the configured store.

use crate::error::CertError;
use crate::models::certificate::{CertificateRecord, IssueDate};
use crate::storage::{CertificateStore, InsertReceipt};
use crate::utils::crypto::compute_hash;
use crate::utils::id::IdGenerator;
use log::{info, warn};
use std::sync::Arc;

/// Everything needed to register one certificate.
#[derive(Debug, Clone)]
pub struct IssueRequest {
    /// Generated when `None` or blank.
    pub certificate_id: Option<String>,
    pub holder_name: String,
    pub certificate_type: String,
    pub institution: Option<String>,
    pub issue_date: IssueDate,
    /// Raw document bytes; the content hash is derived from these.
    pub content: Vec<u8>,
}

/// A stored record together with what the store reported for the write.
#[derive(Debug, Clone)]
pub struct IssuedCertificate {
    pub record: CertificateRecord,
    pub receipt: InsertReceipt,
}

/// Service that registers certificates.
pub struct CertificateIssuer {
    store: Arc<dyn CertificateStore>,
    ids: Arc<IdGenerator>,
}

impl CertificateIssuer {
    pub fn new(store: Arc<dyn CertificateStore>, ids: Arc<IdGenerator>) -> Self {
        Self { store, ids }
    }

    /// Registers a certificate.
    ///
    /// # Errors
    /// - `CertError::InvalidInput` for an empty document or a missing required field
    /// - `CertError::DuplicateId` if the (supplied) ID is already stored
    /// - ledger errors from the underlying store
    pub async fn issue(&self, request: IssueRequest) -> Result<IssuedCertificate, CertError> {
        if request.content.is_empty() {
            return Err(CertError::invalid("No file provided"));
        }

        let certificate_id = match request.certificate_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => self.ids.generate(),
        };

        let record = CertificateRecord::new(
            certificate_id,
            compute_hash(&request.content),
            request.holder_name,
            request.certificate_type,
            request.institution,
            request.issue_date,
        );
        record.validate()?;

        let receipt = match self.store.put(record.clone()).await {
            Ok(receipt) => receipt,
            Err(err) => {
                warn!("failed to store certificate {}: {}", record.certificate_id, err);
                return Err(err);
            }
        };

        info!(
            "Issued certificate {} for {} (hash {})",
            record.certificate_id, record.holder_name, record.content_hash
        );
        Ok(IssuedCertificate { record, receipt })
    }
}
