// src/error.rs
//! Error taxonomy shared by the store, the services and the ledger adapter.
//!
//! Library code returns [`CertError`]; the binary edge (startup, CLI) wraps it
//! in `anyhow`, and the HTTP layer maps it onto status codes.

use std::time::Duration;
use thiserror::Error;

/// Every failure the certificate core can report.
#[derive(Debug, Error)]
pub enum CertError {
    /// A record with this certificate ID is already stored.
    #[error("Certificate with ID {0} already exists")]
    DuplicateId(String),

    /// Lookup miss.
    #[error("{0} not found")]
    NotFound(String),

    /// Empty or malformed query, or a missing required field.
    #[error("{0}")]
    InvalidInput(String),

    /// The ledger did not answer within the configured call timeout.
    #[error("Ledger did not respond within {0:?}")]
    UpstreamTimeout(Duration),

    /// An uploaded document hashes to nothing the store knows about.
    #[error("Certificate not found or has been tampered with")]
    TamperedContent,

    /// Any other ledger/transport failure.
    #[error("Ledger error: {0}")]
    Upstream(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CertError {
    /// Only timeouts are worth retrying; everything else would fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CertError::UpstreamTimeout(_))
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        CertError::InvalidInput(reason.into())
    }
}

impl From<serde_json::Error> for CertError {
    fn from(err: serde_json::Error) -> Self {
        CertError::Config(format!("invalid JSON: {}", err))
    }
}
