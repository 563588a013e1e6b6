// src/models/certificate.rs
//! Certificate record data model.
//!
//! Defines the canonical stored representation of one issued certificate,
//! together with the two value types whose canonical form matters for lookups:
//! [`ContentHash`] (lowercase SHA-256 hex) and [`IssueDate`] (Unix seconds).

use crate::error::CertError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Institution recorded when the issuer leaves the field empty.
pub const UNKNOWN_INSTITUTION: &str = "Unknown Institution";

/// Verification status of a stored certificate.
///
/// Anything written through a store is `Verified`; storing is the act of
/// verification. `Pending` exists for records staged outside the store.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CertificateStatus {
    Pending,
    Verified,
}

/// SHA-256 digest of a certificate document, as 64 lowercase hex characters.
///
/// Parsing accepts an optional `0x` prefix and any letter case, so lookups by
/// hash are case-insensitive by construction.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Hex length of a 256-bit digest.
    pub const HEX_LEN: usize = 64;

    pub fn parse(input: &str) -> Result<Self, CertError> {
        let trimmed = input.trim();
        let hex = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if hex.len() != Self::HEX_LEN || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CertError::invalid(format!(
                "Certificate hash must be {} hexadecimal characters",
                Self::HEX_LEN
            )));
        }
        Ok(ContentHash(hex.to_ascii_lowercase()))
    }

    pub fn from_digest(digest: [u8; 32]) -> Self {
        ContentHash(ethers::utils::hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `0x`-prefixed form, as shown to users.
    pub fn to_prefixed(&self) -> String {
        format!("0x{}", self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContentHash {
    type Err = CertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContentHash::parse(s)
    }
}

impl TryFrom<String> for ContentHash {
    type Error = CertError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ContentHash::parse(&value)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

/// Point in time a certificate was issued, in whole Unix seconds (UTC).
///
/// This is the only representation that is ever stored. Date strings coming
/// from forms are converted once, at the boundary, by [`IssueDate::parse`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct IssueDate(i64);

impl IssueDate {
    pub fn from_unix(seconds: i64) -> Self {
        IssueDate(seconds)
    }

    pub fn now() -> Self {
        IssueDate(Utc::now().timestamp())
    }

    pub fn as_unix(&self) -> i64 {
        self.0
    }

    /// Parses a boundary representation into the canonical timestamp.
    ///
    /// Accepted forms, tried in order:
    /// - integer Unix seconds (`1718000000`)
    /// - RFC 3339 (`2024-06-15T10:00:00+02:00`)
    /// - ISO datetime without offset, taken as UTC (`2024-06-15T10:00:00`)
    /// - calendar date, midnight UTC (`2024-06-15`)
    pub fn parse(input: &str) -> Result<Self, CertError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(CertError::invalid("Issue date is required"));
        }

        if let Ok(seconds) = input.parse::<i64>() {
            return Ok(IssueDate(seconds));
        }
        if let Ok(datetime) = DateTime::parse_from_rfc3339(input) {
            return Ok(IssueDate(datetime.timestamp()));
        }
        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
                return Ok(IssueDate(naive.and_utc().timestamp()));
            }
        }
        if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
            if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
                return Ok(IssueDate(midnight.and_utc().timestamp()));
            }
        }

        Err(CertError::invalid("Invalid date format"))
    }

}

/// The canonical stored representation of one issued certificate.
///
/// # Fields
/// - `certificate_id`: unique across the store, stable for the record's lifetime
/// - `content_hash`: SHA-256 of the certificate document
/// - `holder_name` / `certificate_type`: required, non-empty
/// - `institution`: defaults to [`UNKNOWN_INSTITUTION`]
/// - `issue_date`: canonical Unix timestamp
/// - `registered_at`: Unix seconds at which the store accepted the record, 0 before that
/// - `issuer`: ledger account that wrote the record, if any
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRecord {
    pub certificate_id: String,
    pub content_hash: ContentHash,
    pub holder_name: String,
    pub certificate_type: String,
    pub institution: String,
    pub issue_date: IssueDate,
    pub status: CertificateStatus,
    pub registered_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
}

impl CertificateRecord {
    /// Builds a verified record, applying the institution default.
    pub fn new(
        certificate_id: impl Into<String>,
        content_hash: ContentHash,
        holder_name: impl Into<String>,
        certificate_type: impl Into<String>,
        institution: Option<String>,
        issue_date: IssueDate,
    ) -> Self {
        let institution = institution
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| UNKNOWN_INSTITUTION.to_string());

        CertificateRecord {
            certificate_id: certificate_id.into().trim().to_string(),
            content_hash,
            holder_name: holder_name.into().trim().to_string(),
            certificate_type: certificate_type.into().trim().to_string(),
            institution,
            issue_date,
            status: CertificateStatus::Verified,
            registered_at: 0,
            issuer: None,
        }
    }

    /// Checks the invariants every store enforces before accepting a record.
    pub fn validate(&self) -> Result<(), CertError> {
        if self.certificate_id.trim().is_empty() {
            return Err(CertError::invalid("Certificate ID is required"));
        }
        if self.holder_name.trim().is_empty() {
            return Err(CertError::invalid("Holder name is required"));
        }
        if self.certificate_type.trim().is_empty() {
            return Err(CertError::invalid("Certificate type is required"));
        }
        Ok(())
    }

    /// Length-prefixed encoding of the identifying fields.
    ///
    /// Stable across processes; `status`, `registered_at` and `issuer` are
    /// bookkeeping and deliberately excluded.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(256);
        for field in [
            self.certificate_id.as_bytes(),
            self.content_hash.as_str().as_bytes(),
            self.holder_name.as_bytes(),
            self.certificate_type.as_bytes(),
            self.institution.as_bytes(),
        ] {
            out.extend_from_slice(&(field.len() as u32).to_be_bytes());
            out.extend_from_slice(field);
        }
        out.extend_from_slice(&self.issue_date.as_unix().to_be_bytes());
        out
    }
}
