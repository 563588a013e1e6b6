// src/utils/serialization.rs
//! Serialization utilities.
//!
//! Provides:
//! - JSON file reading/writing (deployment records, contract artifacts)
//! - Hex and base64 rendering of opaque byte strings
//! - Human-readable durations for API responses

use crate::error::CertError;
use ethers::utils::hex;
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use std::time::Duration;

/// Serializes a value to a pretty-printed JSON string.
pub fn serialize<T: Serialize>(data: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(data)
}

/// Deserializes a value from a JSON string.
pub fn deserialize<T: DeserializeOwned>(data: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(data)
}

/// Reads and deserializes a JSON file.
///
/// # Errors
/// - `CertError::Io` if the file cannot be read
/// - `CertError::Config` if the content is not the expected JSON shape
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T, CertError> {
    let content = std::fs::read_to_string(path)?;
    deserialize(&content)
        .map_err(|e| CertError::Config(format!("{}: {}", path.display(), e)))
}

/// Serializes a value into a JSON file, creating parent directories as needed.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<(), CertError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, serialize(value)?)?;
    Ok(())
}

/// `0x`-prefixed lowercase hex.
pub fn to_prefixed_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

pub fn to_base64(bytes: &[u8]) -> String {
    base64::encode(bytes)
}

/// Renders a duration in milliseconds with three decimals, e.g. `"0.041ms"`.
pub fn format_duration(duration: Duration) -> String {
    format!("{:.3}ms", duration.as_secs_f64() * 1_000.0)
}
