// src/utils/crypto.rs
//! Content hashing for tamper detection.
//!
//! Uses SHA-256 (via `ring`) over the raw certificate bytes, so that
//! re-uploading identical content reproduces the identical hash and any
//! single-bit change produces a different one.

use crate::models::certificate::ContentHash;
use ring::digest::{digest, Context, SHA256};

/// Computes a SHA-256 hash of the input data.
///
/// # Arguments
/// * `data` - Binary data to hash (as bytes slice)
///
/// # Returns
/// Fixed-size 32-byte array (`[u8; 32]`) containing the hash.
pub fn hash_data(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(digest(&SHA256, data).as_ref());
    out
}

/// SHA-256 over several byte strings fed in order, without concatenating them first.
pub fn hash_parts(parts: &[&[u8]]) -> [u8; 32] {
    let mut context = Context::new(&SHA256);
    for part in parts {
        context.update(part);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(context.finish().as_ref());
    out
}

/// Derives the content hash of a certificate document.
pub fn compute_hash(content: &[u8]) -> ContentHash {
    ContentHash::from_digest(hash_data(content))
}
