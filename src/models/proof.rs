// src/models/proof.rs
//! Proof artifact attached to a verification response.

use serde::Serialize;
use std::time::Duration;

/// Public values a proof artifact is bound to.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublicInputs {
    pub certificate_id: String,
    /// Unix seconds at which the artifact was produced.
    pub timestamp: i64,
}

/// Opaque, display-only stand-in for a zero-knowledge proof.
///
/// Created per request, never persisted, never mutated. Two artifacts for
/// the same record differ because each one commits to a fresh nonce.
#[derive(Debug, Clone)]
pub struct ProofArtifact {
    pub proof: Vec<u8>,
    pub generation_time: Duration,
    pub public_inputs: PublicInputs,
    pub proof_system: &'static str,
}

impl ProofArtifact {
    pub fn proof_size(&self) -> usize {
        self.proof.len()
    }
}
