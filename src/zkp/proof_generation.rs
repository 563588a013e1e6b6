// src/zkp/proof_generation.rs
//! Proof artifact generation.
//!
//! Produces an opaque, display-only proof blob for a stored certificate. The
//! blob is a salted SHA-256 commitment to the record, not a zero-knowledge
//! proof; it carries no soundness claim and nothing ever verifies it.
//!
//! Layout (96 bytes):
//! - `nonce`: 32 random bytes
//! - `commitment`: SHA-256(domain ‖ nonce ‖ canonical record bytes)
//! - `binding`: SHA-256(domain ‖ commitment ‖ timestamp)

use crate::models::certificate::CertificateRecord;
use crate::models::proof::{ProofArtifact, PublicInputs};
use crate::utils::crypto::hash_parts;
use chrono::Utc;
use log::debug;
use rand::rngs::OsRng;
use rand::RngCore;
use std::time::Instant;

/// Label reported alongside every artifact.
pub const PROOF_SYSTEM: &str = "sha256-commitment";

const DOMAIN: &[u8] = b"cert-verifier/proof/v1";
const NONCE_LEN: usize = 32;

/// Size in bytes of every generated proof.
pub const PROOF_LEN: usize = NONCE_LEN + 32 + 32;

#[derive(Debug, Default, Clone, Copy)]
pub struct ProofGenerator;

impl ProofGenerator {
    pub fn new() -> Self {
        ProofGenerator
    }

    pub fn generate(&self, record: &CertificateRecord) -> ProofArtifact {
        let started = Instant::now();
        let timestamp = Utc::now().timestamp();

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let canonical = record.canonical_bytes();
        let commitment = hash_parts(&[DOMAIN, &nonce, &canonical]);
        let binding = hash_parts(&[DOMAIN, &commitment, &timestamp.to_be_bytes()]);

        let mut proof = Vec::with_capacity(PROOF_LEN);
        proof.extend_from_slice(&nonce);
        proof.extend_from_slice(&commitment);
        proof.extend_from_slice(&binding);

        let generation_time = started.elapsed();
        debug!(
            "generated proof artifact for {} in {:?}",
            record.certificate_id, generation_time
        );

        ProofArtifact {
            proof,
            generation_time,
            public_inputs: PublicInputs {
                certificate_id: record.certificate_id.clone(),
                timestamp,
            },
            proof_system: PROOF_SYSTEM,
        }
    }
}
