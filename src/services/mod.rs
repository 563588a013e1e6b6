// src/services/mod.rs
//! Issuance, verification and the HTTP surface over them.

pub mod api_server;
pub mod issuer;
pub mod verifier;
