// src/contracts/mod.rs
//! Typed wrappers over deployed smart contracts.

pub mod certificate_verifier;
