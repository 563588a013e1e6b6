// src/zkp/mod.rs
//! Display-only proof artifacts.

pub mod proof_generation;
