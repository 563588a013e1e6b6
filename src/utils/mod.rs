// src/utils/mod.rs
//! Helper functions.

pub mod crypto;
pub mod id;
pub mod retry;
pub mod serialization;
