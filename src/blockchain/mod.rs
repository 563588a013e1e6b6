// src/blockchain/mod.rs
//! EVM ledger connectivity and contract deployment.

pub mod deployment;
pub mod ledger_client;
