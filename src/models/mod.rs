// src/models/mod.rs
//! Data structures shared by the store, the services and the API.

pub mod certificate;
pub mod proof;
