// src/storage/memory.rs
//! In-memory certificate storage.
//!
//! Records live in an append-only arena (`Vec`) with two indexes on top:
//! certificate ID → slot and content hash → slots. A single `RwLock` guards
//! all three, so the duplicate check and the insert happen under one write
//! guard and readers never observe a half-indexed record.

use super::{BackendInfo, CertificateStore, InsertReceipt};
use crate::error::CertError;
use crate::models::certificate::{CertificateRecord, ContentHash};
use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct Arena {
    records: Vec<CertificateRecord>,
    by_id: HashMap<String, usize>,
    by_hash: HashMap<ContentHash, Vec<usize>>,
}

/// Thread-safe in-memory certificate store.
#[derive(Default)]
pub struct InMemoryStore {
    arena: RwLock<Arena>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Writers never leave the arena half-updated, so a poisoned lock still
    // guards consistent data.
    fn read(&self) -> RwLockReadGuard<'_, Arena> {
        self.arena.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Arena> {
        self.arena.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts a record, rejecting duplicate certificate IDs.
    ///
    /// # Behavior
    /// - Validates the record before taking the lock
    /// - Never overwrites an existing record
    /// - Stamps `registered_at` with the acceptance time
    pub fn insert(&self, mut record: CertificateRecord) -> Result<(), CertError> {
        record.validate()?;

        let mut arena = self.write();
        let slot = arena.records.len();
        match arena.by_id.entry(record.certificate_id.clone()) {
            Entry::Occupied(_) => return Err(CertError::DuplicateId(record.certificate_id)),
            Entry::Vacant(entry) => {
                entry.insert(slot);
            }
        }
        record.registered_at = Utc::now().timestamp();
        arena
            .by_hash
            .entry(record.content_hash.clone())
            .or_default()
            .push(slot);
        debug!("stored certificate {} in slot {}", record.certificate_id, slot);
        arena.records.push(record);
        Ok(())
    }

    /// Retrieves a copy of the record with this ID.
    pub fn find_by_id(&self, certificate_id: &str) -> Option<CertificateRecord> {
        let arena = self.read();
        arena
            .by_id
            .get(certificate_id)
            .map(|&slot| arena.records[slot].clone())
    }

    /// Most recently inserted record carrying this hash.
    pub fn find_by_hash(&self, hash: &ContentHash) -> Option<CertificateRecord> {
        let arena = self.read();
        arena
            .by_hash
            .get(hash)
            .and_then(|slots| slots.last())
            .map(|&slot| arena.records[slot].clone())
    }

    pub fn snapshot(&self) -> Vec<CertificateRecord> {
        self.read().records.clone()
    }

    pub fn len(&self) -> usize {
        self.read().records.len()
    }
}

#[async_trait]
impl CertificateStore for InMemoryStore {
    async fn put(&self, record: CertificateRecord) -> Result<InsertReceipt, CertError> {
        self.insert(record)?;
        Ok(InsertReceipt::default())
    }

    async fn get_by_id(&self, certificate_id: &str) -> Result<Option<CertificateRecord>, CertError> {
        Ok(self.find_by_id(certificate_id))
    }

    async fn get_by_hash(&self, hash: &ContentHash) -> Result<Option<CertificateRecord>, CertError> {
        Ok(self.find_by_hash(hash))
    }

    async fn list(&self) -> Result<Vec<CertificateRecord>, CertError> {
        Ok(self.snapshot())
    }

    async fn count(&self) -> Result<usize, CertError> {
        Ok(self.len())
    }

    async fn backend_info(&self) -> Result<BackendInfo, CertError> {
        Ok(BackendInfo {
            backend: "memory",
            connected: false,
            chain_id: None,
            latest_block: None,
            account: None,
            contract_address: None,
            certificate_count: self.len(),
        })
    }
}
