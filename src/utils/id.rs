// src/utils/id.rs
//! Certificate ID generation.

use chrono::{Datelike, Utc};
use rand::Rng;
use std::sync::atomic::{AtomicI64, Ordering};

/// Generates `CERT-{year}-{millis:X}-{suffix:04X}` identifiers.
///
/// The millisecond component never repeats within one generator, even if the
/// wall clock stalls or steps backwards, so IDs from the same process cannot
/// collide. The random suffix keeps separate processes apart. Callers still
/// go through the store's duplicate check.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last_millis: AtomicI64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate(&self) -> String {
        let now = Utc::now();
        let millis = self.next_millis(now.timestamp_millis());
        let suffix: u16 = rand::thread_rng().gen();
        format!("CERT-{}-{:X}-{:04X}", now.year(), millis, suffix)
    }

    fn next_millis(&self, now: i64) -> i64 {
        let mut previous = self.last_millis.load(Ordering::Relaxed);
        loop {
            let next = now.max(previous + 1);
            match self.last_millis.compare_exchange_weak(
                previous,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(actual) => previous = actual,
            }
        }
    }
}
