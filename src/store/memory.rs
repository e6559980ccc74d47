//! In-memory document store

use super::{DocumentStore, StoreError};
use crate::writer::WriteUnit;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Keeps every written batch in memory.
///
/// Failures can be injected per batch attempt to exercise error paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    batches: Mutex<Vec<Vec<WriteUnit>>>,
    failures: Mutex<HashMap<usize, String>>,
    attempts: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the `attempt`-th call to `write_batch` (0-based)
    pub fn fail_on_batch(self, attempt: usize, reason: impl Into<String>) -> Self {
        self.failures.lock().insert(attempt, reason.into());
        self
    }

    /// Number of successfully written batches
    pub fn batch_count(&self) -> usize {
        self.batches.lock().len()
    }

    /// Number of `write_batch` calls, including rejected ones
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Copy of every batch, in write order
    pub fn batches(&self) -> Vec<Vec<WriteUnit>> {
        self.batches.lock().clone()
    }

    /// Every written document, in write order
    pub fn documents(&self) -> Vec<WriteUnit> {
        self.batches.lock().iter().flatten().cloned().collect()
    }

    pub fn get(&self, uri: &str) -> Option<WriteUnit> {
        self.batches
            .lock()
            .iter()
            .flatten()
            .find(|unit| unit.uri == uri)
            .cloned()
    }

    /// Documents in a collection
    pub fn collection(&self, name: &str) -> Vec<WriteUnit> {
        self.batches
            .lock()
            .iter()
            .flatten()
            .filter(|unit| unit.metadata.collections.iter().any(|c| c == name))
            .cloned()
            .collect()
    }
}

impl DocumentStore for MemoryStore {
    fn write_batch(&self, units: &[WriteUnit]) -> Result<(), StoreError> {
        let attempt = self.attempts.fetch_add(1, Ordering::Relaxed);
        if let Some(reason) = self.failures.lock().get(&attempt) {
            return Err(StoreError::Rejected(reason.clone()));
        }
        self.batches.lock().push(units.to_vec());
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
