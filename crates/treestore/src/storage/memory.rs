//! In-memory storage backend.
//!
//! All data is lost when the last clone of the backend is dropped.

use super::{RecordWrite, StorageBackend};
use crate::error::Result;
use crate::key::{ClassId, Key};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Default)]
struct MemoryState {
    records: BTreeMap<[u8; 4], Vec<u8>>,
    batches: Vec<Vec<Key>>,
}

/// In-memory storage backend using a BTreeMap.
///
/// Clones share the same data, so a test can keep one clone to inspect what
/// a store wrote through another. Every applied batch is logged in order.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryBackend {
    /// Create a new empty in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .len()
    }

    /// Whether no record is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys written by each applied batch, oldest first.
    pub fn batches(&self) -> Vec<Vec<Key>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .batches
            .clone()
    }
}

impl StorageBackend for MemoryBackend {
    fn read(&self, key: Key) -> Result<Option<Vec<u8>>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Ok(state.records.get(&key.to_address()).cloned())
    }

    fn contains(&self, key: Key) -> Result<bool> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Ok(state.records.contains_key(&key.to_address()))
    }

    fn scan_class(&self, class: ClassId) -> Result<Vec<Key>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let start = Key::class_marker(class).to_address();
        Ok(state
            .records
            .range(start..)
            .take_while(|(address, _)| address[0] == class)
            .filter_map(|(address, _)| Key::from_address(address))
            .collect())
    }

    fn write_batch(&mut self, writes: &[RecordWrite]) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        for write in writes {
            match write {
                RecordWrite::Put { key, record } => {
                    state.records.insert(key.to_address(), record.clone());
                }
                RecordWrite::Delete { key } => {
                    state.records.remove(&key.to_address());
                }
            }
        }
        state.batches.push(writes.iter().map(RecordWrite::key).collect());
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
