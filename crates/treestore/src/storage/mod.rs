//! Record storage abstractions and implementations.
//!
//! This module defines the [`StorageBackend`] trait and provides implementations:
//! - [`RocksDBBackend`]: persistent storage (feature `rocksdb-backend`)
//! - [`MemoryBackend`]: in-memory storage for tests and scratch stores
//!
//! A backend stores one opaque record per object, addressed by the object's
//! [`Key`]. The address bytes are the key in big-endian order, so the
//! backend's key order is the key order and every class is one contiguous
//! range.

mod memory;
#[cfg(feature = "rocksdb-backend")]
mod rocksdb_backend;

pub use memory::MemoryBackend;
#[cfg(feature = "rocksdb-backend")]
pub use rocksdb_backend::RocksDBBackend;

use crate::error::Result;
use crate::key::{ClassId, Key};

/// Trait defining the record storage interface.
///
/// All operations are explicit and return `Result`. Batches must be applied
/// atomically.
pub trait StorageBackend: Send + Sync {
    /// Read an object's record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Storage`](crate::StoreError::Storage) if the
    /// read fails. Returns `Ok(None)` if the object has no record.
    fn read(&self, key: Key) -> Result<Option<Vec<u8>>>;

    /// Check whether an object has a record.
    fn contains(&self, key: Key) -> Result<bool>;

    /// Keys of every stored object of a class, in address order.
    fn scan_class(&self, class: ClassId) -> Result<Vec<Key>>;

    /// Apply a batch of writes atomically, in the given order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Storage`](crate::StoreError::Storage) if the
    /// batch fails; nothing is applied in that case.
    fn write_batch(&mut self, writes: &[RecordWrite]) -> Result<()>;

    /// Flush buffered writes to durable storage.
    fn flush(&mut self) -> Result<()>;
}

/// One write of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordWrite {
    /// Store a record
    Put {
        /// Object the record belongs to
        key: Key,
        /// Encoded record
        record: Vec<u8>,
    },
    /// Remove a record
    Delete {
        /// Object whose record goes
        key: Key,
    },
}

impl RecordWrite {
    /// Object this write touches.
    pub fn key(&self) -> Key {
        match self {
            RecordWrite::Put { key, .. } | RecordWrite::Delete { key } => *key,
        }
    }
}
