//! RocksDB storage backend for persistent stores.
//!
//! Batches go through a single `WriteBatch`, so a flushed waiting set lands
//! atomically and the write-ahead log recovers it after a crash.

use super::{RecordWrite, StorageBackend};
use crate::error::{Result, StoreError};
use crate::key::{ClassId, Key};
use rocksdb::{Options, WriteBatch, DB};
use std::path::Path;
use std::sync::Arc;

/// RocksDB-backed persistent record storage.
#[derive(Clone)]
pub struct RocksDBBackend {
    db: Arc<DB>,
}

impl RocksDBBackend {
    /// Open or create a RocksDB database at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Storage`] if the database cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        Self::open_with_options(path, opts)
    }

    /// Open a RocksDB database with custom options.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Storage`] if the database cannot be opened.
    pub fn open_with_options<P: AsRef<Path>>(path: P, opts: Options) -> Result<Self> {
        let db = DB::open(&opts, path.as_ref()).map_err(|e| {
            StoreError::storage(
                format!("Failed to open RocksDB at {:?}", path.as_ref()),
                Some(e),
            )
        })?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Underlying database handle.
    pub fn db(&self) -> &Arc<DB> {
        &self.db
    }
}

impl StorageBackend for RocksDBBackend {
    fn read(&self, key: Key) -> Result<Option<Vec<u8>>> {
        self.db
            .get(key.to_address())
            .map_err(|e| StoreError::storage(format!("Failed to read object {key}"), Some(e)))
    }

    fn contains(&self, key: Key) -> Result<bool> {
        self.read(key).map(|record| record.is_some())
    }

    fn scan_class(&self, class: ClassId) -> Result<Vec<Key>> {
        let mut keys = Vec::new();
        for item in self.db.prefix_iterator([class]) {
            let (address, _) = item
                .map_err(|e| StoreError::storage("Failed to iterate over class", Some(e)))?;

            // The prefix iterator may run past the prefix without a prefix extractor
            if address.first() != Some(&class) {
                break;
            }
            if let Some(key) = Key::from_address(&address) {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    fn write_batch(&mut self, writes: &[RecordWrite]) -> Result<()> {
        let mut batch = WriteBatch::default();

        for write in writes {
            match write {
                RecordWrite::Put { key, record } => batch.put(key.to_address(), record),
                RecordWrite::Delete { key } => batch.delete(key.to_address()),
            }
        }

        self.db
            .write(batch)
            .map_err(|e| StoreError::storage("Failed to write batch", Some(e)))
    }

    fn flush(&mut self) -> Result<()> {
        self.db
            .flush()
            .map_err(|e| StoreError::storage("Failed to flush database", Some(e)))
    }
}
