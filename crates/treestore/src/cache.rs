//! Object cache: record loading, write locks and the waiting set.
//!
//! A stored record is one baseline cell followed by the codec cells:
//!
//! ```text
//! | baseline stamp (u32 LE) | cell | cell | ... |
//! ```
//!
//! The baseline is the root's stamp, so unchanged subtrees pack without
//! timestamp cells. Saved records wait in memory until the waiting set is
//! flushed; a flush writes every waiting record exactly once, in address
//! order, in one batch.

use crate::codec::{self, CodecLimits, CELL_SIZE};
use crate::config::StoreConfig;
use crate::error::{CodecError, Result, StoreError};
use crate::key::{ClassId, Key};
use crate::storage::{RecordWrite, StorageBackend};
use crate::tree::Tree;
use log::{debug, warn};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Exclusive write access to one object.
///
/// Released when dropped.
pub struct WriteLock {
    key: Key,
    table: Arc<Mutex<HashSet<Key>>>,
}

impl WriteLock {
    /// Object the lock covers.
    pub fn key(&self) -> Key {
        self.key
    }
}

impl Drop for WriteLock {
    fn drop(&mut self) {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

impl fmt::Debug for WriteLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WriteLock").field(&self.key).finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Pending {
    Put(Vec<u8>),
    Delete,
}

/// Loads and stores object records on top of a [`StorageBackend`].
pub struct ObjectCache {
    backend: Mutex<Box<dyn StorageBackend>>,
    locks: Arc<Mutex<HashSet<Key>>>,
    waiting: Mutex<BTreeMap<Key, Pending>>,
    waiting_limit: usize,
    limits: CodecLimits,
}

impl ObjectCache {
    /// Create a cache over `backend`.
    pub fn new(backend: Box<dyn StorageBackend>, config: &StoreConfig) -> Self {
        Self {
            backend: Mutex::new(backend),
            locks: Arc::new(Mutex::new(HashSet::new())),
            waiting: Mutex::new(BTreeMap::new()),
            waiting_limit: config.waiting_set_limit.max(1),
            limits: CodecLimits {
                max_depth: config.max_nesting_depth,
                max_nodes: config.max_nodes_per_object,
            },
        }
    }

    /// Take the write lock of an object without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Locked`] if the object is already locked.
    pub fn lock(&self, key: Key) -> Result<WriteLock> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if !locks.insert(key) {
            return Err(StoreError::Locked { key });
        }
        Ok(WriteLock {
            key,
            table: Arc::clone(&self.locks),
        })
    }

    /// Whether an object is locked for write.
    pub fn is_locked(&self, key: Key) -> bool {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&key)
    }

    /// Decode an object, preferring its waiting record over storage.
    ///
    /// An object with no record decodes to a root-only tree.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Codec`] for malformed records and
    /// [`StoreError::Storage`] if the backend read fails.
    pub fn load(&self, key: Key) -> Result<Tree> {
        let waiting = self
            .waiting
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned();
        let record = match waiting {
            Some(Pending::Put(record)) => Some(record),
            Some(Pending::Delete) => None,
            None => self.backend().read(key)?,
        };
        match record {
            Some(record) => self.decode(key, &record),
            None => Tree::new(key, 0, self.limits.max_nodes),
        }
    }

    /// Whether an object has content, waiting or stored.
    pub fn exists(&self, key: Key) -> Result<bool> {
        let waiting = self
            .waiting
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .map(|pending| matches!(pending, Pending::Put(_)));
        match waiting {
            Some(exists) => Ok(exists),
            None => self.backend().contains(key),
        }
    }

    /// Encode a tree into the waiting set.
    ///
    /// A root-only tree is queued as a deletion. Returns whether the waiting
    /// set reached its limit and was flushed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StorageCorruption`] if sizing and encoding
    /// disagree; nothing is queued in that case.
    pub fn store(&self, tree: &Tree) -> Result<bool> {
        let key = tree.root_key();
        let pending = if tree.is_empty() {
            Pending::Delete
        } else {
            let baseline = tree.stamp(tree.root());
            let (cells, size) = codec::encode_with(tree, baseline, &self.limits)?;
            let mut record = Vec::with_capacity(CELL_SIZE + cells.len());
            record.extend_from_slice(&baseline.to_le_bytes());
            record.extend_from_slice(&cells);
            debug!(
                "Queued {} ({} cells, {} text bytes)",
                key, size.cells, size.bytes
            );
            Pending::Put(record)
        };

        let waiting_len = {
            let mut waiting = self.waiting.lock().unwrap_or_else(PoisonError::into_inner);
            waiting.insert(key, pending);
            waiting.len()
        };
        if waiting_len >= self.waiting_limit {
            debug!("Waiting set reached {} records", waiting_len);
            self.flush()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Queue the deletion of an object's record.
    pub fn remove(&self, key: Key) -> Result<()> {
        self.waiting
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, Pending::Delete);
        Ok(())
    }

    /// Number of records waiting to be written.
    pub fn pending(&self) -> usize {
        self.waiting
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Write the waiting set in address order and clear it.
    ///
    /// The backend stays locked from taking the set until the batch lands,
    /// so a concurrent load never reads a record older than one being
    /// flushed. Records queued during the write wait for the next flush. On
    /// failure the taken records are put back unless newer versions were
    /// queued meanwhile.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Storage`] if the batch fails.
    pub fn flush(&self) -> Result<usize> {
        let mut backend = self.backend();
        let taken = {
            let mut waiting = self.waiting.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *waiting)
        };
        if taken.is_empty() {
            return Ok(0);
        }

        let writes: Vec<RecordWrite> = taken
            .iter()
            .map(|(key, pending)| match pending {
                Pending::Put(record) => RecordWrite::Put {
                    key: *key,
                    record: record.clone(),
                },
                Pending::Delete => RecordWrite::Delete { key: *key },
            })
            .collect();

        if let Err(err) = backend.write_batch(&writes) {
            warn!("Flush of {} records failed; keeping them queued", taken.len());
            let mut waiting = self.waiting.lock().unwrap_or_else(PoisonError::into_inner);
            for (key, pending) in taken {
                waiting.entry(key).or_insert(pending);
            }
            return Err(err);
        }
        debug!("Flushed {} records", writes.len());
        Ok(writes.len())
    }

    /// Flush the backend's own buffers.
    pub fn sync(&self) -> Result<()> {
        self.backend().flush()
    }

    /// Keys of the stored and waiting objects of a class.
    pub fn keys_of_class(&self, class: ClassId) -> Result<Vec<Key>> {
        let mut keys: HashSet<Key> = self.backend().scan_class(class)?.into_iter().collect();
        let waiting = self.waiting.lock().unwrap_or_else(PoisonError::into_inner);
        for (key, pending) in waiting.iter().filter(|(key, _)| key.class() == class) {
            match pending {
                Pending::Put(_) => keys.insert(*key),
                Pending::Delete => keys.remove(key),
            };
        }
        let mut keys: Vec<Key> = keys.into_iter().collect();
        keys.sort();
        Ok(keys)
    }

    fn backend(&self) -> MutexGuard<'_, Box<dyn StorageBackend>> {
        self.backend.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn decode(&self, key: Key, record: &[u8]) -> Result<Tree> {
        if record.len() < CELL_SIZE {
            return Err(CodecError::Misaligned { len: record.len() }.into());
        }
        let (header, cells) = record.split_at(CELL_SIZE);
        let mut raw = [0u8; CELL_SIZE];
        raw.copy_from_slice(header);
        let baseline = u32::from_le_bytes(raw);
        codec::decode_with(cells, key, baseline, &self.limits)
    }
}

impl fmt::Debug for ObjectCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectCache")
            .field("pending", &self.pending())
            .field("waiting_limit", &self.waiting_limit)
            .finish()
    }
}
