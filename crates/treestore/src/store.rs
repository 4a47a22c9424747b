//! Main ObjectStore interface.

use crate::cache::ObjectCache;
use crate::clock::{SessionClock, StampSource};
use crate::config::StoreConfig;
use crate::constraint::{AcceptAll, ConstraintCheck};
use crate::error::Result;
use crate::handle::{HandleContext, ObjectHandle};
use crate::key::{ClassId, Key};
use crate::lexicon::Lexicon;
use crate::schema::SchemaRegistry;
use crate::storage::StorageBackend;
use crate::xref::{self, SaveReport};
use log::{debug, info, trace, warn};
use std::fmt;
use std::sync::Arc;

/// The object database.
///
/// `ObjectStore` ties a storage backend, the schema registry and the
/// lexicon together. Objects are opened as [`ObjectHandle`]s, edited and
/// handed back to [`save`](Self::save), which also applies the reciprocal
/// edits the handle queued.
pub struct ObjectStore {
    cache: ObjectCache,
    registry: Arc<SchemaRegistry>,
    lexicon: Arc<dyn Lexicon>,
    clock: Arc<dyn StampSource>,
    constraints: Arc<dyn ConstraintCheck>,
    config: StoreConfig,
}

impl ObjectStore {
    /// Open a store over the given storage backend.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SchemaAuthoring`](crate::StoreError::SchemaAuthoring) if
    /// the built-in models cannot be registered with `lexicon`.
    pub fn with_backend(
        backend: Box<dyn StorageBackend>,
        lexicon: Arc<dyn Lexicon>,
        config: StoreConfig,
    ) -> Result<Self> {
        let registry = SchemaRegistry::new(Arc::clone(&lexicon))?;
        Ok(Self {
            cache: ObjectCache::new(backend, &config),
            registry: Arc::new(registry),
            lexicon,
            clock: Arc::new(SessionClock::default()),
            constraints: Arc::new(AcceptAll),
            config,
        })
    }

    /// Open a persistent store at the given path.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use std::sync::Arc;
    /// use treestore::{MemoryLexicon, ObjectStore, StoreConfig};
    ///
    /// let lexicon = Arc::new(MemoryLexicon::new());
    /// let store = ObjectStore::open("./genome.db", lexicon,
    /// StoreConfig::default()).unwrap();
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Storage`](crate::StoreError::Storage) if the database
    /// cannot be opened.
    #[cfg(feature = "rocksdb-backend")]
    pub fn open<P: AsRef<std::path::Path>>(
        path: P,
        lexicon: Arc<dyn Lexicon>,
        config: StoreConfig,
    ) -> Result<Self> {
        use crate::storage::RocksDBBackend;
        info!("Opening store at path: {:?}", path.as_ref());
        let backend = RocksDBBackend::open(path)?;
        Self::with_backend(Box::new(backend), lexicon, config)
    }

    /// Create an in-memory store with the default configuration.
    ///
    /// **Warning**: All data is lost when the store is dropped.
    pub fn in_memory(lexicon: Arc<dyn Lexicon>) -> Result<Self> {
        use crate::storage::MemoryBackend;
        Self::with_backend(
            Box::new(MemoryBackend::new()),
            lexicon,
            StoreConfig::default(),
        )
    }

    /// Replace the stamp source used for new nodes.
    pub fn with_clock(mut self, clock: Arc<dyn StampSource>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the hook that checks values against `Constraint` markers.
    pub fn with_constraints(mut self, constraints: Arc<dyn ConstraintCheck>) -> Self {
        self.constraints = constraints;
        self
    }

    /// Parse and register models from text. Returns the model keys.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SchemaAuthoring`](crate::StoreError::SchemaAuthoring) or
    /// [`StoreError::UnknownName`](crate::StoreError::UnknownName) for malformed model
    /// text.
    pub fn load_models(&self, text: &str) -> Result<Vec<Key>> {
        self.registry.load_models(text)
    }

    /// Schema registry.
    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// Name table.
    pub fn lexicon(&self) -> &Arc<dyn Lexicon> {
        &self.lexicon
    }

    /// Active configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Record cache.
    pub fn cache(&self) -> &ObjectCache {
        &self.cache
    }

    /// Open an object for reading. Aliases are followed.
    ///
    /// An object with no record opens as a root-only tree.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SchemaNotFound`](crate::StoreError::SchemaNotFound) if the
    /// object's class has no model and [`StoreError::Codec`](crate::StoreError::Codec)
    /// if its record is malformed.
    pub fn open_read(&self, key: Key) -> Result<ObjectHandle> {
        let key = self.lexicon.resolve(key);
        let tree = self.cache.load(key)?;
        debug!("Opened {} for read ({} nodes)", key, tree.len());
        ObjectHandle::new(tree, self.context(), None)
    }

    /// Open an object for writing, creating it if it has no record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Locked`](crate::StoreError::Locked) if another handle
    /// holds the object, plus the errors of [`open_read`](Self::open_read).
    pub fn open_write(&self, key: Key) -> Result<ObjectHandle> {
        let key = self.lexicon.resolve(key);
        let lock = self.cache.lock(key)?;
        let tree = self.cache.load(key)?;
        debug!("Opened {} for write ({} nodes)", key, tree.len());
        ObjectHandle::new(tree, self.context(), Some(lock))
    }

    /// Whether an object has a record, waiting or stored.
    pub fn exists(&self, key: Key) -> Result<bool> {
        self.cache.exists(self.lexicon.resolve(key))
    }

    /// Keys of every object of a class, waiting records included.
    pub fn keys_of_class(&self, class: ClassId) -> Result<Vec<Key>> {
        self.cache.keys_of_class(class)
    }

    /// Save a handle and apply the reciprocal edits it queued.
    ///
    /// The handle's own record goes into the waiting set first and its lock
    /// is released. Each queued edit then opens its target for write,
    /// applies the mirrored edit and saves the target if it changed.
    /// Targets that are locked, reject the edit, or sit deeper than
    /// [`StoreConfig::max_xref_depth`] are skipped with a warning; the
    /// primary save stands regardless.
    ///
    /// Saving a read handle is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StorageCorruption`](crate::StoreError::StorageCorruption)
    /// or [`StoreError::Storage`](crate::StoreError::Storage) if the handle's own
    /// record cannot be written, and any unrecoverable error met while opening
    /// or editing a target. The handle's own record is already in the waiting
    /// set by then.
    pub fn save(&self, handle: ObjectHandle) -> Result<SaveReport> {
        self.save_inner(handle, 0)
    }

    /// Drop a handle without writing, releasing its lock.
    pub fn discard(&self, handle: ObjectHandle) {
        if handle.is_modified() {
            debug!("Discarding edits to {}", handle.key());
        }
    }

    /// Remove an object, detaching it from everything that refers to it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Locked`](crate::StoreError::Locked) if the object is open
    /// for write.
    pub fn delete(&self, key: Key) -> Result<SaveReport> {
        let mut handle = self.open_write(key)?;
        handle.clear()?;
        self.save(handle)
    }

    /// Write the waiting set to the backend. Returns the records written.
    pub fn flush(&self) -> Result<usize> {
        debug!("Flushing store");
        let written = self.cache.flush()?;
        trace!("Flush complete ({} records)", written);
        Ok(written)
    }

    /// Close the store and ensure all data is persisted.
    pub fn close(self) -> Result<()> {
        self.flush()?;
        self.cache.sync()?;
        info!("Store closed");
        Ok(())
    }

    fn context(&self) -> HandleContext {
        HandleContext {
            registry: Arc::clone(&self.registry),
            lexicon: Arc::clone(&self.lexicon),
            constraints: Arc::clone(&self.constraints),
            stamp: self.clock.current_stamp(),
            float_epsilon: self.config.float_epsilon,
            max_depth: self.config.max_nesting_depth,
        }
    }

    fn save_inner(&self, handle: ObjectHandle, depth: usize) -> Result<SaveReport> {
        let key = handle.key();
        let (tree, edits, lock, modified) = handle.into_parts();
        let mut report = SaveReport::default();
        if lock.is_none() {
            return Ok(report);
        }

        if modified {
            self.cache.store(&tree)?;
            report.written += 1;
            debug!("Saved {} ({} nodes)", key, tree.len());
        }
        drop(lock);

        if !self.config.xref_enabled {
            return Ok(report);
        }
        for edit in &edits {
            if depth >= self.config.max_xref_depth {
                warn!(
                    "Dropping cross-reference to {}: chain deeper than {}",
                    edit.target, self.config.max_xref_depth
                );
                report.xrefs_dropped += 1;
                continue;
            }
            let mut target = match self.open_write(edit.target) {
                Ok(target) => target,
                Err(e) if !e.is_recoverable() => return Err(e),
                Err(e) => {
                    warn!("Dropping cross-reference to {}: {}", edit.target, e);
                    report.xrefs_dropped += 1;
                    continue;
                }
            };
            if let Err(e) = xref::apply(&mut target, edit) {
                if !e.is_recoverable() {
                    return Err(e);
                }
                warn!("Dropping cross-reference to {}: {}", edit.target, e);
                report.xrefs_dropped += 1;
                continue;
            }
            report.xrefs_applied += 1;
            trace!(
                "Applied cross-reference {} {} on {}",
                if edit.delete { "removal" } else { "add" },
                edit.value,
                edit.target
            );
            if target.is_modified() {
                report.absorb(self.save_inner(target, depth + 1)?);
            }
        }
        Ok(report)
    }
}

impl fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStore")
            .field("cache", &self.cache)
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish()
    }
}
