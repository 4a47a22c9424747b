//! # treestore
//!
//! Schema-driven storage of tree-shaped objects, as used by genome
//! databases: every object is a small tree of tags, values and references
//! to other objects, validated against its class model and packed into a
//! compact cell encoding.
//!
//! ## Core Principles
//!
//! - **Models Rule**: every write is matched against the class model
//! - **Both Directions**: references declared with `XREF` are mirrored on save
//! - **Explicit Persistence**: saves land in a waiting set, flushed in key order
//! - **Bounded Input**: decoding rejects malformed records instead of trusting them
//!
//! ## Architecture
//!
//! ```text
//! ObjectStore (open / save / delete)
//!     ↓
//! ObjectHandle (cursor reads and validated writes) ──→ XrefEdit
//!     ↓                                                   ↓
//! SchemaRegistry (models → schema trees)         applied at save time
//!     ↓
//! ObjectCache (locks, waiting set, records)
//!     ↓
//! Codec (tree ↔ cells) → Storage Backend (RocksDB, memory)
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use treestore::{MemoryLexicon, ObjectStore, Step};
//!
//! let lexicon = Arc::new(MemoryLexicon::new());
//! lexicon.define_class("Paper").unwrap();
//! let store = ObjectStore::in_memory(lexicon.clone()).unwrap();
//! store.load_models("?Paper Title Text\n").unwrap();
//!
//! let paper = lexicon.object("Paper", "p1").unwrap();
//! let title = lexicon.tag("Title").unwrap();
//! let mut handle = store.open_write(paper).unwrap();
//! handle.add_data(Step::Tag(title), treestore::key::TEXT, "Genome").unwrap();
//! store.save(handle).unwrap();
//! store.flush().unwrap();
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod cache;
pub mod clock;
pub mod codec;
pub mod config;
pub mod constraint;
pub mod error;
pub mod export;
pub mod handle;
pub mod key;
pub mod lexicon;
pub mod schema;
pub mod storage;
pub mod store;
pub mod tree;
pub mod xref;

// Re-export main types
pub use cache::{ObjectCache, WriteLock};
pub use clock::{SessionClock, StampSource};
pub use config::StoreConfig;
pub use constraint::{AcceptAll, ConstraintCheck};
pub use error::{CodecError, Result, StoreError};
pub use handle::{Mark, ObjectHandle, Step, Unit};
pub use key::{ClassId, Key, KeyKind};
pub use lexicon::{Lexicon, MemoryLexicon};
pub use schema::{Schema, SchemaPos, SchemaRegistry};
pub use storage::{MemoryBackend, StorageBackend};
#[cfg(feature = "rocksdb-backend")]
pub use storage::RocksDBBackend;
pub use store::ObjectStore;
pub use tree::{NodeId, NodeView, Tree, Value};
pub use xref::{SaveReport, XrefEdit};
