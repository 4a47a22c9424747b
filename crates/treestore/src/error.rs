//! Error types for treestore operations.
//!
//! All fallible operations return [`Result<T>`]. Recoverable outcomes (schema
//! violations, lock contention) and integrity failures (storage corruption)
//! share one enum so callers can decide with [`StoreError::is_recoverable`].

use crate::key::Key;
use thiserror::Error;

/// Result type alias for treestore operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Comprehensive error type for all store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Storage backend error (RocksDB, file I/O, etc.)
    #[error("Storage error: {message}")]
    Storage {
        /// Detailed error message
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Serialization/deserialization error (configuration, exports)
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error details
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Malformed cell record
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The node pool refused an allocation
    #[error("Out of memory: node limit of {limit} reached")]
    OutOfMemory {
        /// Configured node limit
        limit: usize,
    },

    /// Stored data contradicts itself; continuing would write corrupt data
    #[error("Storage corruption in {key}: {message}")]
    StorageCorruption {
        /// Object whose data is corrupt
        key: Key,
        /// What was found
        message: String,
    },

    /// No model is defined for a class or subtype
    #[error("No schema defined for model {model}")]
    SchemaNotFound {
        /// Model key that was requested
        model: Key,
    },

    /// An edit does not type-check against the schema; the tree is unchanged
    #[error("Schema violation: {message}")]
    SchemaViolation {
        /// Description of the violation
        message: String,
    },

    /// A model definition is malformed
    #[error("Schema authoring error: {message}")]
    SchemaAuthoring {
        /// Description of the authoring mistake
        message: String,
    },

    /// The object is already held for write elsewhere
    #[error("Object {key} is locked for write")]
    Locked {
        /// Object that could not be locked
        key: Key,
    },

    /// A write was attempted through a read handle
    #[error("Object {key} was opened read-only")]
    ReadOnly {
        /// Object the handle wraps
        key: Key,
    },

    /// A mark refers to nodes that no longer exist
    #[error("Mark refers to a node that has been removed")]
    StaleMark,

    /// A name could not be resolved through the lexicon
    #[error("Unknown name: {name}")]
    UnknownName {
        /// The unresolved name
        name: String,
    },

    /// Invalid operation (e.g., removing the root)
    #[error("Invalid operation: {message}")]
    InvalidOperation {
        /// Description of what went wrong
        message: String,
    },
}

/// Errors raised while packing or unpacking a cell record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Record length is not a whole number of cells
    #[error("record length {len} is not a multiple of the cell size")]
    Misaligned {
        /// Length in bytes
        len: usize,
    },

    /// The forward stream ran past the backward stream
    #[error("forward stream truncated at cell {cell}")]
    Truncated {
        /// Cell index that could not be read
        cell: usize,
    },

    /// The backward stream ran into the forward stream
    #[error("backward stream overlaps forward stream at byte {byte}")]
    Overlap {
        /// Byte offset where the streams met
        byte: usize,
    },

    /// A structural byte carried bits the format does not define
    #[error("unknown structural byte {0:#04x}")]
    BadStructure(u8),

    /// Text bytes were not valid UTF-8
    #[error("text payload is not valid UTF-8")]
    InvalidText,

    /// Text contains the NUL terminator byte
    #[error("text payload contains a NUL byte")]
    NulInText,

    /// Right nesting deeper than the configured limit
    #[error("nesting deeper than {limit} levels")]
    TooDeep {
        /// Configured depth limit
        limit: usize,
    },

    /// Decoded root does not carry the object's identity
    #[error("root key {found} does not match object {expected}")]
    RootMismatch {
        /// Key the caller opened
        expected: Key,
        /// Key found in the record
        found: Key,
    },
}

impl StoreError {
    /// Create a storage error from a message and optional source.
    pub fn storage<E>(message: impl Into<String>, source: Option<E>) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage {
            message: message.into(),
            source: source.map(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
        }
    }

    /// Create a serialization error from a message and optional source.
    pub fn serialization<E>(message: impl Into<String>, source: Option<E>) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Serialization {
            message: message.into(),
            source: source.map(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
        }
    }

    /// Create a schema violation error.
    pub fn violation(message: impl Into<String>) -> Self {
        Self::SchemaViolation {
            message: message.into(),
        }
    }

    /// Create a schema authoring error.
    pub fn authoring(message: impl Into<String>) -> Self {
        Self::SchemaAuthoring {
            message: message.into(),
        }
    }

    /// Create a storage corruption error for an object.
    pub fn corruption(key: Key, message: impl Into<String>) -> Self {
        Self::StorageCorruption {
            key,
            message: message.into(),
        }
    }

    /// Whether the caller can carry on after this error.
    ///
    /// Corruption and storage failures are not recoverable: the application
    /// should stop writing rather than risk persisting bad data.
    pub fn is_recoverable(&self) -> bool {
        match self {
            StoreError::SchemaViolation { .. }
            | StoreError::Locked { .. }
            | StoreError::ReadOnly { .. }
            | StoreError::StaleMark
            | StoreError::UnknownName { .. }
            | StoreError::InvalidOperation { .. }
            | StoreError::OutOfMemory { .. } => true,
            StoreError::Storage { .. }
            | StoreError::Serialization { .. }
            | StoreError::Codec(_)
            | StoreError::StorageCorruption { .. }
            | StoreError::SchemaNotFound { .. }
            | StoreError::SchemaAuthoring { .. } => false,
        }
    }
}
