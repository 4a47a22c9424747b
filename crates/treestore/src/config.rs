//! Store configuration.

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for an [`ObjectStore`](crate::ObjectStore).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Node limit per object tree (None = unlimited)
    /// Allocations beyond it fail with `OutOfMemory`
    pub max_nodes_per_object: Option<usize>,

    /// Deepest right-nesting a handle may write or a record may decode to
    pub max_nesting_depth: usize,

    /// Saved records kept before the waiting set is flushed
    pub waiting_set_limit: usize,

    /// Deepest chain of cross-reference saves triggered by one save
    pub max_xref_depth: usize,

    /// Apply reciprocal edits at save time
    pub xref_enabled: bool,

    /// Relative tolerance under which two floats count as equal
    pub float_epsilon: f32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_nodes_per_object: None,
            max_nesting_depth: 256,
            waiting_set_limit: 64,
            max_xref_depth: 16,
            xref_enabled: true,
            float_epsilon: 1e-6,
        }
    }
}

impl StoreConfig {
    /// Config that writes every save through and bounds object size.
    pub fn strict() -> Self {
        Self {
            max_nodes_per_object: Some(1_000_000),
            waiting_set_limit: 1,
            ..Default::default()
        }
    }

    /// Parse a config from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if the JSON is malformed.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| StoreError::serialization("Failed to parse store config", Some(e)))
    }

    /// Read a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Storage`] if the file cannot be read and
    /// [`StoreError::Serialization`] if it is malformed.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            StoreError::storage(
                format!("Failed to read config at {:?}", path.as_ref()),
                Some(e),
            )
        })?;
        Self::from_json_str(&text)
    }

    /// Set the node limit per object.
    pub fn with_max_nodes(mut self, limit: usize) -> Self {
        self.max_nodes_per_object = Some(limit);
        self
    }

    /// Set the waiting set size.
    pub fn with_waiting_set_limit(mut self, limit: usize) -> Self {
        self.waiting_set_limit = limit.max(1);
        self
    }

    /// Set the deepest right-nesting accepted.
    pub fn with_max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }

    /// Enable or disable cross-reference propagation.
    pub fn with_xref(mut self, enabled: bool) -> Self {
        self.xref_enabled = enabled;
        self
    }
}
