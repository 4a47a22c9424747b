//! Per-class schemas ("models") and the matcher that walks them.
//!
//! A model is written in a column-aligned text language (see [`parse`]),
//! turned into a raw tree, and built once into a [`Schema`]: annotation
//! markers are spliced out into node flags and side tables, and every tag's
//! root-to-tag path is recorded. The [`SchemaRegistry`] caches built schemas
//! per model key and rebuilds them after [`SchemaRegistry::invalidate`].

mod build;
pub mod parse;
mod registry;

pub use build::build_schema;
pub use parse::parse_models;
pub use registry::SchemaRegistry;

use crate::key::{Key, KeyKind, ANY};
use crate::tree::{NodeFlags, NodeId, Tree};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Side data of a schema node that does not fit in its flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotation {
    /// Reciprocal tag written into referenced objects
    pub xref: Option<Key>,
    /// Constraint object values in this column must satisfy
    pub constraint: Option<Key>,
}

/// Tag sequence leading from the schema root to one tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPath {
    /// Tags from the first column to the tag itself, inclusive
    pub tags: Vec<Key>,
    /// Schema node of the tag
    pub node: NodeId,
}

/// A built schema for one class or subtype.
#[derive(Debug)]
pub struct Schema {
    model: Key,
    tree: Tree,
    annotations: HashMap<NodeId, Annotation>,
    tag_paths: HashMap<Key, TagPath>,
}

impl Schema {
    /// Model key (class marker or subtype key).
    pub fn model(&self) -> Key {
        self.model
    }

    /// The schema tree.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Root node of the schema tree.
    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    /// Path to `tag`, if the tag is addressable in this schema.
    pub fn tag_path(&self, tag: Key) -> Option<&TagPath> {
        self.tag_paths.get(&tag)
    }

    /// All addressable tags.
    pub fn tags(&self) -> impl Iterator<Item = Key> + '_ {
        self.tag_paths.keys().copied()
    }

    /// Annotation of a node, if it has one.
    pub fn annotation(&self, node: NodeId) -> Option<&Annotation> {
        self.annotations.get(&node)
    }

    /// Reciprocal tag of a node.
    pub fn xref(&self, node: NodeId) -> Option<Key> {
        self.annotations.get(&node).and_then(|a| a.xref)
    }

    /// Constraint of a node.
    pub fn constraint(&self, node: NodeId) -> Option<Key> {
        self.annotations.get(&node).and_then(|a| a.constraint)
    }

    /// Whether the column holding `node` admits a single value.
    pub fn is_unique(&self, node: NodeId) -> bool {
        self.tree.flags(node).contains(NodeFlags::UNIQUE)
    }

    /// Whether `node` takes part in coordinate shifts.
    pub fn is_coord(&self, node: NodeId) -> bool {
        self.tree.flags(node).contains(NodeFlags::COORD)
    }

    /// Whether `node` repeats to its right.
    pub fn is_repeat(&self, node: NodeId) -> bool {
        self.tree.flags(node).contains(NodeFlags::REPEAT)
    }

    /// Scan the column starting at `head` for a node accepting `key`.
    pub fn match_in_column(&self, head: NodeId, key: Key) -> Option<NodeId> {
        self.tree
            .column(Some(head))
            .find(|&candidate| accepts(self.tree.key(candidate), key))
    }

    /// Position of `node` within its column.
    pub fn ordinal(&self, node: NodeId) -> usize {
        let head = self.tree.column_head(node);
        self.tree
            .column(Some(head))
            .position(|candidate| candidate == node)
            .unwrap_or(0)
    }
}

/// Whether a schema key admits an instance key.
///
/// Literal keys (tags, scalar markers) match themselves, a class marker
/// matches every object of its class, and `ANY` matches everything.
pub fn accepts(schema_key: Key, key: Key) -> bool {
    if schema_key == ANY || schema_key == key {
        return true;
    }
    schema_key.is_class_marker()
        && key.kind() == KeyKind::KeyRef
        && key.class() == schema_key.class()
}

/// A cursor into a specific schema.
#[derive(Clone)]
pub struct SchemaPos {
    /// Schema the cursor points into
    pub schema: Arc<Schema>,
    /// Node within that schema
    pub node: NodeId,
}

impl SchemaPos {
    /// Cursor at the root of `schema`.
    pub fn root(schema: Arc<Schema>) -> Self {
        let node = schema.root();
        Self { schema, node }
    }

    /// Schema key under the cursor.
    pub fn key(&self) -> Key {
        self.schema.tree.key(self.node)
    }

    /// Same schema, another node.
    pub fn at(&self, node: NodeId) -> Self {
        Self {
            schema: Arc::clone(&self.schema),
            node,
        }
    }

    /// Cursor on the first node of this column.
    pub fn head(&self) -> Self {
        self.at(self.schema.tree.column_head(self.node))
    }

    /// Match `key` against this column, scanning from its head.
    pub fn matching(&self, key: Key) -> Option<Self> {
        let head = self.schema.tree.column_head(self.node);
        self.schema
            .match_in_column(head, key)
            .map(|node| self.at(node))
    }

    /// Whether this column admits a single value.
    pub fn is_unique(&self) -> bool {
        self.schema.is_unique(self.node)
    }

    /// Reciprocal tag of the node.
    pub fn xref(&self) -> Option<Key> {
        self.schema.xref(self.node)
    }

    /// Constraint of the node.
    pub fn constraint(&self) -> Option<Key> {
        self.schema.constraint(self.node)
    }

    /// Position within the column.
    pub fn ordinal(&self) -> usize {
        self.schema.ordinal(self.node)
    }

    /// Whether both cursors point into the same schema.
    pub fn same_schema(&self, other: &SchemaPos) -> bool {
        Arc::ptr_eq(&self.schema, &other.schema)
    }
}

impl PartialEq for SchemaPos {
    fn eq(&self, other: &Self) -> bool {
        self.same_schema(other) && self.node == other.node
    }
}

impl Eq for SchemaPos {}

impl fmt::Debug for SchemaPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaPos")
            .field("model", &self.schema.model)
            .field("node", &self.node)
            .field("key", &self.key())
            .finish()
    }
}
