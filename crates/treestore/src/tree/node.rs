//! Node, node ids, payload values and flags.

use crate::key::{Key, KeyKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to a node slot in a [`NodePool`](super::NodePool).
///
/// The generation changes every time the slot is recycled, so an id kept
/// past a removal no longer resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}.{}", self.index, self.generation)
    }
}

/// Payload carried by scalar nodes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    /// Tags and object references carry nothing beyond their key
    #[default]
    None,
    /// Integer value
    Int(i32),
    /// Floating point value
    Float(f32),
    /// Date-time, seconds since the store epoch
    Date(u32),
    /// Text value
    Text(String),
}

impl Value {
    /// Scalar kind this value belongs under, if any.
    pub fn kind(&self) -> Option<KeyKind> {
        match self {
            Value::None => None,
            Value::Int(_) => Some(KeyKind::Int),
            Value::Float(_) => Some(KeyKind::Float),
            Value::Date(_) => Some(KeyKind::Date),
            Value::Text(_) => Some(KeyKind::Text),
        }
    }

    /// Bytes of text payload held by this value.
    pub fn text_len(&self) -> usize {
        match self {
            Value::Text(s) => s.len(),
            _ => 0,
        }
    }

    /// Text payload, if any.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Whether a value of this shape may sit under `key`.
    pub fn fits(&self, key: Key) -> bool {
        match key.kind() {
            KeyKind::Text => matches!(self, Value::Text(_) | Value::None),
            KeyKind::Int => matches!(self, Value::Int(_)),
            KeyKind::Float => matches!(self, Value::Float(_)),
            KeyKind::Date => matches!(self, Value::Date(_)),
            KeyKind::KeyRef | KeyKind::Tag => matches!(self, Value::None),
        }
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

/// Flags word of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NodeFlags(u8);

impl NodeFlags {
    /// Node belongs to a schema tree
    pub const MODEL: NodeFlags = NodeFlags(1);
    /// Node sits in a column holding at most one value
    pub const UNIQUE: NodeFlags = NodeFlags(1 << 1);
    /// Node's right column is a subtype model
    pub const SUBTYPE: NodeFlags = NodeFlags(1 << 2);
    /// Leaf takes part in coordinate shifts
    pub const COORD: NodeFlags = NodeFlags(1 << 3);
    /// Node repeats to its own right
    pub const REPEAT: NodeFlags = NodeFlags(1 << 4);

    /// No flags set.
    pub const fn empty() -> Self {
        NodeFlags(0)
    }

    /// Whether all bits of `other` are set.
    pub const fn contains(self, other: NodeFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set the bits of `other`.
    pub fn insert(&mut self, other: NodeFlags) {
        self.0 |= other.0;
    }

    /// Clear the bits of `other`.
    pub fn remove(&mut self, other: NodeFlags) {
        self.0 &= !other.0;
    }
}

/// One node of an object or schema tree.
///
/// `right` and `down` own their subtrees; `up` points back at whichever node
/// links here and is maintained by every splice in [`Tree`](super::Tree).
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) key: Key,
    pub(crate) value: Value,
    pub(crate) right: Option<NodeId>,
    pub(crate) down: Option<NodeId>,
    pub(crate) up: Option<NodeId>,
    pub(crate) stamp: u32,
    pub(crate) flags: NodeFlags,
}

impl Node {
    pub(crate) fn new(key: Key, value: Value, stamp: u32) -> Self {
        Self {
            key,
            value,
            right: None,
            down: None,
            up: None,
            stamp,
            flags: NodeFlags::empty(),
        }
    }

    /// Key of the node.
    pub fn key(&self) -> Key {
        self.key
    }

    /// Payload of the node.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// First node of the column to the right.
    pub fn right(&self) -> Option<NodeId> {
        self.right
    }

    /// Next alternative in the same column.
    pub fn down(&self) -> Option<NodeId> {
        self.down
    }

    /// Node linking to this one.
    pub fn up(&self) -> Option<NodeId> {
        self.up
    }

    /// Edit stamp.
    pub fn stamp(&self) -> u32 {
        self.stamp
    }

    /// Flags word.
    pub fn flags(&self) -> NodeFlags {
        self.flags
    }
}
