//! Owned, comparable snapshots of trees.

use super::{NodeId, Tree, Value};
use crate::key::Key;
use serde::{Deserialize, Serialize};

/// Snapshot of a node and everything to its right.
///
/// `children` is the node's right column in order. Two trees with equal
/// views hold the same keys, values and stamps in the same shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeView {
    /// Node key
    pub key: Key,
    /// Node payload
    #[serde(default, skip_serializing_if = "is_none")]
    pub value: Value,
    /// Edit stamp
    pub stamp: u32,
    /// Right column
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeView>,
}

fn is_none(value: &Value) -> bool {
    matches!(value, Value::None)
}

impl NodeView {
    /// Snapshot `id` and its right subtree.
    pub fn of(tree: &Tree, id: NodeId) -> Self {
        let node = tree.node(id);
        Self {
            key: node.key(),
            value: node.value().clone(),
            stamp: node.stamp(),
            children: tree.children(id).map(|child| NodeView::of(tree, child)).collect(),
        }
    }

    /// Number of nodes in the snapshot.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(NodeView::count).sum::<usize>()
    }
}
