//! The node tree data model.
//!
//! - [`Node`]: key, payload, `right`/`down` owning links, `up` back-link
//! - [`NodePool`]: generational arena the nodes live in
//! - [`Tree`]: one pool plus its root, with splice operations that keep
//!   every `up` link correct

mod node;
mod pool;
mod view;

pub use node::{Node, NodeFlags, NodeId, Value};
pub use pool::NodePool;
pub use view::NodeView;

use crate::error::Result;
use crate::key::Key;

/// A rooted node tree: one object instance or one schema.
#[derive(Debug, Clone)]
pub struct Tree {
    pool: NodePool,
    root: NodeId,
}

impl Tree {
    /// Create a tree holding only a root node.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::OutOfMemory`](crate::StoreError::OutOfMemory)
    /// if `limit` is zero.
    pub fn new(root_key: Key, stamp: u32, limit: Option<usize>) -> Result<Self> {
        let mut pool = NodePool::new(limit);
        let root = pool.alloc(root_key, Value::None, stamp)?;
        Ok(Self { pool, root })
    }

    pub(crate) fn from_parts(pool: NodePool, root: NodeId) -> Self {
        Self { pool, root }
    }

    /// Root node id.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Key of the root: the object (or model) identity.
    pub fn root_key(&self) -> Key {
        self.pool[self.root].key
    }

    /// Node for a live id.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not live; ids held by this crate always are.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.pool[id]
    }

    /// Node for `id`, if live.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.pool.get(id)
    }

    /// Whether `id` names a live node of this tree.
    pub fn contains(&self, id: NodeId) -> bool {
        self.pool.contains(id)
    }

    /// Key of a node.
    pub fn key(&self, id: NodeId) -> Key {
        self.pool[id].key
    }

    /// Payload of a node.
    pub fn value(&self, id: NodeId) -> &Value {
        &self.pool[id].value
    }

    /// First node of the column right of `id`.
    pub fn right(&self, id: NodeId) -> Option<NodeId> {
        self.pool[id].right
    }

    /// Next alternative below `id`.
    pub fn down(&self, id: NodeId) -> Option<NodeId> {
        self.pool[id].down
    }

    /// Node linking to `id`.
    pub fn up(&self, id: NodeId) -> Option<NodeId> {
        self.pool[id].up
    }

    /// Edit stamp of a node.
    pub fn stamp(&self, id: NodeId) -> u32 {
        self.pool[id].stamp
    }

    /// Flags of a node.
    pub fn flags(&self, id: NodeId) -> NodeFlags {
        self.pool[id].flags
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.pool.live()
    }

    /// Whether the root has no content.
    pub fn is_empty(&self) -> bool {
        self.right(self.root).is_none()
    }

    /// Bytes of text payload held by the tree.
    pub fn text_bytes(&self) -> usize {
        self.pool.text_bytes()
    }

    /// Allocate a detached node in this tree's pool.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::OutOfMemory`](crate::StoreError::OutOfMemory)
    /// when the pool limit is reached.
    pub fn add_node(&mut self, key: Key, value: Value, stamp: u32) -> Result<NodeId> {
        self.pool.alloc(key, value, stamp)
    }

    /// Replace a node's payload and stamp.
    pub fn set_value(&mut self, id: NodeId, value: Value, stamp: u32) {
        self.pool.set_value(id, value);
        self.pool[id].stamp = stamp;
    }

    /// Replace a node's key and stamp.
    pub fn set_key(&mut self, id: NodeId, key: Key, stamp: u32) {
        let node = &mut self.pool[id];
        node.key = key;
        node.stamp = stamp;
    }

    /// Overwrite a node's stamp.
    pub fn set_stamp(&mut self, id: NodeId, stamp: u32) {
        self.pool[id].stamp = stamp;
    }

    /// Set flag bits on a node.
    pub fn insert_flags(&mut self, id: NodeId, flags: NodeFlags) {
        self.pool[id].flags.insert(flags);
    }

    /// Make `child` the right link of `parent`, replacing nothing.
    ///
    /// Used when building trees top-down; `parent` must have no right link.
    pub(crate) fn link_right(&mut self, parent: NodeId, child: NodeId) {
        debug_assert!(self.pool[parent].right.is_none());
        self.pool[parent].right = Some(child);
        self.pool[child].up = Some(parent);
    }

    /// Make `next` the down link of `prev`; `prev` must have no down link.
    pub(crate) fn link_down(&mut self, prev: NodeId, next: NodeId) {
        debug_assert!(self.pool[prev].down.is_none());
        self.pool[prev].down = Some(next);
        self.pool[next].up = Some(prev);
    }

    /// Insert detached `child` at the head of the column right of `parent`.
    pub fn push_front(&mut self, parent: NodeId, child: NodeId) {
        let old = self.pool[parent].right;
        self.pool[child].down = old;
        if let Some(old) = old {
            self.pool[old].up = Some(child);
        }
        self.pool[parent].right = Some(child);
        self.pool[child].up = Some(parent);
    }

    /// Insert detached `child` directly below `prev` in its column.
    pub fn insert_after(&mut self, prev: NodeId, child: NodeId) {
        let old = self.pool[prev].down;
        self.pool[child].down = old;
        if let Some(old) = old {
            self.pool[old].up = Some(child);
        }
        self.pool[prev].down = Some(child);
        self.pool[child].up = Some(prev);
    }

    /// Detach `id` from its column; its down siblings close the gap.
    ///
    /// The node keeps its right subtree. The root cannot be unlinked.
    pub fn unlink(&mut self, id: NodeId) {
        let Some(up) = self.pool[id].up else {
            return;
        };
        let down = self.pool[id].down.take();
        if self.pool[up].right == Some(id) {
            self.pool[up].right = down;
        } else {
            self.pool[up].down = down;
        }
        if let Some(down) = down {
            self.pool[down].up = Some(up);
        }
        self.pool[id].up = None;
    }

    /// Free an unlinked node together with its right subtree.
    ///
    /// Down chains are walked with an explicit stack, never recursion.
    pub fn free_subtree(&mut self, id: NodeId) {
        let mut stack = Vec::new();
        if let Some(node) = self.pool.free(id) {
            stack.extend(node.right);
        }
        while let Some(next) = stack.pop() {
            if let Some(node) = self.pool.free(next) {
                stack.extend(node.right);
                stack.extend(node.down);
            }
        }
    }

    /// Node whose right column contains `id`.
    pub fn column_owner(&self, id: NodeId) -> Option<NodeId> {
        let head = self.column_head(id);
        self.up(head)
    }

    /// First node of the column containing `id`.
    pub fn column_head(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(up) = self.up(current) {
            if self.down(up) == Some(current) {
                current = up;
            } else {
                break;
            }
        }
        current
    }

    /// Iterate the column starting at `first`, following down links.
    pub fn column(&self, first: Option<NodeId>) -> Column<'_> {
        Column {
            tree: self,
            next: first,
        }
    }

    /// Iterate the column right of `id`.
    pub fn children(&self, id: NodeId) -> Column<'_> {
        self.column(self.right(id))
    }

    /// Last node of the column starting at `first`.
    pub fn column_tail(&self, first: NodeId) -> NodeId {
        self.column(Some(first)).last().unwrap_or(first)
    }

    /// Path of node ids from the root to `id`, following column owners.
    pub fn ancestry(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = vec![id];
        let mut current = id;
        while let Some(owner) = self.column_owner(current) {
            path.push(owner);
            current = owner;
        }
        path.reverse();
        path
    }

    /// Owned snapshot of the whole tree.
    pub fn view(&self) -> NodeView {
        NodeView::of(self, self.root)
    }
}

/// Iterator over one column.
pub struct Column<'a> {
    tree: &'a Tree,
    next: Option<NodeId>,
}

impl Iterator for Column<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.down(current);
        Some(current)
    }
}
