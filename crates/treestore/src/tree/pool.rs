//! Node allocation.

use super::node::{Node, NodeId, Value};
use crate::error::{Result, StoreError};
use crate::key::Key;
use std::ops::{Index, IndexMut};

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Generational arena of nodes.
///
/// Freed slots are reused; each reuse bumps the slot generation so ids held
/// past a free stop resolving. An optional node limit turns exhaustion into
/// [`StoreError::OutOfMemory`] instead of an abort.
#[derive(Debug, Clone, Default)]
pub struct NodePool {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    limit: Option<usize>,
    text_bytes: usize,
}

impl NodePool {
    /// Create an empty pool.
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }

    /// Allocate a detached node.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::OutOfMemory`] when the node limit is reached;
    /// nothing is allocated in that case.
    pub fn alloc(&mut self, key: Key, value: Value, stamp: u32) -> Result<NodeId> {
        if let Some(limit) = self.limit {
            if self.live >= limit {
                return Err(StoreError::OutOfMemory { limit });
            }
        }
        self.text_bytes += value.text_len();
        let node = Node::new(key, value, stamp);
        self.live += 1;

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.node = Some(node);
            return Ok(NodeId {
                index,
                generation: slot.generation,
            });
        }

        let index = u32::try_from(self.slots.len()).map_err(|_| StoreError::OutOfMemory {
            limit: u32::MAX as usize,
        })?;
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        Ok(NodeId {
            index,
            generation: 0,
        })
    }

    /// Release a node and its text payload. Links are not followed.
    pub fn free(&mut self, id: NodeId) -> Option<Node> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let node = slot.node.take()?;
        self.free.push(id.index);
        self.live -= 1;
        self.text_bytes -= node.value.text_len();
        Some(node)
    }

    /// Whether `id` names a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Node for `id`, if still live.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    /// Mutable node for `id`, if still live.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    /// Replace a node's payload, keeping text accounting in step.
    pub fn set_value(&mut self, id: NodeId, value: Value) {
        let added = value.text_len();
        if let Some(node) = self.get_mut(id) {
            let removed = node.value.text_len();
            node.value = value;
            self.text_bytes = self.text_bytes + added - removed;
        }
    }

    /// Number of live nodes.
    pub fn live(&self) -> usize {
        self.live
    }

    /// Bytes of text payload held by live nodes.
    pub fn text_bytes(&self) -> usize {
        self.text_bytes
    }

    /// Configured node limit.
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }
}

impl Index<NodeId> for NodePool {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        match self.get(id) {
            Some(node) => node,
            None => panic!("node {id} is not live in this pool"),
        }
    }
}

impl IndexMut<NodeId> for NodePool {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        match self.get_mut(id) {
            Some(node) => node,
            None => panic!("node {id} is not live in this pool"),
        }
    }
}
