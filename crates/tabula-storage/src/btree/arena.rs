//! Arena storage for B+ tree nodes.
//!
//! Nodes live in a `Vec` and refer to each other by [`NodeId`]. Released
//! slots go on a free list and are reused by later allocations. Nodes keep
//! no parent links; callers record the descent path instead.

use super::node::{InternalNode, LeafNode, Node, NodeId};
use tabula_common::{Result, TabulaError};

/// Slot-addressed node storage.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeArena<K, V> {
    nodes: Vec<Option<Node<K, V>>>,
    free: Vec<NodeId>,
}

impl<K, V> NodeArena<K, V> {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Stores a node and returns its id.
    pub fn allocate(&mut self, node: Node<K, V>) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id.index()] = Some(node);
                id
            }
            None => {
                let id = NodeId(self.nodes.len() as u32);
                self.nodes.push(Some(node));
                id
            }
        }
    }

    /// Frees a node's slot and returns the node.
    pub fn release(&mut self, id: NodeId) -> Result<Node<K, V>> {
        let node = self.take(id)?;
        self.free.push(id);
        Ok(node)
    }

    /// Moves a node out of its slot without freeing the slot.
    ///
    /// The caller must `put` it back.
    pub fn take(&mut self, id: NodeId) -> Result<Node<K, V>> {
        self.nodes
            .get_mut(id.index())
            .and_then(Option::take)
            .ok_or_else(|| missing(id))
    }

    /// Returns a node to the slot it was taken from.
    pub fn put(&mut self, id: NodeId, node: Node<K, V>) {
        self.nodes[id.index()] = Some(node);
    }

    /// Returns a node.
    pub fn get(&self, id: NodeId) -> Result<&Node<K, V>> {
        self.nodes
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or_else(|| missing(id))
    }

    /// Returns a node mutably.
    pub fn get_mut(&mut self, id: NodeId) -> Result<&mut Node<K, V>> {
        self.nodes
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or_else(|| missing(id))
    }

    /// Returns a leaf, failing if the node is internal.
    pub fn leaf(&self, id: NodeId) -> Result<&LeafNode<K, V>> {
        match self.get(id)? {
            Node::Leaf(leaf) => Ok(leaf),
            Node::Internal(_) => Err(kind_mismatch(id, "leaf")),
        }
    }

    /// Returns a leaf mutably.
    pub fn leaf_mut(&mut self, id: NodeId) -> Result<&mut LeafNode<K, V>> {
        match self.get_mut(id)? {
            Node::Leaf(leaf) => Ok(leaf),
            Node::Internal(_) => Err(kind_mismatch(id, "leaf")),
        }
    }

    /// Returns an internal node.
    pub fn internal(&self, id: NodeId) -> Result<&InternalNode<K>> {
        match self.get(id)? {
            Node::Internal(node) => Ok(node),
            Node::Leaf(_) => Err(kind_mismatch(id, "internal node")),
        }
    }

    /// Returns an internal node mutably.
    pub fn internal_mut(&mut self, id: NodeId) -> Result<&mut InternalNode<K>> {
        match self.get_mut(id)? {
            Node::Internal(node) => Ok(node),
            Node::Leaf(_) => Err(kind_mismatch(id, "internal node")),
        }
    }

    /// Returns the number of slots ever allocated, live or free.
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the number of live nodes.
    pub fn live_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    /// Drops every node.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
    }
}

impl<K, V> Default for NodeArena<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

fn missing(id: NodeId) -> TabulaError {
    TabulaError::TreeCorrupted(format!("{} is not a live node", id))
}

fn kind_mismatch(id: NodeId, expected: &str) -> TabulaError {
    TabulaError::TreeCorrupted(format!("{} is not a {}", id, expected))
}
