//! B+ tree node types.
//!
//! Internal nodes hold `keys.len() + 1` children. Keys in subtree
//! `children[i]` lie within `keys[i - 1] ..= keys[i]`; the bounds are
//! inclusive on both sides because equal keys may straddle a separator.

/// Index of a node in the tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Returns the arena slot of this node.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node:{}", self.0)
    }
}

/// Routing node: separator keys and child links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalNode<K> {
    pub keys: Vec<K>,
    pub children: Vec<NodeId>,
}

/// Leaf node: sorted keys, their values, and the next leaf in key order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafNode<K, V> {
    pub keys: Vec<K>,
    pub values: Vec<V>,
    pub next: Option<NodeId>,
}

/// A tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node<K, V> {
    Internal(InternalNode<K>),
    Leaf(LeafNode<K, V>),
}

impl<K, V> Node<K, V> {
    /// Returns the number of keys in the node.
    pub fn key_count(&self) -> usize {
        match self {
            Node::Internal(node) => node.keys.len(),
            Node::Leaf(leaf) => leaf.keys.len(),
        }
    }

    /// Returns true for leaves.
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }
}

impl<K: Ord, V> LeafNode<K, V> {
    /// Creates an empty leaf.
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            values: Vec::new(),
            next: None,
        }
    }

    /// Inserts after any equal keys.
    pub fn insert(&mut self, key: K, value: V) {
        let pos = self.keys.partition_point(|k| *k <= key);
        self.keys.insert(pos, key);
        self.values.insert(pos, value);
    }

    /// Returns the slot of the first entry equal to `key`.
    pub fn position(&self, key: &K) -> Option<usize> {
        let pos = self.keys.partition_point(|k| k < key);
        (pos < self.keys.len() && self.keys[pos] == *key).then_some(pos)
    }

    /// Removes the entry at `slot`.
    pub fn remove_at(&mut self, slot: usize) -> (K, V) {
        (self.keys.remove(slot), self.values.remove(slot))
    }

    /// Moves the upper half into a new right sibling.
    ///
    /// The right leaf inherits `next`; the caller links `self.next` to the
    /// right leaf once it has an id.
    pub fn split(&mut self) -> LeafNode<K, V> {
        let mid = self.keys.len() / 2;
        LeafNode {
            keys: self.keys.split_off(mid),
            values: self.values.split_off(mid),
            next: self.next.take(),
        }
    }

    /// Appends every entry of `right` and takes over its `next` link.
    pub fn merge(&mut self, right: LeafNode<K, V>) {
        self.keys.extend(right.keys);
        self.values.extend(right.values);
        self.next = right.next;
    }
}

impl<K: Ord, V> Default for LeafNode<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord> InternalNode<K> {
    /// Creates a root over two children.
    pub fn new_root(left: NodeId, separator: K, right: NodeId) -> Self {
        Self {
            keys: vec![separator],
            children: vec![left, right],
        }
    }

    /// Returns the child to follow for an insert: the number of separators
    /// less than or equal to `key`.
    pub fn insert_slot(&self, key: &K) -> usize {
        self.keys.partition_point(|k| k <= key)
    }

    /// Returns the leftmost child that may hold `key`: the number of
    /// separators strictly less than `key`.
    pub fn search_slot(&self, key: &K) -> usize {
        self.keys.partition_point(|k| k < key)
    }

    /// Registers `right` as the new sibling of `children[slot]`.
    pub fn insert_child(&mut self, slot: usize, separator: K, right: NodeId) {
        self.keys.insert(slot, separator);
        self.children.insert(slot + 1, right);
    }

    /// Splits an overflowing node. The middle key moves up and is kept in
    /// neither half.
    pub fn split(&mut self) -> (K, InternalNode<K>) {
        let mid = self.keys.len() / 2;
        let right_keys = self.keys.split_off(mid + 1);
        let right_children = self.children.split_off(mid + 1);
        let promoted = self.keys.remove(mid);
        (
            promoted,
            InternalNode {
                keys: right_keys,
                children: right_children,
            },
        )
    }

    /// Pulls `separator` down and appends every key and child of `right`.
    pub fn merge(&mut self, separator: K, right: InternalNode<K>) {
        self.keys.push(separator);
        self.keys.extend(right.keys);
        self.children.extend(right.children);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_insert_after_equal() {
        let mut leaf = LeafNode::new();
        leaf.insert(5, 'a');
        leaf.insert(3, 'b');
        leaf.insert(5, 'c');

        assert_eq!(leaf.keys, vec![3, 5, 5]);
        assert_eq!(leaf.values, vec!['b', 'a', 'c']);
        assert_eq!(leaf.position(&5), Some(1));
        assert_eq!(leaf.position(&4), None);
    }

    #[test]
    fn test_leaf_split_links() {
        let mut leaf = LeafNode::new();
        for k in 1..=4 {
            leaf.insert(k, k * 10);
        }
        leaf.next = Some(NodeId(9));

        let right = leaf.split();
        assert_eq!(leaf.keys, vec![1, 2]);
        assert_eq!(right.keys, vec![3, 4]);
        assert_eq!(right.values, vec![30, 40]);
        assert_eq!(right.next, Some(NodeId(9)));
        assert_eq!(leaf.next, None);
    }

    #[test]
    fn test_leaf_merge() {
        let mut left = LeafNode::new();
        left.insert(1, ());
        let mut right = LeafNode::new();
        right.insert(2, ());
        right.next = Some(NodeId(4));

        left.merge(right);
        assert_eq!(left.keys, vec![1, 2]);
        assert_eq!(left.next, Some(NodeId(4)));
    }

    #[test]
    fn test_internal_slots() {
        let node = InternalNode {
            keys: vec![10, 20],
            children: vec![NodeId(0), NodeId(1), NodeId(2)],
        };
        assert_eq!(node.insert_slot(&5), 0);
        assert_eq!(node.insert_slot(&10), 1);
        assert_eq!(node.search_slot(&10), 0);
        assert_eq!(node.search_slot(&11), 1);
        assert_eq!(node.insert_slot(&25), 2);
    }

    #[test]
    fn test_internal_split_promotes_middle() {
        let mut node = InternalNode {
            keys: vec![10, 20, 30, 40],
            children: (0..5).map(NodeId).collect(),
        };
        let (promoted, right) = node.split();

        assert_eq!(promoted, 30);
        assert_eq!(node.keys, vec![10, 20]);
        assert_eq!(node.children, vec![NodeId(0), NodeId(1), NodeId(2)]);
        assert_eq!(right.keys, vec![40]);
        assert_eq!(right.children, vec![NodeId(3), NodeId(4)]);
    }

    #[test]
    fn test_internal_merge() {
        let mut left = InternalNode {
            keys: vec![10],
            children: vec![NodeId(0), NodeId(1)],
        };
        let right = InternalNode {
            keys: vec![30],
            children: vec![NodeId(2), NodeId(3)],
        };
        left.merge(20, right);
        assert_eq!(left.keys, vec![10, 20, 30]);
        assert_eq!(left.children.len(), 4);
    }
}
