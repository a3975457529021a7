//! In-memory B+ tree over an arena of nodes.
//!
//! Inserts split overflowing nodes bottom-up along the recorded descent
//! path; deletes repair underflow along the same kind of path by borrowing
//! from a sibling or merging with it. The root is the only node allowed
//! below minimum occupancy, and the tree grows or shrinks in height only at
//! the root.

use super::arena::NodeArena;
use super::node::{InternalNode, LeafNode, Node, NodeId};
use std::fmt::Debug;
use tabula_common::{Result, TabulaError};
use tracing::debug;

/// Root-to-leaf path: each internal node with the child slot taken.
type Path = Vec<(NodeId, usize)>;

/// Ordered multi-way index with chained leaves.
///
/// Duplicate keys are accepted. No order among equal keys is promised.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedIndex<K, V> {
    arena: NodeArena<K, V>,
    root: NodeId,
    /// Number of levels; 1 when the root is a leaf.
    height: usize,
    len: usize,
    max_keys: usize,
}

impl<K, V> OrderedIndex<K, V>
where
    K: Ord + Clone + Debug,
    V: Clone,
{
    /// Smallest accepted node capacity.
    pub const MIN_MAX_KEYS: usize = 2;

    /// Creates an empty tree whose nodes hold at most `max_keys` keys.
    pub fn new(max_keys: usize) -> Result<Self> {
        if max_keys < Self::MIN_MAX_KEYS {
            return Err(TabulaError::InvalidParameter {
                name: "max_keys".to_string(),
                value: max_keys.to_string(),
            });
        }
        let mut arena = NodeArena::new();
        let root = arena.allocate(Node::Leaf(LeafNode::new()));
        Ok(Self {
            arena,
            root,
            height: 1,
            len: 0,
            max_keys,
        })
    }

    /// Returns the number of stored entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the tree holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of levels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the node capacity.
    pub fn max_keys(&self) -> usize {
        self.max_keys
    }

    /// Returns the number of live nodes.
    pub fn node_count(&self) -> usize {
        self.arena.live_count()
    }

    /// Minimum keys in a non-root leaf: ceil(max_keys / 2).
    fn leaf_min(&self) -> usize {
        (self.max_keys + 1) / 2
    }

    /// Minimum keys in a non-root internal node: ceil((max_keys + 1) / 2) - 1.
    fn internal_min(&self) -> usize {
        (self.max_keys + 2) / 2 - 1
    }

    // =========================================================================
    // Insert
    // =========================================================================

    /// Inserts an entry after any entries with an equal key.
    pub fn insert(&mut self, key: K, value: V) -> Result<()> {
        let mut path = Path::with_capacity(self.height);
        let mut current = self.root;
        while let Node::Internal(node) = self.arena.get(current)? {
            let slot = node.insert_slot(&key);
            path.push((current, slot));
            current = node.children[slot];
        }

        let leaf = self.arena.leaf_mut(current)?;
        leaf.insert(key, value);
        self.len += 1;
        if leaf.keys.len() <= self.max_keys {
            return Ok(());
        }

        let right = leaf.split();
        let separator = right.keys[0].clone();
        let right_id = self.arena.allocate(Node::Leaf(right));
        self.arena.leaf_mut(current)?.next = Some(right_id);
        debug!(left = %current, right = %right_id, separator = ?separator, "split leaf");

        self.propagate_split(separator, right_id, path)
    }

    /// Registers a new right sibling with its parent, splitting ancestors
    /// that overflow in turn.
    fn propagate_split(&mut self, separator: K, right_id: NodeId, mut path: Path) -> Result<()> {
        let mut separator = separator;
        let mut right_id = right_id;

        while let Some((parent_id, slot)) = path.pop() {
            let parent = self.arena.internal_mut(parent_id)?;
            parent.insert_child(slot, separator, right_id);
            if parent.keys.len() <= self.max_keys {
                return Ok(());
            }

            let (promoted, right) = parent.split();
            right_id = self.arena.allocate(Node::Internal(right));
            debug!(left = %parent_id, right = %right_id, promoted = ?promoted, "split internal node");
            separator = promoted;
        }

        let old_root = self.root;
        self.root = self
            .arena
            .allocate(Node::Internal(InternalNode::new_root(old_root, separator, right_id)));
        self.height += 1;
        debug!(root = %self.root, height = self.height, "tree height grew");
        Ok(())
    }

    // =========================================================================
    // Search
    // =========================================================================

    /// Descends to the leftmost leaf that may hold `key`.
    fn descend_leftmost(&self, key: &K) -> Result<(NodeId, Path)> {
        let mut path = Path::with_capacity(self.height);
        let mut current = self.root;
        while let Node::Internal(node) = self.arena.get(current)? {
            let slot = node.search_slot(key);
            path.push((current, slot));
            current = node.children[slot];
        }
        Ok((current, path))
    }

    /// Returns the value of the first entry equal to `key`.
    pub fn search(&self, key: &K) -> Result<Option<V>> {
        let (mut leaf_id, _) = self.descend_leftmost(key)?;
        for _ in 0..=self.arena.capacity() {
            let leaf = self.arena.leaf(leaf_id)?;
            if let Some(slot) = leaf.position(key) {
                return Ok(Some(leaf.values[slot].clone()));
            }
            if leaf.keys.last().map_or(true, |last| last > key) {
                return Ok(None);
            }
            match leaf.next {
                Some(next) => leaf_id = next,
                None => return Ok(None),
            }
        }
        Err(chain_too_long())
    }

    /// Returns true if an entry with `key` exists.
    pub fn contains(&self, key: &K) -> Result<bool> {
        Ok(self.search(key)?.is_some())
    }

    /// Returns values whose keys lie in `low..=high`, in ascending key order.
    pub fn range(&self, low: &K, high: &K) -> Result<Vec<V>> {
        Ok(self
            .range_entries(low, high)?
            .into_iter()
            .map(|(_, v)| v)
            .collect())
    }

    /// Returns entries whose keys lie in `low..=high`, in ascending key order.
    pub fn range_entries(&self, low: &K, high: &K) -> Result<Vec<(K, V)>> {
        let mut out = Vec::new();
        if low > high {
            return Ok(out);
        }

        let (mut leaf_id, _) = self.descend_leftmost(low)?;
        for _ in 0..=self.arena.capacity() {
            let leaf = self.arena.leaf(leaf_id)?;
            for (k, v) in leaf.keys.iter().zip(&leaf.values) {
                if k > high {
                    return Ok(out);
                }
                if k >= low {
                    out.push((k.clone(), v.clone()));
                }
            }
            match leaf.next {
                Some(next) => leaf_id = next,
                None => return Ok(out),
            }
        }
        Err(chain_too_long())
    }

    /// Returns every entry in key order by following the leaf chain.
    pub fn entries(&self) -> Result<Vec<(K, V)>> {
        let mut out = Vec::with_capacity(self.len);
        self.walk_leaves(|leaf| {
            out.extend(leaf.keys.iter().cloned().zip(leaf.values.iter().cloned()));
        })?;
        Ok(out)
    }

    /// Returns every key in leaf-chain order.
    pub fn leaf_keys(&self) -> Result<Vec<K>> {
        let mut out = Vec::with_capacity(self.len);
        self.walk_leaves(|leaf| out.extend(leaf.keys.iter().cloned()))?;
        Ok(out)
    }

    fn leftmost_leaf(&self) -> Result<NodeId> {
        let mut current = self.root;
        while let Node::Internal(node) = self.arena.get(current)? {
            current = node.children[0];
        }
        Ok(current)
    }

    /// Visits leaves along the chain, bounded by the arena size.
    fn walk_leaves(&self, mut visit: impl FnMut(&LeafNode<K, V>)) -> Result<()> {
        let mut next = Some(self.leftmost_leaf()?);
        let mut steps = 0;
        while let Some(id) = next {
            steps += 1;
            if steps > self.arena.capacity() {
                return Err(chain_too_long());
            }
            let leaf = self.arena.leaf(id)?;
            visit(leaf);
            next = leaf.next;
        }
        Ok(())
    }

    // =========================================================================
    // Remove
    // =========================================================================

    /// Removes the first entry equal to `key` and returns its value.
    pub fn remove(&mut self, key: &K) -> Result<Option<V>> {
        let (mut leaf_id, mut path) = self.descend_leftmost(key)?;

        let mut steps = 0;
        let slot = loop {
            steps += 1;
            if steps > self.arena.capacity() {
                return Err(chain_too_long());
            }
            let leaf = self.arena.leaf(leaf_id)?;
            if let Some(slot) = leaf.position(key) {
                break slot;
            }
            if leaf.keys.last().map_or(true, |last| last > key) || leaf.next.is_none() {
                return Ok(None);
            }
            let expected = leaf.next;
            leaf_id = self.advance_path(&mut path)?;
            if Some(leaf_id) != expected {
                return Err(TabulaError::TreeCorrupted(format!(
                    "leaf chain and tree order disagree after {}",
                    leaf_id
                )));
            }
        };

        let (_, value) = self.arena.leaf_mut(leaf_id)?.remove_at(slot);
        self.len -= 1;
        self.rebalance(leaf_id, path)?;
        Ok(Some(value))
    }

    /// Moves `path` to the next leaf in key order and returns that leaf.
    fn advance_path(&self, path: &mut Path) -> Result<NodeId> {
        loop {
            let (parent_id, slot) = path.pop().ok_or_else(|| {
                TabulaError::TreeCorrupted("no leaf after the rightmost leaf".to_string())
            })?;
            let parent = self.arena.internal(parent_id)?;
            if slot + 1 < parent.children.len() {
                path.push((parent_id, slot + 1));
                let mut current = parent.children[slot + 1];
                while let Node::Internal(node) = self.arena.get(current)? {
                    path.push((current, 0));
                    current = node.children[0];
                }
                return Ok(current);
            }
        }
    }

    /// Repairs underflow from `node_id` up towards the root.
    fn rebalance(&mut self, node_id: NodeId, mut path: Path) -> Result<()> {
        let mut node_id = node_id;

        while let Some((parent_id, slot)) = path.pop() {
            let node = self.arena.get(node_id)?;
            let min = if node.is_leaf() {
                self.leaf_min()
            } else {
                self.internal_min()
            };
            if node.key_count() >= min {
                return Ok(());
            }

            let parent = self.arena.internal(parent_id)?;
            let left = (slot > 0).then(|| parent.children[slot - 1]);
            let right = (slot + 1 < parent.children.len()).then(|| parent.children[slot + 1]);

            if let Some(left_id) = left {
                if self.arena.get(left_id)?.key_count() > min {
                    return self.borrow_from_left(parent_id, slot, left_id, node_id);
                }
            }
            if let Some(right_id) = right {
                if self.arena.get(right_id)?.key_count() > min {
                    return self.borrow_from_right(parent_id, slot, node_id, right_id);
                }
            }

            match (left, right) {
                (Some(left_id), _) => self.merge(parent_id, slot - 1, left_id, node_id)?,
                (None, Some(right_id)) => self.merge(parent_id, slot, node_id, right_id)?,
                (None, None) => {
                    return Err(TabulaError::TreeCorrupted(format!(
                        "{} has no sibling under {}",
                        node_id, parent_id
                    )))
                }
            }
            node_id = parent_id;
        }

        self.collapse_root()
    }

    /// Replaces an internal root that has a single child by that child.
    fn collapse_root(&mut self) -> Result<()> {
        let only_child = match self.arena.get(self.root)? {
            Node::Internal(node) if node.keys.is_empty() => node.children[0],
            _ => return Ok(()),
        };
        let old_root = self.root;
        self.arena.release(old_root)?;
        self.root = only_child;
        self.height -= 1;
        debug!(root = %self.root, height = self.height, "tree height shrank");
        Ok(())
    }

    /// Moves the last entry of the left sibling into `node_id`.
    fn borrow_from_left(
        &mut self,
        parent_id: NodeId,
        slot: usize,
        left_id: NodeId,
        node_id: NodeId,
    ) -> Result<()> {
        let mut left = self.arena.take(left_id)?;
        let mut node = self.arena.take(node_id)?;
        let parent = self.arena.internal_mut(parent_id)?;

        match (&mut left, &mut node) {
            (Node::Leaf(left), Node::Leaf(node)) => {
                let (k, v) = left.remove_at(left.keys.len() - 1);
                node.keys.insert(0, k);
                node.values.insert(0, v);
                parent.keys[slot - 1] = node.keys[0].clone();
            }
            (Node::Internal(left), Node::Internal(node)) => {
                let child = left.children.remove(left.children.len() - 1);
                let up = left.keys.remove(left.keys.len() - 1);
                let down = std::mem::replace(&mut parent.keys[slot - 1], up);
                node.keys.insert(0, down);
                node.children.insert(0, child);
            }
            _ => return Err(sibling_mismatch(left_id, node_id)),
        }

        self.arena.put(left_id, left);
        self.arena.put(node_id, node);
        debug!(from = %left_id, to = %node_id, "borrowed from left sibling");
        Ok(())
    }

    /// Moves the first entry of the right sibling into `node_id`.
    fn borrow_from_right(
        &mut self,
        parent_id: NodeId,
        slot: usize,
        node_id: NodeId,
        right_id: NodeId,
    ) -> Result<()> {
        let mut node = self.arena.take(node_id)?;
        let mut right = self.arena.take(right_id)?;
        let parent = self.arena.internal_mut(parent_id)?;

        match (&mut node, &mut right) {
            (Node::Leaf(node), Node::Leaf(right)) => {
                let (k, v) = right.remove_at(0);
                node.keys.push(k);
                node.values.push(v);
                parent.keys[slot] = right.keys[0].clone();
            }
            (Node::Internal(node), Node::Internal(right)) => {
                let child = right.children.remove(0);
                let up = right.keys.remove(0);
                let down = std::mem::replace(&mut parent.keys[slot], up);
                node.keys.push(down);
                node.children.push(child);
            }
            _ => return Err(sibling_mismatch(node_id, right_id)),
        }

        self.arena.put(node_id, node);
        self.arena.put(right_id, right);
        debug!(from = %right_id, to = %node_id, "borrowed from right sibling");
        Ok(())
    }

    /// Folds `right_id` into `left_id` and drops their separator
    /// `parent.keys[separator]` from the parent.
    fn merge(
        &mut self,
        parent_id: NodeId,
        separator: usize,
        left_id: NodeId,
        right_id: NodeId,
    ) -> Result<()> {
        let right = self.arena.release(right_id)?;
        let parent = self.arena.internal_mut(parent_id)?;
        let sep_key = parent.keys.remove(separator);
        parent.children.remove(separator + 1);

        match (self.arena.get_mut(left_id)?, right) {
            (Node::Leaf(left), Node::Leaf(right)) => left.merge(right),
            (Node::Internal(left), Node::Internal(right)) => left.merge(sep_key, right),
            _ => return Err(sibling_mismatch(left_id, right_id)),
        }
        debug!(left = %left_id, right = %right_id, parent = %parent_id, "merged nodes");
        Ok(())
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Verifies the structural invariants: sorted keys, child counts,
    /// separator bounds, equal leaf depth, occupancy, the leaf chain and the
    /// entry count.
    pub fn check_invariants(&self) -> Result<()> {
        let mut leaves = Vec::new();
        let mut visited = 0;
        self.check_node(self.root, None, None, 1, &mut leaves, &mut visited)?;

        if visited != self.arena.live_count() {
            return Err(corrupt(format!(
                "{} nodes reachable but {} live in the arena",
                visited,
                self.arena.live_count()
            )));
        }

        for (i, &leaf_id) in leaves.iter().enumerate() {
            let expected = leaves.get(i + 1).copied();
            if self.arena.leaf(leaf_id)?.next != expected {
                return Err(corrupt(format!("{} links to the wrong next leaf", leaf_id)));
            }
        }

        let total = self.leaf_keys()?.len();
        if total != self.len {
            return Err(corrupt(format!(
                "leaf chain holds {} keys, expected {}",
                total, self.len
            )));
        }
        Ok(())
    }

    fn check_node(
        &self,
        id: NodeId,
        lower: Option<&K>,
        upper: Option<&K>,
        depth: usize,
        leaves: &mut Vec<NodeId>,
        visited: &mut usize,
    ) -> Result<()> {
        *visited += 1;
        if *visited > self.arena.capacity() {
            return Err(corrupt("node graph has a cycle".to_string()));
        }

        let node = self.arena.get(id)?;
        let keys = match node {
            Node::Internal(n) => &n.keys,
            Node::Leaf(l) => &l.keys,
        };
        if keys.windows(2).any(|w| w[0] > w[1]) {
            return Err(corrupt(format!("{} keys out of order", id)));
        }
        if keys.len() > self.max_keys {
            return Err(corrupt(format!("{} holds {} keys", id, keys.len())));
        }
        if let (Some(lo), Some(first)) = (lower, keys.first()) {
            if first < lo {
                return Err(corrupt(format!("{} key {:?} below separator {:?}", id, first, lo)));
            }
        }
        if let (Some(hi), Some(last)) = (upper, keys.last()) {
            if last > hi {
                return Err(corrupt(format!("{} key {:?} above separator {:?}", id, last, hi)));
            }
        }

        let is_root = id == self.root;
        match node {
            Node::Leaf(leaf) => {
                if leaf.values.len() != leaf.keys.len() {
                    return Err(corrupt(format!("{} has mismatched keys and values", id)));
                }
                if depth != self.height {
                    return Err(corrupt(format!(
                        "{} at depth {} but height is {}",
                        id, depth, self.height
                    )));
                }
                if !is_root && leaf.keys.len() < self.leaf_min() {
                    return Err(corrupt(format!("{} underfull", id)));
                }
                leaves.push(id);
            }
            Node::Internal(internal) => {
                if internal.children.len() != internal.keys.len() + 1 {
                    return Err(corrupt(format!(
                        "{} has {} keys and {} children",
                        id,
                        internal.keys.len(),
                        internal.children.len()
                    )));
                }
                let min = if is_root { 1 } else { self.internal_min() };
                if internal.keys.len() < min {
                    return Err(corrupt(format!("{} underfull", id)));
                }
                for (i, &child) in internal.children.iter().enumerate() {
                    let lo = if i == 0 { lower } else { internal.keys.get(i - 1) };
                    let hi = internal.keys.get(i).or(upper);
                    self.check_node(child, lo, hi, depth + 1, leaves, visited)?;
                }
            }
        }
        Ok(())
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.arena.clear();
        self.root = self.arena.allocate(Node::Leaf(LeafNode::new()));
        self.height = 1;
        self.len = 0;
    }
}

fn corrupt(reason: String) -> TabulaError {
    TabulaError::TreeCorrupted(reason)
}

fn chain_too_long() -> TabulaError {
    TabulaError::TreeCorrupted("leaf chain longer than the arena".to_string())
}

fn sibling_mismatch(a: NodeId, b: NodeId) -> TabulaError {
    TabulaError::TreeCorrupted(format!("siblings {} and {} differ in kind", a, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};
    use std::collections::BTreeMap;

    fn tree(max_keys: usize) -> OrderedIndex<i32, i32> {
        OrderedIndex::new(max_keys).unwrap()
    }

    #[test]
    fn test_new_rejects_small_capacity() {
        assert!(OrderedIndex::<i32, i32>::new(1).is_err());
        assert!(OrderedIndex::<i32, i32>::new(2).is_ok());
    }

    #[test]
    fn test_empty_tree() {
        let t = tree(3);
        assert!(t.is_empty());
        assert_eq!(t.height(), 1);
        assert_eq!(t.search(&1).unwrap(), None);
        assert!(t.range(&0, &10).unwrap().is_empty());
        t.check_invariants().unwrap();
    }

    #[test]
    fn test_height_grows_only_on_root_split() {
        let mut t = tree(3);
        let mut heights = Vec::new();
        for k in 1..=7 {
            t.insert(k, k * 10).unwrap();
            heights.push(t.height());
            t.check_invariants().unwrap();
        }
        assert_eq!(heights, vec![1, 1, 1, 2, 2, 2, 2]);
        assert_eq!(t.leaf_keys().unwrap(), (1..=7).collect::<Vec<_>>());
    }

    #[test]
    fn test_search_every_key() {
        let mut t = tree(4);
        for k in (0..200).rev() {
            t.insert(k, k + 1000).unwrap();
        }
        for k in 0..200 {
            assert_eq!(t.search(&k).unwrap(), Some(k + 1000));
        }
        assert_eq!(t.search(&-1).unwrap(), None);
        assert_eq!(t.search(&200).unwrap(), None);
        t.check_invariants().unwrap();
    }

    #[test]
    fn test_range() {
        let mut t = tree(3);
        for k in (0..50).map(|k| k * 2) {
            t.insert(k, k).unwrap();
        }
        assert_eq!(t.range(&10, &20).unwrap(), vec![10, 12, 14, 16, 18, 20]);
        assert_eq!(t.range(&11, &13).unwrap(), vec![12]);
        assert_eq!(t.range(&-5, &2).unwrap(), vec![0, 2]);
        assert!(t.range(&20, &10).unwrap().is_empty());
        assert!(t.range(&1000, &2000).unwrap().is_empty());
    }

    #[test]
    fn test_duplicates_found_and_removed() {
        let mut t = tree(3);
        for v in 0..10 {
            t.insert(5, v).unwrap();
        }
        t.insert(4, 100).unwrap();
        t.insert(6, 200).unwrap();
        t.check_invariants().unwrap();

        assert_eq!(t.range(&5, &5).unwrap().len(), 10);
        for _ in 0..10 {
            assert!(t.remove(&5).unwrap().is_some());
            t.check_invariants().unwrap();
        }
        assert_eq!(t.remove(&5).unwrap(), None);
        assert_eq!(t.leaf_keys().unwrap(), vec![4, 6]);
    }

    #[test]
    fn test_remove_shrinks_to_single_leaf() {
        let mut t = tree(3);
        for k in 1..=20 {
            t.insert(k, k).unwrap();
        }
        assert!(t.height() > 2);

        for k in 1..=20 {
            assert_eq!(t.remove(&k).unwrap(), Some(k));
            t.check_invariants().unwrap();
        }
        assert!(t.is_empty());
        assert_eq!(t.height(), 1);
        assert_eq!(t.node_count(), 1);
    }

    #[test]
    fn test_remove_absent() {
        let mut t = tree(3);
        for k in [10, 20, 30, 40, 50, 60, 70] {
            t.insert(k, k).unwrap();
        }
        t.remove(&40).unwrap();
        let before = t.clone();

        for k in [25, 40, 5, 99] {
            assert_eq!(t.remove(&k).unwrap(), None);
        }
        assert_eq!(t, before);
        assert_eq!(t.node_count(), before.node_count());
        t.check_invariants().unwrap();
    }

    #[test]
    fn test_remove_separator_key() {
        let mut t = tree(3);
        for k in 1..=7 {
            t.insert(k, k).unwrap();
        }
        // 3 and 5 are separators in the root
        assert_eq!(t.remove(&3).unwrap(), Some(3));
        assert_eq!(t.remove(&5).unwrap(), Some(5));
        assert_eq!(t.search(&3).unwrap(), None);
        assert_eq!(t.leaf_keys().unwrap(), vec![1, 2, 4, 6, 7]);
        t.check_invariants().unwrap();
    }

    #[test]
    fn test_clear() {
        let mut t = tree(2);
        for k in 0..10 {
            t.insert(k, k).unwrap();
        }
        t.clear();
        assert!(t.is_empty());
        assert_eq!(t.height(), 1);
        t.check_invariants().unwrap();
    }

    #[test]
    fn test_random_against_model() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0x7ab);
        for max_keys in [2, 3, 4, 7] {
            let mut t = tree(max_keys);
            let mut model: BTreeMap<i32, i32> = BTreeMap::new();

            let mut keys: Vec<i32> = (0..400).collect();
            keys.shuffle(&mut rng);
            for &k in &keys {
                t.insert(k, -k).unwrap();
                model.insert(k, -k);
            }
            t.check_invariants().unwrap();

            for _ in 0..600 {
                let k = rng.gen_range(0..450);
                let removed = t.remove(&k).unwrap();
                assert_eq!(removed, model.remove(&k));
                if rng.gen_bool(0.3) {
                    let k = rng.gen_range(0..450);
                    if !model.contains_key(&k) {
                        t.insert(k, -k).unwrap();
                        model.insert(k, -k);
                    }
                }
            }
            t.check_invariants().unwrap();

            assert_eq!(t.len(), model.len());
            assert_eq!(
                t.leaf_keys().unwrap(),
                model.keys().copied().collect::<Vec<_>>()
            );
            let expected: Vec<i32> = model.range(100..=200).map(|(_, v)| *v).collect();
            assert_eq!(t.range(&100, &200).unwrap(), expected);
        }
    }
}
