//! In-memory B+ tree index.
//!
//! Nodes live in an arena and refer to each other by [`NodeId`]:
//!
//! ```text
//!                 [ 3 | 5 ]                 internal: keys + (keys + 1) children
//!                /    |    \
//!        [1, 2] -> [3, 4] -> [5, 6, 7]      leaves: keys, values, next link
//! ```
//!
//! Splits propagate up a recorded descent path, deletes borrow from or merge
//! with siblings, and the leaf chain supports ordered range scans.

mod arena;
mod node;
mod snapshot;
mod tree;

pub use arena::NodeArena;
pub use node::{InternalNode, LeafNode, Node, NodeId};
pub use tree::OrderedIndex;
