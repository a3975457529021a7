//! Storage engine for Tabula.
//!
//! This crate provides:
//! - Block file I/O and an exclusive per-store file lock
//! - Fixed-width record encoding, schemas and an append-only record file
//! - A paged heap store with a sparse primary index and overflow chains
//! - An in-memory B+ tree with snapshot files
//! - The index contract shared by the sparse and tree indexes

mod btree;
mod disk;
mod heap;
mod index;
mod lock;
mod locator;
mod record;

pub use btree::{InternalNode, LeafNode, Node, NodeArena, NodeId, OrderedIndex};
pub use disk::BlockFile;
pub use heap::{DataPage, DataPageHeader, IndexPage, PageLayout, PagedStore};
pub use index::{open_index, BPlusTreeIndex, IndexContract, IndexKind, SparseIndex};
pub use lock::FileLock;
pub use locator::RecordLocator;
pub use record::{
    normalize_date, Column, Record, RecordCodec, RecordFile, Schema, Value, DATE_SENTINEL,
};
