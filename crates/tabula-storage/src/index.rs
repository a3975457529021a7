//! Key-to-locator indexes behind one interface.
//!
//! A table layer keeps one index per indexed column and talks to it only
//! through [`IndexContract`]. Two implementations exist:
//! - [`SparseIndex`]: entries stored in a [`PagedStore`] on disk
//! - [`BPlusTreeIndex`]: entries held in an [`OrderedIndex`], optionally
//!   snapshotted to a file

use crate::btree::OrderedIndex;
use crate::heap::PagedStore;
use crate::locator::RecordLocator;
use crate::record::{Record, Schema, Value};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tabula_common::{Key, Result, StorageConfig, TabulaError};
use tracing::info;

/// Operations every index supports.
pub trait IndexContract: std::fmt::Debug {
    /// Adds an entry. Duplicate keys are accepted.
    fn add(&mut self, key: Key, locator: RecordLocator) -> Result<()>;

    /// Returns the locator of the first entry with `key`.
    fn search(&self, key: Key) -> Result<Option<RecordLocator>>;

    /// Removes the first entry with `key`. Returns false on a miss.
    fn remove(&mut self, key: Key) -> Result<bool>;

    /// Returns locators of entries with keys in `low..=high`, ordered by key.
    fn range(&self, low: Key, high: Key) -> Result<Vec<RecordLocator>>;

    /// Returns true if range order comes from the structure rather than a
    /// sort after scanning.
    fn is_range_native(&self) -> bool;

    /// Returns the kind of this index.
    fn kind(&self) -> IndexKind;

    /// Makes every change durable.
    fn persist(&self) -> Result<()>;
}

// =============================================================================
// Index selection
// =============================================================================

/// Index implementation chosen for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    Sparse,
    BPlusTree,
}

impl FromStr for IndexKind {
    type Err = TabulaError;

    /// Parses catalog index names, ignoring case.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sparse" | "sequential" => Ok(IndexKind::Sparse),
            "btree" | "b+tree" | "bplustree" => Ok(IndexKind::BPlusTree),
            "hash" | "isam" | "rtree" | "r-tree" => {
                Err(TabulaError::UnsupportedIndex(s.trim().to_string()))
            }
            _ => Err(TabulaError::InvalidParameter {
                name: "index kind".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for IndexKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexKind::Sparse => write!(f, "sparse"),
            IndexKind::BPlusTree => write!(f, "btree"),
        }
    }
}

/// Opens the index called `name`, creating it if it does not exist.
///
/// Sparse indexes live in `<name>.dat`/`<name>.idx`; tree indexes load
/// `<name>.bpt` when present and write it back on [`IndexContract::persist`].
pub fn open_index(
    kind: IndexKind,
    config: &StorageConfig,
    name: &str,
) -> Result<Box<dyn IndexContract>> {
    let index: Box<dyn IndexContract> = match kind {
        IndexKind::Sparse => Box::new(SparseIndex::open_or_create(config, name)?),
        IndexKind::BPlusTree => Box::new(BPlusTreeIndex::open_or_create(config, name)?),
    };
    info!(index = name, kind = %kind, "opened index");
    Ok(index)
}

// =============================================================================
// SparseIndex
// =============================================================================

/// Index whose entries are records of a [`PagedStore`].
#[derive(Debug)]
pub struct SparseIndex {
    store: PagedStore,
}

impl SparseIndex {
    /// Column layout of an entry: the key followed by the locator words.
    pub fn entry_schema() -> Result<Schema> {
        Schema::parse(&[("key", "INT"), ("tag", "INT"), ("hi", "INT"), ("lo", "INT")])
    }

    /// Creates an empty index, replacing any existing files.
    pub fn create(config: &StorageConfig, name: &str) -> Result<Self> {
        let store = PagedStore::create(config, name, Self::entry_schema()?, 0)?;
        Ok(Self { store })
    }

    /// Opens an existing index.
    pub fn open(config: &StorageConfig, name: &str) -> Result<Self> {
        let store = PagedStore::open(config, name, Self::entry_schema()?, 0)?;
        Ok(Self { store })
    }

    /// Opens the index if its data file exists, otherwise creates it.
    pub fn open_or_create(config: &StorageConfig, name: &str) -> Result<Self> {
        if config.file_path(&format!("{}.dat", name)).exists() {
            Self::open(config, name)
        } else {
            Self::create(config, name)
        }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &PagedStore {
        &self.store
    }

    /// Releases the store lock.
    pub fn close(self) -> Result<()> {
        self.store.close()
    }

    fn entry(key: Key, locator: RecordLocator) -> Result<Record> {
        let (tag, hi, lo) = locator.to_parts()?;
        Ok(Record::new(vec![
            Value::Int(key),
            Value::Int(tag),
            Value::Int(hi),
            Value::Int(lo),
        ]))
    }

    fn parse_entry(record: &Record) -> Result<(Key, RecordLocator)> {
        let word = |i: usize| {
            record
                .get(i)
                .and_then(Value::as_int)
                .ok_or_else(|| TabulaError::Schema(format!("index entry column {} is not INT", i)))
        };
        Ok((word(0)?, RecordLocator::from_parts(word(1)?, word(2)?, word(3)?)?))
    }
}

impl IndexContract for SparseIndex {
    fn add(&mut self, key: Key, locator: RecordLocator) -> Result<()> {
        self.store.insert(&Self::entry(key, locator)?)
    }

    fn search(&self, key: Key) -> Result<Option<RecordLocator>> {
        match self.store.search(key)? {
            Some(record) => Ok(Some(Self::parse_entry(&record)?.1)),
            None => Ok(None),
        }
    }

    fn remove(&mut self, key: Key) -> Result<bool> {
        self.store.remove(key)
    }

    fn range(&self, low: Key, high: Key) -> Result<Vec<RecordLocator>> {
        let mut hits = Vec::new();
        for record in self.store.scan_all()? {
            let (key, locator) = Self::parse_entry(&record)?;
            if (low..=high).contains(&key) {
                hits.push((key, locator));
            }
        }
        hits.sort_by_key(|(key, _)| *key);
        Ok(hits.into_iter().map(|(_, locator)| locator).collect())
    }

    fn is_range_native(&self) -> bool {
        false
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Sparse
    }

    fn persist(&self) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// BPlusTreeIndex
// =============================================================================

/// Index held in memory as a B+ tree.
#[derive(Debug, Clone)]
pub struct BPlusTreeIndex {
    tree: OrderedIndex<Key, RecordLocator>,
    snapshot_path: Option<PathBuf>,
    fsync_enabled: bool,
}

impl BPlusTreeIndex {
    /// Creates an empty index with no snapshot file.
    pub fn new(max_keys: usize) -> Result<Self> {
        Ok(Self {
            tree: OrderedIndex::new(max_keys)?,
            snapshot_path: None,
            fsync_enabled: false,
        })
    }

    /// Loads `<name>.bpt` from the data directory, or starts empty.
    pub fn open_or_create(config: &StorageConfig, name: &str) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.data_dir)?;
        let path = config.file_path(&format!("{}.bpt", name));
        let tree = if path.exists() {
            OrderedIndex::load(&path)?
        } else {
            OrderedIndex::new(config.btree_max_keys)?
        };
        Ok(Self {
            tree,
            snapshot_path: Some(path),
            fsync_enabled: config.fsync_enabled,
        })
    }

    /// Writes a snapshot to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.tree.save(path, self.fsync_enabled)
    }

    /// Reads a snapshot from `path`. The loaded index has no snapshot file
    /// of its own.
    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self {
            tree: OrderedIndex::load(path)?,
            snapshot_path: None,
            fsync_enabled: false,
        })
    }

    /// Returns the underlying tree.
    pub fn tree(&self) -> &OrderedIndex<Key, RecordLocator> {
        &self.tree
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns true if the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

impl IndexContract for BPlusTreeIndex {
    fn add(&mut self, key: Key, locator: RecordLocator) -> Result<()> {
        self.tree.insert(key, locator)
    }

    fn search(&self, key: Key) -> Result<Option<RecordLocator>> {
        self.tree.search(&key)
    }

    fn remove(&mut self, key: Key) -> Result<bool> {
        Ok(self.tree.remove(&key)?.is_some())
    }

    fn range(&self, low: Key, high: Key) -> Result<Vec<RecordLocator>> {
        self.tree.range(&low, &high)
    }

    fn is_range_native(&self) -> bool {
        true
    }

    fn kind(&self) -> IndexKind {
        IndexKind::BPlusTree
    }

    fn persist(&self) -> Result<()> {
        match &self.snapshot_path {
            Some(path) => self.save(path),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    fn test_config(dir: &Path) -> StorageConfig {
        StorageConfig {
            block_factor: 2,
            index_capacity: 2,
            btree_max_keys: 3,
            fsync_enabled: false,
            ..StorageConfig::with_data_dir(dir)
        }
    }

    fn create_test_indexes() -> (Vec<Box<dyn IndexContract>>, TempDir) {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let indexes = vec![
            open_index(IndexKind::Sparse, &config, "by_id").unwrap(),
            open_index(IndexKind::BPlusTree, &config, "by_id_tree").unwrap(),
        ];
        (indexes, dir)
    }

    #[test]
    fn test_index_kind_parse() {
        assert_eq!("sparse".parse::<IndexKind>().unwrap(), IndexKind::Sparse);
        assert_eq!("Sequential".parse::<IndexKind>().unwrap(), IndexKind::Sparse);
        assert_eq!(" BTREE ".parse::<IndexKind>().unwrap(), IndexKind::BPlusTree);
        assert!(matches!(
            "hash".parse::<IndexKind>(),
            Err(TabulaError::UnsupportedIndex(name)) if name == "hash"
        ));
        assert!(matches!(
            "rtree".parse::<IndexKind>(),
            Err(TabulaError::UnsupportedIndex(_))
        ));
        assert!(matches!(
            "heap".parse::<IndexKind>(),
            Err(TabulaError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_contract_behaves_the_same() {
        let (mut indexes, _dir) = create_test_indexes();
        for index in indexes.iter_mut() {
            for key in [50, 10, 40, 20, 30, 60, 70] {
                index.add(key, RecordLocator::offset(key as u64 * 8)).unwrap();
            }

            assert_eq!(index.search(40).unwrap(), Some(RecordLocator::offset(320)));
            assert_eq!(index.search(45).unwrap(), None);
            assert_eq!(
                index.range(15, 55).unwrap(),
                vec![
                    RecordLocator::offset(160),
                    RecordLocator::offset(240),
                    RecordLocator::offset(320),
                    RecordLocator::offset(400),
                ],
                "{} range",
                index.kind()
            );

            assert!(index.remove(40).unwrap());
            assert!(!index.remove(40).unwrap());
            assert_eq!(index.search(40).unwrap(), None);
            assert!(index.range(41, 49).unwrap().is_empty());
        }
    }

    #[test]
    fn test_range_native_flag() {
        let (indexes, _dir) = create_test_indexes();
        assert!(!indexes[0].is_range_native());
        assert!(indexes[1].is_range_native());
    }

    #[test]
    fn test_sparse_entries_keep_slot_locators() {
        let dir = tempdir().unwrap();
        let mut index = SparseIndex::create(&test_config(dir.path()), "slots").unwrap();
        index.add(7, RecordLocator::slot(3, 1)).unwrap();
        index.add(-7, RecordLocator::offset(u64::from(u32::MAX) + 5)).unwrap();

        assert_eq!(index.search(7).unwrap(), Some(RecordLocator::slot(3, 1)));
        assert_eq!(
            index.search(-7).unwrap(),
            Some(RecordLocator::offset(u64::from(u32::MAX) + 5))
        );
        assert_eq!(index.store().record_count().unwrap(), 2);
    }

    #[test]
    fn test_unencodable_locator_rejected() {
        let dir = tempdir().unwrap();
        let mut index = SparseIndex::create(&test_config(dir.path()), "far").unwrap();
        let far = RecordLocator::slot(u32::MAX, 0);

        assert!(matches!(
            index.add(1, far),
            Err(TabulaError::InvalidParameter { .. })
        ));
        assert_eq!(index.store().record_count().unwrap(), 0);

        let path = dir.path().join("far.bpt");
        let mut tree = BPlusTreeIndex::new(3).unwrap();
        tree.add(1, far).unwrap();
        assert!(tree.save(&path).is_err());
    }

    #[test]
    fn test_sparse_reopen() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let mut index = SparseIndex::create(&config, "people").unwrap();
        index.add(1, RecordLocator::offset(0)).unwrap();
        index.close().unwrap();

        let index = SparseIndex::open_or_create(&config, "people").unwrap();
        assert_eq!(index.search(1).unwrap(), Some(RecordLocator::offset(0)));
    }

    #[test]
    fn test_tree_persist_and_reopen() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());

        let mut index = open_index(IndexKind::BPlusTree, &config, "orders").unwrap();
        for key in 0..25 {
            index.add(key, RecordLocator::slot(key as u32, 0)).unwrap();
        }
        index.persist().unwrap();
        assert!(dir.path().join("orders.bpt").exists());

        let reopened = open_index(IndexKind::BPlusTree, &config, "orders").unwrap();
        assert_eq!(reopened.search(24).unwrap(), Some(RecordLocator::slot(24, 0)));
        assert_eq!(reopened.range(0, 100).unwrap().len(), 25);
    }

    #[test]
    fn test_tree_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ad_hoc.bpt");

        let mut index = BPlusTreeIndex::new(4).unwrap();
        index.add(3, RecordLocator::offset(48)).unwrap();
        index.add(3, RecordLocator::offset(96)).unwrap();
        index.save(&path).unwrap();

        let loaded = BPlusTreeIndex::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.range(3, 3).unwrap().len(), 2);
        loaded.persist().unwrap();
    }
}
