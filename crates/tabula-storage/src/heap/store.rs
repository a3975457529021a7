//! Paged heap file with a sparse primary index and overflow chaining.
//!
//! A store named `sales` owns three files in the data directory:
//! - `sales.dat`: data pages, page 0 created empty at initialization
//! - `sales.idx`: one sparse index block
//! - `sales.lock`: exclusive lock held while the store is open
//!
//! Inserts go to the anchor page chosen by the index. A full anchor splits
//! while the index has room; once it cannot split, records overflow into a
//! chain of pages linked from the anchor. Pages are never freed.

use super::index_page::IndexPage;
use super::page::{DataPage, PageLayout};
use crate::disk::BlockFile;
use crate::lock::FileLock;
use crate::record::{Record, RecordCodec, Schema};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::Path;
use tabula_common::page::{index_block_size, PageLink, PageNum};
use tabula_common::{Key, Result, StorageConfig, TabulaError};
use tracing::{debug, info};

/// A paged heap file keyed on one INT column.
#[derive(Debug)]
pub struct PagedStore {
    name: String,
    data: BlockFile,
    index: BlockFile,
    codec: RecordCodec,
    layout: PageLayout,
    index_capacity: usize,
    lock: Option<FileLock>,
}

impl PagedStore {
    /// Creates a new store, replacing any files of the same name.
    ///
    /// The data file starts with one empty page and the index with a single
    /// pointer to it.
    pub fn create(
        config: &StorageConfig,
        name: &str,
        schema: Schema,
        key_column: usize,
    ) -> Result<Self> {
        let mut store = Self::prepare(config, name, schema, key_column)?;

        store.data = BlockFile::create(
            store.data.path(),
            store.layout.page_size(),
            config.fsync_enabled,
        )?;
        store
            .data
            .append_block(&DataPage::new(store.layout).to_bytes()?)?;

        store.index = BlockFile::create(
            store.index.path(),
            index_block_size(store.index_capacity),
            config.fsync_enabled,
        )?;
        store
            .index
            .append_block(&IndexPage::initial(store.index_capacity).to_bytes())?;

        info!(
            store = %store.name,
            block_factor = store.layout.block_factor,
            index_capacity = store.index_capacity,
            record_size = store.layout.record_size,
            "created paged store"
        );
        Ok(store)
    }

    /// Opens an existing store.
    ///
    /// A missing index file is tolerated here; operations that need the
    /// index then fail with `EmptyIndex`.
    pub fn open(
        config: &StorageConfig,
        name: &str,
        schema: Schema,
        key_column: usize,
    ) -> Result<Self> {
        let store = Self::prepare(config, name, schema, key_column)?;
        if !store.data.exists() {
            return Err(TabulaError::Io(std::io::Error::new(
                ErrorKind::NotFound,
                format!("data file {} not found", store.data.path().display()),
            )));
        }

        info!(
            store = %store.name,
            pages = store.page_count()?,
            "opened paged store"
        );
        Ok(store)
    }

    /// Releases the lock. Dropping the store has the same effect.
    pub fn close(mut self) -> Result<()> {
        if let Some(lock) = self.lock.take() {
            lock.release();
        }
        info!(store = %self.name, "closed paged store");
        Ok(())
    }

    /// Validates parameters and takes the lock.
    fn prepare(
        config: &StorageConfig,
        name: &str,
        schema: Schema,
        key_column: usize,
    ) -> Result<Self> {
        config.validate()?;
        schema.require_key_column(key_column)?;
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(TabulaError::InvalidParameter {
                name: "store name".to_string(),
                value: name.to_string(),
            });
        }

        std::fs::create_dir_all(&config.data_dir)?;
        let lock = FileLock::acquire(config.file_path(&format!("{}.lock", name)))?;

        let layout = PageLayout {
            block_factor: config.block_factor,
            record_size: schema.record_size(),
            key_offset: schema.offset_of(key_column).unwrap_or(0),
        };
        let data = BlockFile::new(
            config.file_path(&format!("{}.dat", name)),
            layout.page_size(),
            config.fsync_enabled,
        );
        let index = BlockFile::new(
            config.file_path(&format!("{}.idx", name)),
            index_block_size(config.index_capacity),
            config.fsync_enabled,
        );

        Ok(Self {
            name: name.to_string(),
            data,
            index,
            codec: RecordCodec::new(schema, config.encoding_policy),
            layout,
            index_capacity: config.index_capacity,
            lock: Some(lock),
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns the store name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the codec used for records.
    pub fn codec(&self) -> &RecordCodec {
        &self.codec
    }

    /// Returns the schema.
    pub fn schema(&self) -> &Schema {
        self.codec.schema()
    }

    /// Returns the page geometry.
    pub fn layout(&self) -> PageLayout {
        self.layout
    }

    /// Returns the data file path.
    pub fn data_path(&self) -> &Path {
        self.data.path()
    }

    /// Returns the index file path.
    pub fn index_path(&self) -> &Path {
        self.index.path()
    }

    /// Returns the number of pages in the data file.
    pub fn page_count(&self) -> Result<u32> {
        self.data.num_blocks()
    }

    /// Reads data page `page_num`.
    pub fn page(&self, page_num: PageNum) -> Result<DataPage> {
        let bytes = self.data.read_block(page_num)?;
        DataPage::from_bytes(self.layout, page_num, &bytes)
    }

    /// Reads the sparse index block.
    ///
    /// A missing or empty index file reads as an index with no pointer.
    pub fn index_page(&self) -> Result<IndexPage> {
        if self.index.num_blocks()? == 0 {
            return Ok(IndexPage::empty(self.index_capacity));
        }
        let bytes = self.index.read_block(0)?;
        IndexPage::from_bytes(self.index_capacity, &bytes)
    }

    /// Returns the anchor page for `key`.
    pub fn locate_anchor(&self, key: Key) -> Result<PageNum> {
        self.index_page()?.locate(key)
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Inserts a record.
    pub fn insert(&self, record: &Record) -> Result<()> {
        let bytes = self.codec.encode(record)?;
        self.insert_encoded(bytes)
    }

    /// Inserts an already encoded record.
    pub fn insert_encoded(&self, bytes: Vec<u8>) -> Result<()> {
        if bytes.len() != self.layout.record_size {
            return Err(TabulaError::InvalidParameter {
                name: "record length".to_string(),
                value: bytes.len().to_string(),
            });
        }
        let key = self.layout.key_of(&bytes);
        let mut index = self.index_page()?;
        let anchor = index.locate(key)?;
        self.check_anchor(anchor, self.page_count()?)?;
        let mut page = self.page(anchor)?;

        if !page.is_full() {
            page.insert_sorted(bytes);
            return self.write_page(anchor, &page);
        }

        if !index.is_full() && page.next().is_none() {
            let mut left = page.merged_with(bytes.clone());
            let mid = (left.len() + 1) / 2;
            let right = left.split_off(mid);

            let left_max = self.layout.key_of(&left[left.len() - 1]);
            let right_min = self.layout.key_of(&right[0]);

            if left_max < right_min && !index.contains_key(right_min) {
                let new_page = self
                    .data
                    .append_block(&DataPage::with_records(self.layout, right).to_bytes()?)?;
                self.write_page(anchor, &DataPage::with_records(self.layout, left))?;
                index.insert_separator(right_min, new_page)?;
                self.write_index(&index)?;

                debug!(
                    store = %self.name,
                    anchor,
                    new_page,
                    separator = right_min,
                    separators = index.keys().len(),
                    "split data page"
                );
                return Ok(());
            }
        }

        self.insert_into_chain(anchor, page, bytes)
    }

    /// Places a record in the first chained page with room, or in a new page
    /// linked at the tail of the chain.
    fn insert_into_chain(
        &self,
        anchor: PageNum,
        anchor_page: DataPage,
        bytes: Vec<u8>,
    ) -> Result<()> {
        let page_count = self.page_count()?;
        let mut visited = HashSet::from([anchor]);
        let mut tail = (anchor, anchor_page);

        while let Some(next) = tail.1.next().page() {
            self.check_link(tail.0, next, page_count, &mut visited)?;
            let mut page = self.page(next)?;
            if !page.is_full() {
                page.insert_sorted(bytes);
                return self.write_page(next, &page);
            }
            tail = (next, page);
        }

        let mut new_page = DataPage::new(self.layout);
        new_page.insert_sorted(bytes);
        let new_num = self.data.append_block(&new_page.to_bytes()?)?;

        let (tail_num, mut tail_page) = tail;
        tail_page.set_next(PageLink::to(new_num));
        self.write_page(tail_num, &tail_page)?;

        debug!(
            store = %self.name,
            anchor,
            tail = tail_num,
            new_page = new_num,
            chain_length = visited.len() + 1,
            "appended overflow page"
        );
        Ok(())
    }

    /// Returns the first record with `key`, if any.
    pub fn search(&self, key: Key) -> Result<Option<Record>> {
        let anchor = self.locate_anchor(key)?;
        let mut chain = ChainCursor::new(self, anchor)?;
        while let Some((_, page)) = chain.advance()? {
            if let Some((_, bytes)) = page.find(key) {
                return self.codec.decode(bytes).map(Some);
            }
        }
        Ok(None)
    }

    /// Returns every record with `key` in chain order.
    pub fn search_all(&self, key: Key) -> Result<Vec<Record>> {
        let anchor = self.locate_anchor(key)?;
        let mut chain = ChainCursor::new(self, anchor)?;
        let mut found = Vec::new();
        while let Some((_, page)) = chain.advance()? {
            for record in page.records() {
                if self.layout.key_of(record) == key {
                    found.push(self.codec.decode(record)?);
                }
            }
        }
        Ok(found)
    }

    /// Removes the first record with `key`.
    ///
    /// Returns false, without writing anything, if the key is absent. A
    /// chained page left empty is unlinked from the chain; its space is not
    /// reclaimed.
    pub fn remove(&self, key: Key) -> Result<bool> {
        let anchor = self.locate_anchor(key)?;
        let mut chain = ChainCursor::new(self, anchor)?;
        let mut prev: Option<(PageNum, DataPage)> = None;

        while let Some((page_num, mut page)) = chain.advance()? {
            let slot = match page.find(key) {
                Some((slot, _)) => slot,
                None => {
                    prev = Some((page_num, page));
                    continue;
                }
            };

            page.remove_at(slot);
            self.write_page(page_num, &page)?;

            if page.is_empty() {
                if let Some((prev_num, mut prev_page)) = prev {
                    prev_page.set_next(page.next());
                    self.write_page(prev_num, &prev_page)?;
                    debug!(
                        store = %self.name,
                        page = page_num,
                        predecessor = prev_num,
                        "spliced empty page out of chain"
                    );
                }
            }
            return Ok(true);
        }
        Ok(false)
    }

    /// Returns every record in physical page order.
    pub fn scan_all(&self) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        for page_num in 0..self.page_count()? {
            for bytes in self.page(page_num)?.records() {
                records.push(self.codec.decode(bytes)?);
            }
        }
        Ok(records)
    }

    /// Returns the number of stored records.
    pub fn record_count(&self) -> Result<usize> {
        let mut count = 0;
        for page_num in 0..self.page_count()? {
            count += self.page(page_num)?.len();
        }
        Ok(count)
    }

    /// Returns the page numbers of the chain starting at `anchor`.
    pub fn chain(&self, anchor: PageNum) -> Result<Vec<PageNum>> {
        let mut chain = ChainCursor::new(self, anchor)?;
        let mut pages = Vec::new();
        while let Some((page_num, _)) = chain.advance()? {
            pages.push(page_num);
        }
        Ok(pages)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn write_page(&self, page_num: PageNum, page: &DataPage) -> Result<()> {
        self.data.write_block(page_num, &page.to_bytes()?)
    }

    fn write_index(&self, index: &IndexPage) -> Result<()> {
        self.index.write_block(0, &index.to_bytes())
    }

    /// Rejects an index pointer past the end of the data file.
    fn check_anchor(&self, anchor: PageNum, page_count: u32) -> Result<()> {
        if anchor >= page_count {
            return Err(TabulaError::ChainCorruption {
                page_num: anchor,
                reason: format!(
                    "index points past end of file ({} pages)",
                    page_count
                ),
            });
        }
        Ok(())
    }

    /// Validates one chain link before it is followed.
    fn check_link(
        &self,
        from: PageNum,
        to: PageNum,
        page_count: u32,
        visited: &mut HashSet<PageNum>,
    ) -> Result<()> {
        if to >= page_count {
            return Err(TabulaError::ChainCorruption {
                page_num: from,
                reason: format!("link to page {} past end of file ({} pages)", to, page_count),
            });
        }
        if !visited.insert(to) {
            return Err(TabulaError::ChainCorruption {
                page_num: from,
                reason: format!("link to page {} revisits the chain", to),
            });
        }
        Ok(())
    }
}

/// Walks an overflow chain, anchor first, with cycle and bounds checks.
struct ChainCursor<'a> {
    store: &'a PagedStore,
    page_count: u32,
    visited: HashSet<PageNum>,
    /// Page that holds the pending link, and the link itself.
    pending: Option<(PageNum, PageNum)>,
    started: bool,
    anchor: PageNum,
}

impl<'a> ChainCursor<'a> {
    fn new(store: &'a PagedStore, anchor: PageNum) -> Result<Self> {
        Ok(Self {
            store,
            page_count: store.page_count()?,
            visited: HashSet::new(),
            pending: None,
            started: false,
            anchor,
        })
    }

    fn advance(&mut self) -> Result<Option<(PageNum, DataPage)>> {
        let page_num = match (self.started, self.pending.take()) {
            (false, _) => {
                self.started = true;
                self.store.check_anchor(self.anchor, self.page_count)?;
                self.visited.insert(self.anchor);
                self.anchor
            }
            (true, Some((from, to))) => {
                self.store
                    .check_link(from, to, self.page_count, &mut self.visited)?;
                to
            }
            (true, None) => return Ok(None),
        };

        let page = self.store.page(page_num)?;
        self.pending = page.next().page().map(|next| (page_num, next));
        Ok(Some((page_num, page)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Value;
    use tabula_common::EncodingPolicy;
    use tempfile::tempdir;

    fn test_config(dir: &Path, block_factor: usize, index_capacity: usize) -> StorageConfig {
        StorageConfig {
            block_factor,
            index_capacity,
            encoding_policy: EncodingPolicy::Strict,
            fsync_enabled: false,
            ..StorageConfig::with_data_dir(dir)
        }
    }

    fn pair_schema() -> Schema {
        Schema::parse(&[("id", "INT"), ("label", "VARCHAR[8]")]).unwrap()
    }

    fn row(id: i32) -> Record {
        Record::new(vec![Value::Int(id), Value::Text(format!("r{}", id))])
    }

    fn create_test_store(block_factor: usize, index_capacity: usize) -> (PagedStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path(), block_factor, index_capacity);
        let store = PagedStore::create(&config, "items", pair_schema(), 0).unwrap();
        (store, dir)
    }

    fn corrupt_link(store: &PagedStore, page_num: PageNum, next: i32) {
        let mut bytes = store.data.read_block(page_num).unwrap();
        bytes[0..4].copy_from_slice(&next.to_le_bytes());
        store.data.write_block(page_num, &bytes).unwrap();
    }

    #[test]
    fn test_create_initializes_files() {
        let (store, dir) = create_test_store(2, 2);
        assert_eq!(store.page_count().unwrap(), 1);
        assert!(store.page(0).unwrap().is_empty());
        assert_eq!(store.index_page().unwrap().pages(), &[0]);
        assert!(dir.path().join("items.dat").exists());
        assert!(dir.path().join("items.idx").exists());
        assert!(dir.path().join("items.lock").exists());
    }

    #[test]
    fn test_key_column_must_be_int() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path(), 2, 2);
        let err = PagedStore::create(&config, "items", pair_schema(), 1).unwrap_err();
        assert!(matches!(err, TabulaError::Schema(_)));
    }

    #[test]
    fn test_second_opener_is_locked_out() {
        let (store, dir) = create_test_store(2, 2);
        let config = test_config(dir.path(), 2, 2);

        #[cfg(unix)]
        assert!(matches!(
            PagedStore::open(&config, "items", pair_schema(), 0),
            Err(TabulaError::Locked(_))
        ));

        store.close().unwrap();
        let reopened = PagedStore::open(&config, "items", pair_schema(), 0).unwrap();
        assert_eq!(reopened.page_count().unwrap(), 1);
    }

    #[test]
    fn test_open_missing_store() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path(), 2, 2);
        let err = PagedStore::open(&config, "ghost", pair_schema(), 0).unwrap_err();
        assert!(matches!(err, TabulaError::Io(_)));
    }

    #[test]
    fn test_insert_sorted_within_page() {
        let (store, _dir) = create_test_store(4, 2);
        for id in [30, 10, 20] {
            store.insert(&row(id)).unwrap();
        }
        assert_eq!(store.page(0).unwrap().keys(), vec![10, 20, 30]);
    }

    #[test]
    fn test_split_rejected_for_equal_keys_chains_instead() {
        let (store, _dir) = create_test_store(2, 4);
        for _ in 0..3 {
            store.insert(&row(5)).unwrap();
        }

        assert!(store.index_page().unwrap().keys().is_empty());
        assert_eq!(store.chain(0).unwrap(), vec![0, 1]);
        assert_eq!(store.search_all(5).unwrap().len(), 3);
    }

    #[test]
    fn test_no_split_once_chained() {
        let (store, _dir) = create_test_store(2, 4);
        for id in [1, 5, 5] {
            store.insert(&row(id)).unwrap();
        }
        // page 0 = [1, 5], page 1 = [5] chained
        store.insert(&row(3)).unwrap();

        assert!(store.index_page().unwrap().keys().is_empty());
        assert_eq!(store.search_all(5).unwrap().len(), 2);
        assert!(store.search(3).unwrap().is_some());
    }

    #[test]
    fn test_search_miss_and_hit() {
        let (store, _dir) = create_test_store(2, 2);
        store.insert(&row(10)).unwrap();
        assert_eq!(store.search(10).unwrap(), Some(row(10)));
        assert_eq!(store.search(11).unwrap(), None);
    }

    #[test]
    fn test_remove_absent_writes_nothing() {
        let (store, _dir) = create_test_store(2, 2);
        for id in [10, 20, 30] {
            store.insert(&row(id)).unwrap();
        }
        let data_before = std::fs::read(store.data_path()).unwrap();
        let index_before = std::fs::read(store.index_path()).unwrap();

        assert!(!store.remove(99).unwrap());

        assert_eq!(std::fs::read(store.data_path()).unwrap(), data_before);
        assert_eq!(std::fs::read(store.index_path()).unwrap(), index_before);
    }

    #[test]
    fn test_remove_anchor_record_keeps_page() {
        let (store, _dir) = create_test_store(2, 2);
        store.insert(&row(10)).unwrap();
        assert!(store.remove(10).unwrap());
        assert!(store.page(0).unwrap().is_empty());
        assert_eq!(store.page_count().unwrap(), 1);
        assert!(!store.remove(10).unwrap());
    }

    #[test]
    fn test_missing_index_is_empty_index() {
        let (store, _dir) = create_test_store(2, 2);
        std::fs::remove_file(store.index_path()).unwrap();

        assert!(matches!(store.insert(&row(1)), Err(TabulaError::EmptyIndex)));
        assert!(matches!(store.search(1), Err(TabulaError::EmptyIndex)));
        assert!(matches!(store.remove(1), Err(TabulaError::EmptyIndex)));
    }

    #[test]
    fn test_chain_cycle_detected() {
        let (store, _dir) = create_test_store(1, 1);
        for id in [10, 20, 30] {
            store.insert(&row(id)).unwrap();
        }
        // page 0 = [10], page 1 = [20] with separator 20, page 2 = [30] chained from 1
        assert_eq!(store.chain(1).unwrap(), vec![1, 2]);

        corrupt_link(&store, 2, 1);
        assert!(matches!(
            store.search(99),
            Err(TabulaError::ChainCorruption { page_num: 2, .. })
        ));
        assert!(matches!(
            store.insert(&row(40)),
            Err(TabulaError::ChainCorruption { .. })
        ));
    }

    #[test]
    fn test_chain_link_past_end_detected() {
        let (store, _dir) = create_test_store(1, 1);
        store.insert(&row(10)).unwrap();
        corrupt_link(&store, 0, 42);

        let err = store.search(7).unwrap_err();
        match err {
            TabulaError::ChainCorruption { page_num, reason } => {
                assert_eq!(page_num, 0);
                assert!(reason.contains("42"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_negative_chain_link_detected() {
        let (store, _dir) = create_test_store(1, 1);
        for id in [10, 20, 30] {
            store.insert(&row(id)).unwrap();
        }
        let anchor = store.locate_anchor(30).unwrap();
        let chain = store.chain(anchor).unwrap();
        assert_eq!(chain.len(), 2);
        corrupt_link(&store, anchor, -5);

        for result in [store.search(30).map(|_| ()), store.remove(30).map(|_| ())] {
            match result {
                Err(TabulaError::ChainCorruption { page_num, reason }) => {
                    assert_eq!(page_num, anchor);
                    assert!(reason.contains("-5"));
                }
                other => panic!("unexpected result: {other:?}"),
            }
        }
        assert!(store.chain(anchor).is_err());
        assert!(store.insert(&row(40)).is_err());
    }

    #[test]
    fn test_scan_all_physical_order() {
        let (store, _dir) = create_test_store(2, 2);
        for id in [10, 20, 30, 5] {
            store.insert(&row(id)).unwrap();
        }
        // 30 splits page 0 into [10, 20] + [30]; 5 splits it again into [5, 10] + [20]
        let ids: Vec<i32> = store
            .scan_all()
            .unwrap()
            .iter()
            .map(|r| r.get(0).and_then(Value::as_int).unwrap())
            .collect();
        assert_eq!(ids, vec![5, 10, 30, 20]);
        assert_eq!(store.record_count().unwrap(), 4);
        assert_eq!(store.index_page().unwrap().keys(), &[20, 30]);
    }

    #[test]
    fn test_insert_encoded_wrong_length() {
        let (store, _dir) = create_test_store(2, 2);
        assert!(store.insert_encoded(vec![0u8; 3]).is_err());
    }
}
