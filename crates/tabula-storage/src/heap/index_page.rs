//! Sparse index block: sorted separator keys and page pointers.
//!
//! `pages[0]` covers keys below `keys[0]`; `pages[i + 1]` covers
//! `keys[i] <= key < keys[i + 1]`.

use tabula_common::page::{
    index_block_size, PageNum, INDEX_HEADER_SIZE, INDEX_KEY_SIZE, INDEX_POINTER_SIZE,
};
use tabula_common::{Key, Result, TabulaError};

/// The single block of a sparse index file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPage {
    capacity: usize,
    keys: Vec<Key>,
    pages: Vec<PageNum>,
}

impl IndexPage {
    /// Creates an index with no page pointer at all.
    ///
    /// This is what a missing or empty index file reads as; every lookup
    /// against it fails with `EmptyIndex`.
    pub fn empty(capacity: usize) -> Self {
        Self {
            capacity,
            keys: Vec::new(),
            pages: Vec::new(),
        }
    }

    /// Creates the initial index: no separators, everything goes to page 0.
    pub fn initial(capacity: usize) -> Self {
        Self {
            capacity,
            keys: Vec::new(),
            pages: vec![0],
        }
    }

    /// Returns the byte size of the block.
    pub fn block_size(&self) -> usize {
        index_block_size(self.capacity)
    }

    /// Decodes the block.
    pub fn from_bytes(capacity: usize, buf: &[u8]) -> Result<Self> {
        let corrupted = |reason: String| TabulaError::PageCorrupted {
            page_num: 0,
            reason: format!("index block: {}", reason),
        };

        if buf.len() != index_block_size(capacity) {
            return Err(corrupted(format!(
                "size {} (expected {})",
                buf.len(),
                index_block_size(capacity)
            )));
        }

        let read_i32 = |offset: usize| {
            i32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
        };

        let key_count = read_i32(0);
        if key_count < 0 || key_count as usize > capacity {
            return Err(corrupted(format!(
                "key count {} outside 0..={}",
                key_count, capacity
            )));
        }
        let key_count = key_count as usize;

        let keys: Vec<Key> = (0..key_count)
            .map(|i| read_i32(INDEX_HEADER_SIZE + i * INDEX_KEY_SIZE))
            .collect();
        if keys.windows(2).any(|w| w[0] >= w[1]) {
            return Err(corrupted("separator keys not strictly increasing".to_string()));
        }

        let pages_start = INDEX_HEADER_SIZE + capacity * INDEX_KEY_SIZE;
        let mut pages = Vec::with_capacity(key_count + 1);
        for i in 0..=key_count {
            let raw = read_i32(pages_start + i * INDEX_POINTER_SIZE);
            if raw < 0 {
                return Err(corrupted(format!("negative page pointer {}", raw)));
            }
            pages.push(raw as PageNum);
        }

        Ok(Self {
            capacity,
            keys,
            pages,
        })
    }

    /// Serializes the block, zero-filling unused key and pointer slots.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.block_size()];
        buf[0..4].copy_from_slice(&(self.keys.len() as i32).to_le_bytes());

        for (i, key) in self.keys.iter().enumerate() {
            let offset = INDEX_HEADER_SIZE + i * INDEX_KEY_SIZE;
            buf[offset..offset + 4].copy_from_slice(&key.to_le_bytes());
        }

        let pages_start = INDEX_HEADER_SIZE + self.capacity * INDEX_KEY_SIZE;
        for (i, page) in self.pages.iter().enumerate() {
            let offset = pages_start + i * INDEX_POINTER_SIZE;
            buf[offset..offset + 4].copy_from_slice(&(*page as i32).to_le_bytes());
        }
        buf
    }

    /// Returns the page whose range holds `key`: the pointer after the
    /// rightmost separator <= key, or `pages[0]` if there is none.
    pub fn locate(&self, key: Key) -> Result<PageNum> {
        if self.pages.is_empty() {
            return Err(TabulaError::EmptyIndex);
        }
        let idx = self.keys.partition_point(|k| *k <= key);
        Ok(self.pages[idx])
    }

    /// Returns true if `key` is already a separator.
    pub fn contains_key(&self, key: Key) -> bool {
        self.keys.binary_search(&key).is_ok()
    }

    /// Adds a separator pointing at `page`.
    pub fn insert_separator(&mut self, key: Key, page: PageNum) -> Result<()> {
        if self.pages.is_empty() {
            return Err(TabulaError::EmptyIndex);
        }
        if self.is_full() {
            return Err(TabulaError::IndexFull {
                capacity: self.capacity,
            });
        }
        match self.keys.binary_search(&key) {
            Ok(_) => Err(TabulaError::InvalidParameter {
                name: "separator".to_string(),
                value: format!("{} already present", key),
            }),
            Err(pos) => {
                self.keys.insert(pos, key);
                self.pages.insert(pos + 1, page);
                Ok(())
            }
        }
    }

    /// Returns true if no separator slot is free.
    pub fn is_full(&self) -> bool {
        self.keys.len() >= self.capacity
    }

    /// Returns the separator capacity M.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the separator keys.
    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    /// Returns the page pointers.
    pub fn pages(&self) -> &[PageNum] {
        &self.pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_locate() {
        let index = IndexPage::initial(2);
        assert_eq!(index.locate(-100).unwrap(), 0);
        assert_eq!(index.locate(i32::MAX).unwrap(), 0);
        assert_eq!(index.pages(), &[0]);
    }

    #[test]
    fn test_empty_index() {
        let index = IndexPage::empty(2);
        assert!(matches!(index.locate(1), Err(TabulaError::EmptyIndex)));
    }

    #[test]
    fn test_insert_separator_and_locate() {
        let mut index = IndexPage::initial(4);
        index.insert_separator(30, 1).unwrap();
        index.insert_separator(50, 2).unwrap();
        index.insert_separator(40, 3).unwrap();

        assert_eq!(index.keys(), &[30, 40, 50]);
        assert_eq!(index.pages(), &[0, 1, 3, 2]);

        assert_eq!(index.locate(29).unwrap(), 0);
        assert_eq!(index.locate(30).unwrap(), 1);
        assert_eq!(index.locate(39).unwrap(), 1);
        assert_eq!(index.locate(40).unwrap(), 3);
        assert_eq!(index.locate(50).unwrap(), 2);
        assert_eq!(index.locate(1000).unwrap(), 2);
    }

    #[test]
    fn test_insert_separator_full() {
        let mut index = IndexPage::initial(1);
        index.insert_separator(10, 1).unwrap();
        assert!(index.is_full());
        assert!(matches!(
            index.insert_separator(20, 2),
            Err(TabulaError::IndexFull { capacity: 1 })
        ));
    }

    #[test]
    fn test_insert_separator_duplicate() {
        let mut index = IndexPage::initial(3);
        index.insert_separator(10, 1).unwrap();
        assert!(index.contains_key(10));
        assert!(index.insert_separator(10, 2).is_err());
        assert_eq!(index.keys().len(), 1);
    }

    #[test]
    fn test_bytes_layout() {
        let mut index = IndexPage::initial(2);
        index.insert_separator(30, 1).unwrap();

        let bytes = index.to_bytes();
        // key_count + 2 keys + 3 pointers
        assert_eq!(bytes.len(), 24);
        assert_eq!(&bytes[0..4], &1i32.to_le_bytes());
        assert_eq!(&bytes[4..8], &30i32.to_le_bytes());
        assert_eq!(&bytes[8..12], &[0, 0, 0, 0]);
        assert_eq!(&bytes[12..16], &0i32.to_le_bytes());
        assert_eq!(&bytes[16..20], &1i32.to_le_bytes());
        assert_eq!(&bytes[20..24], &[0, 0, 0, 0]);

        assert_eq!(IndexPage::from_bytes(2, &bytes).unwrap(), index);
    }

    #[test]
    fn test_from_bytes_rejects_corruption() {
        let mut bytes = IndexPage::initial(2).to_bytes();
        bytes[0..4].copy_from_slice(&3i32.to_le_bytes());
        assert!(IndexPage::from_bytes(2, &bytes).is_err());

        let mut bytes = IndexPage::initial(2).to_bytes();
        bytes[0..4].copy_from_slice(&2i32.to_le_bytes());
        bytes[4..8].copy_from_slice(&5i32.to_le_bytes());
        bytes[8..12].copy_from_slice(&5i32.to_le_bytes());
        assert!(IndexPage::from_bytes(2, &bytes).is_err());

        assert!(IndexPage::from_bytes(2, &[0u8; 7]).is_err());
    }
}
