//! Data page: a bounded, key-sorted run of fixed-size records.
//!
//! Page layout:
//! ```text
//! +--------------------------+
//! | DataPageHeader (8)       |
//! +--------------------------+
//! | record 0 .. record n-1   |  <- sorted ascending by key
//! +--------------------------+
//! | zero fill                |  <- up to BLOCK_FACTOR slots
//! +--------------------------+
//! ```

use tabula_common::page::{data_page_size, PageLink, PageNum, DATA_PAGE_HEADER_SIZE};
use tabula_common::{Key, Result, TabulaError};

/// Geometry shared by every page of one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLayout {
    /// Maximum records per page.
    pub block_factor: usize,
    /// Encoded record size.
    pub record_size: usize,
    /// Byte offset of the INT key inside a record.
    pub key_offset: usize,
}

impl PageLayout {
    /// Returns the byte size of one page.
    pub fn page_size(&self) -> usize {
        data_page_size(self.block_factor, self.record_size)
    }

    /// Reads the key of an encoded record.
    #[inline]
    pub fn key_of(&self, record: &[u8]) -> Key {
        let o = self.key_offset;
        i32::from_le_bytes([record[o], record[o + 1], record[o + 2], record[o + 3]])
    }
}

/// Data page header.
///
/// Layout (8 bytes):
/// - next_page: 4 bytes (i32, -1 = end of chain)
/// - record_count: 4 bytes (i32)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataPageHeader {
    /// Next page in the overflow chain.
    pub next: PageLink,
    /// Number of records stored in the page.
    pub record_count: i32,
}

impl DataPageHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = DATA_PAGE_HEADER_SIZE;

    /// Serializes to bytes.
    pub fn to_bytes(&self) -> Result<[u8; Self::SIZE]> {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.next.to_raw()?.to_le_bytes());
        buf[4..8].copy_from_slice(&self.record_count.to_le_bytes());
        Ok(buf)
    }

    /// Deserializes the header of page `page_num`.
    ///
    /// A negative link other than -1 is a broken chain.
    pub fn from_bytes(page_num: PageNum, buf: &[u8]) -> Result<Self> {
        let raw_next = i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let next = PageLink::from_raw(raw_next).map_err(|_| TabulaError::ChainCorruption {
            page_num,
            reason: format!("invalid overflow link {}", raw_next),
        })?;
        Ok(Self {
            next,
            record_count: i32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
        })
    }
}

/// A decoded data page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPage {
    layout: PageLayout,
    next: PageLink,
    records: Vec<Vec<u8>>,
}

impl DataPage {
    /// Creates an empty page with no overflow link.
    pub fn new(layout: PageLayout) -> Self {
        Self {
            layout,
            next: PageLink::NONE,
            records: Vec::with_capacity(layout.block_factor),
        }
    }

    /// Creates an unlinked page holding already sorted records.
    pub(crate) fn with_records(layout: PageLayout, records: Vec<Vec<u8>>) -> Self {
        debug_assert!(records.len() <= layout.block_factor);
        Self {
            layout,
            next: PageLink::NONE,
            records,
        }
    }

    /// Decodes page `page_num` from its on-disk bytes.
    pub fn from_bytes(layout: PageLayout, page_num: PageNum, buf: &[u8]) -> Result<Self> {
        if buf.len() != layout.page_size() {
            return Err(TabulaError::PageCorrupted {
                page_num,
                reason: format!("size {} (expected {})", buf.len(), layout.page_size()),
            });
        }

        let header = DataPageHeader::from_bytes(page_num, &buf[..DataPageHeader::SIZE])?;
        if header.record_count < 0 || header.record_count as usize > layout.block_factor {
            return Err(TabulaError::PageCorrupted {
                page_num,
                reason: format!(
                    "record count {} outside 0..={}",
                    header.record_count, layout.block_factor
                ),
            });
        }

        let records = (0..header.record_count as usize)
            .map(|i| {
                let start = DataPageHeader::SIZE + i * layout.record_size;
                buf[start..start + layout.record_size].to_vec()
            })
            .collect();

        Ok(Self {
            layout,
            next: header.next,
            records,
        })
    }

    /// Serializes the page, zero-filling unused slots.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.layout.page_size()];
        let header = DataPageHeader {
            next: self.next,
            record_count: self.records.len() as i32,
        };
        buf[..DataPageHeader::SIZE].copy_from_slice(&header.to_bytes()?);

        for (i, record) in self.records.iter().enumerate() {
            let start = DataPageHeader::SIZE + i * self.layout.record_size;
            buf[start..start + self.layout.record_size].copy_from_slice(record);
        }
        Ok(buf)
    }

    /// Returns the page geometry.
    pub fn layout(&self) -> PageLayout {
        self.layout
    }

    /// Returns the overflow link.
    pub fn next(&self) -> PageLink {
        self.next
    }

    /// Sets the overflow link.
    pub fn set_next(&mut self, next: PageLink) {
        self.next = next;
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the page holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns true if no slot is free.
    pub fn is_full(&self) -> bool {
        self.records.len() >= self.layout.block_factor
    }

    /// Returns the encoded records in key order.
    pub fn records(&self) -> &[Vec<u8>] {
        &self.records
    }

    /// Returns the keys in page order.
    pub fn keys(&self) -> Vec<Key> {
        self.records.iter().map(|r| self.layout.key_of(r)).collect()
    }

    /// Inserts a record after every record with a smaller or equal key.
    ///
    /// The caller checks `is_full` first.
    pub fn insert_sorted(&mut self, record: Vec<u8>) {
        debug_assert!(!self.is_full());
        let pos = sorted_position(&self.records, self.layout, self.layout.key_of(&record));
        self.records.insert(pos, record);
    }

    /// Returns the slot and bytes of the first record with `key`.
    pub fn find(&self, key: Key) -> Option<(usize, &[u8])> {
        self.records
            .iter()
            .enumerate()
            .find(|(_, r)| self.layout.key_of(r) == key)
            .map(|(slot, r)| (slot, r.as_slice()))
    }

    /// Removes and returns the record at `slot`.
    pub fn remove_at(&mut self, slot: usize) -> Vec<u8> {
        self.records.remove(slot)
    }

    /// Returns all records plus `record`, sorted by key.
    ///
    /// Used when a full page must split; the page itself is not modified.
    pub fn merged_with(&self, record: Vec<u8>) -> Vec<Vec<u8>> {
        let mut merged = self.records.clone();
        let pos = sorted_position(&merged, self.layout, self.layout.key_of(&record));
        merged.insert(pos, record);
        merged
    }
}

/// Upper-bound insertion point for `key`.
fn sorted_position(records: &[Vec<u8>], layout: PageLayout, key: Key) -> usize {
    records.partition_point(|r| layout.key_of(r) <= key)
}
