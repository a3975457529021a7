//! Binary snapshots of a key-to-locator tree.
//!
//! Layout, little-endian:
//! ```text
//! +--------------------+ 0
//! | magic: [u8; 4]     | 4
//! | version: u16       | 6
//! | reserved: u16      | 8
//! | max_keys: u32      | 12
//! | entry_count: u64   | 20 (HEADER_SIZE)
//! +--------------------+
//! | key: i32           |
//! | locator: [u8; 12]  |
//! | ...                |
//! +--------------------+
//! ```
//!
//! Entries are written in leaf-chain order. Loading rebuilds the tree by
//! insertion, so node layout is not preserved, only contents.

use super::tree::OrderedIndex;
use crate::locator::RecordLocator;
use bytes::{Buf, BufMut};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tabula_common::{Key, Result, TabulaError};
use tracing::debug;

const MAGIC: &[u8; 4] = b"TBPT";
const VERSION: u16 = 1;

/// Size of the snapshot header in bytes.
const HEADER_SIZE: usize = 20;
/// Size of one entry in bytes.
const ENTRY_SIZE: usize = 4 + RecordLocator::SIZE;

impl OrderedIndex<Key, RecordLocator> {
    /// Writes every entry to `path`, replacing the file.
    pub fn save(&self, path: &Path, fsync: bool) -> Result<()> {
        let entries = self.entries()?;
        let mut buf = Vec::with_capacity(HEADER_SIZE + entries.len() * ENTRY_SIZE);
        buf.put_slice(MAGIC);
        buf.put_u16_le(VERSION);
        buf.put_u16_le(0);
        buf.put_u32_le(self.max_keys() as u32);
        buf.put_u64_le(entries.len() as u64);
        for (key, locator) in &entries {
            buf.put_i32_le(*key);
            buf.put_slice(&locator.to_bytes()?);
        }

        let mut file = File::create(path)?;
        file.write_all(&buf)?;
        if fsync {
            file.sync_all()?;
        }
        debug!(path = %path.display(), entries = entries.len(), "saved tree snapshot");
        Ok(())
    }

    /// Reads a snapshot written by [`save`](Self::save).
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        if data.len() < HEADER_SIZE {
            return Err(bad_snapshot(format!("{} bytes is shorter than the header", data.len())));
        }

        let mut buf = &data[..];
        if &buf[..4] != MAGIC {
            return Err(bad_snapshot("bad magic".to_string()));
        }
        buf.advance(4);
        let version = buf.get_u16_le();
        if version != VERSION {
            return Err(bad_snapshot(format!("unsupported version {}", version)));
        }
        buf.advance(2);
        let max_keys = buf.get_u32_le() as usize;
        let count = buf.get_u64_le();

        let expected = (count as usize)
            .checked_mul(ENTRY_SIZE)
            .filter(|&len| len == buf.remaining());
        if expected.is_none() {
            return Err(bad_snapshot(format!(
                "{} entries do not fit {} body bytes",
                count,
                buf.remaining()
            )));
        }

        let mut tree = OrderedIndex::new(max_keys)?;
        for _ in 0..count {
            let key = buf.get_i32_le();
            let locator = RecordLocator::from_bytes(&buf[..RecordLocator::SIZE])?;
            buf.advance(RecordLocator::SIZE);
            tree.insert(key, locator)?;
        }
        debug!(path = %path.display(), entries = count, "loaded tree snapshot");
        Ok(tree)
    }
}

fn bad_snapshot(reason: String) -> TabulaError {
    TabulaError::TreeCorrupted(format!("snapshot: {}", reason))
}
