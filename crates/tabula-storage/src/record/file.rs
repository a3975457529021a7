//! Append-only record file addressed by byte offset.
//!
//! Records are stored back to back with no header. Deleting a record
//! overwrites it with zero bytes (a tombstone); space is never reclaimed.
//! A record that encodes to all zero bytes is indistinguishable from a
//! tombstone.

use super::codec::RecordCodec;
use super::value::Record;
use crate::disk::BlockFile;
use std::path::{Path, PathBuf};
use tabula_common::page::PageNum;
use tabula_common::{Result, TabulaError};
use tracing::debug;

/// A heap of fixed-size records addressed by byte offset.
#[derive(Debug)]
pub struct RecordFile {
    file: BlockFile,
    codec: RecordCodec,
}

impl RecordFile {
    /// Creates an empty record file, truncating any existing one.
    pub fn create(path: impl Into<PathBuf>, codec: RecordCodec, fsync_enabled: bool) -> Result<Self> {
        let file = BlockFile::create(path, codec.record_size(), fsync_enabled)?;
        Ok(Self { file, codec })
    }

    /// Opens a record file, creating it empty if it does not exist.
    pub fn open(path: impl Into<PathBuf>, codec: RecordCodec, fsync_enabled: bool) -> Result<Self> {
        let file = BlockFile::new(path, codec.record_size(), fsync_enabled);
        if !file.exists() {
            return Self::create(file.path().to_path_buf(), codec, fsync_enabled);
        }
        Ok(Self { file, codec })
    }

    /// Returns the file path.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Returns the codec.
    pub fn codec(&self) -> &RecordCodec {
        &self.codec
    }

    /// Returns the number of record slots, tombstones included.
    pub fn slot_count(&self) -> Result<u32> {
        self.file.num_blocks()
    }

    /// Appends a record and returns its byte offset.
    pub fn append(&self, record: &Record) -> Result<u64> {
        let bytes = self.codec.encode(record)?;
        let slot = self.file.append_block(&bytes)?;
        let offset = self.file.offset_of(slot);
        debug!(path = %self.file.path().display(), offset, "appended record");
        Ok(offset)
    }

    /// Reads the record at `offset`.
    ///
    /// Returns `None` past the end of the file or for a deleted record.
    pub fn read(&self, offset: u64) -> Result<Option<Record>> {
        let slot = self.slot_of(offset)?;
        if slot >= self.file.num_blocks()? {
            return Ok(None);
        }
        let bytes = self.file.read_block(slot)?;
        if is_tombstone(&bytes) {
            return Ok(None);
        }
        self.codec.decode(&bytes).map(Some)
    }

    /// Overwrites the record at `offset`.
    pub fn update(&self, offset: u64, record: &Record) -> Result<()> {
        let slot = self.existing_slot(offset)?;
        let bytes = self.codec.encode(record)?;
        self.file.write_block(slot, &bytes)
    }

    /// Replaces the record at `offset` with a tombstone.
    pub fn delete(&self, offset: u64) -> Result<()> {
        let slot = self.existing_slot(offset)?;
        self.file.write_block(slot, &vec![0u8; self.codec.record_size()])?;
        debug!(path = %self.file.path().display(), offset, "deleted record");
        Ok(())
    }

    /// Returns every live record with its offset, in file order.
    pub fn scan(&self) -> Result<Vec<(u64, Record)>> {
        let slots = self.file.num_blocks()?;
        let mut records = Vec::new();
        for slot in 0..slots {
            let bytes = self.file.read_block(slot)?;
            if is_tombstone(&bytes) {
                continue;
            }
            records.push((self.file.offset_of(slot), self.codec.decode(&bytes)?));
        }
        Ok(records)
    }

    fn slot_of(&self, offset: u64) -> Result<PageNum> {
        let size = self.codec.record_size() as u64;
        if offset % size != 0 || offset / size > PageNum::MAX as u64 {
            return Err(TabulaError::InvalidParameter {
                name: "record offset".to_string(),
                value: format!("{} (record size {})", offset, size),
            });
        }
        Ok((offset / size) as PageNum)
    }

    fn existing_slot(&self, offset: u64) -> Result<PageNum> {
        let slot = self.slot_of(offset)?;
        let slots = self.file.num_blocks()?;
        if slot >= slots {
            return Err(TabulaError::PageNotFound {
                page_num: slot,
                num_pages: slots,
            });
        }
        Ok(slot)
    }
}

fn is_tombstone(bytes: &[u8]) -> bool {
    bytes.iter().all(|&b| b == 0)
}
