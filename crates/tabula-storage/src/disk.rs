//! Block-level file I/O.
//!
//! A [`BlockFile`] names a file made of equally sized blocks. It keeps no
//! handle open: every call opens the file, performs one whole-block read or
//! write, and closes it again before returning.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tabula_common::page::PageNum;
use tabula_common::{Result, TabulaError};

/// A file of fixed-size blocks addressed by block number.
#[derive(Debug, Clone)]
pub struct BlockFile {
    /// Path to the file.
    path: PathBuf,
    /// Size of one block in bytes.
    block_size: usize,
    /// Enable fsync after writes.
    fsync_enabled: bool,
}

impl BlockFile {
    /// Describes a block file without touching the filesystem.
    pub fn new(path: impl Into<PathBuf>, block_size: usize, fsync_enabled: bool) -> Self {
        Self {
            path: path.into(),
            block_size,
            fsync_enabled,
        }
    }

    /// Creates the file, truncating any previous content.
    pub fn create(path: impl Into<PathBuf>, block_size: usize, fsync_enabled: bool) -> Result<Self> {
        let file = Self::new(path, block_size, fsync_enabled);
        let handle = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&file.path)?;
        if file.fsync_enabled {
            handle.sync_all()?;
        }
        Ok(file)
    }

    /// Returns the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the block size in bytes.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Returns true if the file exists on disk.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Returns the number of whole blocks in the file.
    ///
    /// A missing file has zero blocks. A trailing partial block is ignored.
    pub fn num_blocks(&self) -> Result<u32> {
        if self.block_size == 0 {
            return Ok(0);
        }
        match std::fs::metadata(&self.path) {
            Ok(meta) => Ok((meta.len() / self.block_size as u64) as u32),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Reads one block.
    pub fn read_block(&self, block_num: PageNum) -> Result<Vec<u8>> {
        let num_blocks = self.num_blocks()?;
        if block_num >= num_blocks {
            return Err(TabulaError::PageNotFound {
                page_num: block_num,
                num_pages: num_blocks,
            });
        }

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(self.offset_of(block_num)))?;

        let mut buffer = vec![0u8; self.block_size];
        file.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    /// Overwrites one existing block, or extends the file by one block when
    /// `block_num` equals the current block count.
    pub fn write_block(&self, block_num: PageNum, data: &[u8]) -> Result<()> {
        self.check_len(data)?;
        let num_blocks = self.num_blocks()?;
        if block_num > num_blocks {
            return Err(TabulaError::PageNotFound {
                page_num: block_num,
                num_pages: num_blocks,
            });
        }

        let mut file = OpenOptions::new().write(true).create(true).open(&self.path)?;
        file.seek(SeekFrom::Start(self.offset_of(block_num)))?;
        file.write_all(data)?;

        if self.fsync_enabled {
            file.sync_all()?;
        }
        Ok(())
    }

    /// Appends a block at the end of the file.
    ///
    /// Returns the number of the new block.
    pub fn append_block(&self, data: &[u8]) -> Result<PageNum> {
        let block_num = self.num_blocks()?;
        self.write_block(block_num, data)?;
        Ok(block_num)
    }

    /// Returns the byte offset of a block.
    pub fn offset_of(&self, block_num: PageNum) -> u64 {
        block_num as u64 * self.block_size as u64
    }

    fn check_len(&self, data: &[u8]) -> Result<()> {
        if data.len() != self.block_size {
            return Err(TabulaError::InvalidParameter {
                name: "block length".to_string(),
                value: format!("{} (expected {})", data.len(), self.block_size),
            });
        }
        Ok(())
    }
}
