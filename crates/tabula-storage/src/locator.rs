//! Record locators: the value type of every index.

use tabula_common::page::PageNum;
use tabula_common::{Result, TabulaError};

/// Physical position of a stored record.
///
/// Paged heap files address records by page and slot; append-only record
/// files address them by byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordLocator {
    /// Slot within a data page.
    Slot { page: PageNum, slot: u16 },
    /// Byte offset within a record file.
    Offset(u64),
}

const TAG_SLOT: i32 = 0;
const TAG_OFFSET: i32 = 1;

impl RecordLocator {
    /// Encoded size in bytes.
    ///
    /// Layout: tag (4) + hi (4) + lo (4), all little-endian i32.
    pub const SIZE: usize = 12;

    /// Creates a page/slot locator.
    pub fn slot(page: PageNum, slot: u16) -> Self {
        RecordLocator::Slot { page, slot }
    }

    /// Creates a byte offset locator.
    pub fn offset(offset: u64) -> Self {
        RecordLocator::Offset(offset)
    }

    /// Splits the locator into three i32 words (tag, hi, lo).
    ///
    /// Fails for page numbers above `i32::MAX`, which the word layout
    /// cannot hold.
    pub fn to_parts(&self) -> Result<(i32, i32, i32)> {
        match *self {
            RecordLocator::Slot { page, slot } => {
                let hi = i32::try_from(page).map_err(|_| TabulaError::InvalidParameter {
                    name: "locator page".to_string(),
                    value: page.to_string(),
                })?;
                Ok((TAG_SLOT, hi, slot as i32))
            }
            RecordLocator::Offset(offset) => Ok((
                TAG_OFFSET,
                (offset >> 32) as u32 as i32,
                offset as u32 as i32,
            )),
        }
    }

    /// Rebuilds a locator from its three words.
    pub fn from_parts(tag: i32, hi: i32, lo: i32) -> Result<Self> {
        match tag {
            TAG_SLOT => {
                if hi < 0 || !(0..=u16::MAX as i32).contains(&lo) {
                    return Err(corrupt(tag, hi, lo));
                }
                Ok(RecordLocator::Slot {
                    page: hi as PageNum,
                    slot: lo as u16,
                })
            }
            TAG_OFFSET => {
                let offset = ((hi as u32 as u64) << 32) | lo as u32 as u64;
                Ok(RecordLocator::Offset(offset))
            }
            _ => Err(corrupt(tag, hi, lo)),
        }
    }

    /// Serializes to little-endian bytes.
    pub fn to_bytes(&self) -> Result<[u8; Self::SIZE]> {
        let (tag, hi, lo) = self.to_parts()?;
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&tag.to_le_bytes());
        buf[4..8].copy_from_slice(&hi.to_le_bytes());
        buf[8..12].copy_from_slice(&lo.to_le_bytes());
        Ok(buf)
    }

    /// Deserializes from little-endian bytes.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::SIZE {
            return Err(TabulaError::InvalidParameter {
                name: "locator length".to_string(),
                value: buf.len().to_string(),
            });
        }
        let word = |i: usize| i32::from_le_bytes([buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]);
        Self::from_parts(word(0), word(4), word(8))
    }
}

fn corrupt(tag: i32, hi: i32, lo: i32) -> TabulaError {
    TabulaError::InvalidParameter {
        name: "record locator".to_string(),
        value: format!("({}, {}, {})", tag, hi, lo),
    }
}

impl std::fmt::Display for RecordLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordLocator::Slot { page, slot } => write!(f, "page:{}:{}", page, slot),
            RecordLocator::Offset(offset) => write!(f, "offset:{}", offset),
        }
    }
}
