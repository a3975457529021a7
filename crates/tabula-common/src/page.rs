//! Block layout definitions shared by the heap and index files.
//!
//! Data page layout:
//! ```text
//! +---------------------------+ 0
//! | next_page: i32 (-1 none)  | 4
//! | record_count: i32         | 8 (DATA_PAGE_HEADER_SIZE)
//! +---------------------------+
//! | record 0                  |
//! | record 1                  |
//! | ... BLOCK_FACTOR slots    |  <- unused slots zero-filled
//! +---------------------------+
//! ```
//!
//! Sparse index block layout:
//! ```text
//! +---------------------------+ 0
//! | key_count: i32            | 4 (INDEX_HEADER_SIZE)
//! +---------------------------+
//! | keys: M x i32             |  <- strictly increasing, tail zero-filled
//! +---------------------------+
//! | pages: (M + 1) x i32      |  <- key_count + 1 used, tail zero-filled
//! +---------------------------+
//! ```
//!
//! All integers are little-endian.

use crate::error::{Result, TabulaError};
use serde::{Deserialize, Serialize};

/// Number of a block within a file (0-indexed).
pub type PageNum = u32;

/// On-disk encoding of an absent page link.
pub const NO_PAGE: i32 = -1;

/// Size of the data page header (next_page + record_count).
pub const DATA_PAGE_HEADER_SIZE: usize = 8;

/// Size of the sparse index header (key_count).
pub const INDEX_HEADER_SIZE: usize = 4;

/// Size of a separator key in the sparse index.
pub const INDEX_KEY_SIZE: usize = 4;

/// Size of a page pointer in the sparse index.
pub const INDEX_POINTER_SIZE: usize = 4;

/// Returns the byte size of one data page.
pub fn data_page_size(block_factor: usize, record_size: usize) -> usize {
    DATA_PAGE_HEADER_SIZE + block_factor * record_size
}

/// Returns the byte size of the sparse index block for `capacity` keys.
pub fn index_block_size(capacity: usize) -> usize {
    INDEX_HEADER_SIZE + capacity * INDEX_KEY_SIZE + (capacity + 1) * INDEX_POINTER_SIZE
}

/// Link from one data page to the next page of its overflow chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PageLink(Option<PageNum>);

impl PageLink {
    /// The end-of-chain link.
    pub const NONE: PageLink = PageLink(None);

    /// Creates a link to the given page.
    pub fn to(page_num: PageNum) -> Self {
        Self(Some(page_num))
    }

    /// Returns the linked page, if any.
    pub fn page(&self) -> Option<PageNum> {
        self.0
    }

    /// Returns true if this link terminates the chain.
    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    /// Encodes the link as stored on disk.
    ///
    /// Fails for page numbers that do not fit the signed on-disk field.
    pub fn to_raw(&self) -> Result<i32> {
        match self.0 {
            Some(page_num) => i32::try_from(page_num).map_err(|_| invalid_link(page_num)),
            None => Ok(NO_PAGE),
        }
    }

    /// Decodes an on-disk link. Only `NO_PAGE` terminates the chain; any
    /// other negative value is rejected.
    pub fn from_raw(raw: i32) -> Result<Self> {
        match raw {
            NO_PAGE => Ok(Self(None)),
            r if r < 0 => Err(invalid_link(r)),
            r => Ok(Self(Some(r as PageNum))),
        }
    }
}

fn invalid_link(value: impl std::fmt::Display) -> TabulaError {
    TabulaError::InvalidParameter {
        name: "page link".to_string(),
        value: value.to_string(),
    }
}

impl std::fmt::Display for PageLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(page_num) => write!(f, "page:{}", page_num),
            None => write!(f, "none"),
        }
    }
}
