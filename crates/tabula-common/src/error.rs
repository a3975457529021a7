//! Error types for Tabula.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using TabulaError.
pub type Result<T> = std::result::Result<T, TabulaError>;

/// Errors that can occur in Tabula operations.
///
/// A lookup miss is never an error: searches return `Option` and removals
/// return `bool`.
#[derive(Debug, Error)]
pub enum TabulaError {
    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Page not found: {page_num} (file has {num_pages} pages)")]
    PageNotFound { page_num: u32, num_pages: u32 },

    #[error("Page corrupted: {page_num}, reason: {reason}")]
    PageCorrupted { page_num: u32, reason: String },

    #[error("Storage is locked by another process: {}", .0.display())]
    Locked(PathBuf),

    // Schema and encoding errors
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Cannot encode column '{column}': {reason}")]
    Encoding { column: String, reason: String },

    // Sparse index errors
    #[error("Sparse index holds no page pointer")]
    EmptyIndex,

    #[error("Sparse index full ({capacity} separator keys)")]
    IndexFull { capacity: usize },

    #[error("Overflow chain corrupted at page {page_num}: {reason}")]
    ChainCorruption { page_num: u32, reason: String },

    // B+ tree errors
    #[error("B+ tree corrupted: {0}")]
    TreeCorrupted(String),

    #[error("Unsupported index kind: {0}")]
    UnsupportedIndex(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter { name: String, value: String },
}
