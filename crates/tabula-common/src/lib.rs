//! Tabula common types, errors, and configuration.
//!
//! This crate provides shared definitions used by the Tabula storage layer.

pub mod config;
pub mod error;
pub mod page;
pub mod types;

pub use config::{EncodingPolicy, StorageConfig};
pub use error::{Result, TabulaError};
pub use page::{PageLink, PageNum, NO_PAGE};
pub use types::{ColumnType, Key};
