//! Paged heap storage.
//!
//! This module provides:
//! - DataPage: fixed-capacity page of key-sorted records with an overflow link
//! - IndexPage: the sparse index block of separator keys and page pointers
//! - PagedStore: heap file coordinating both, with splits and overflow chains

mod index_page;
mod page;
mod store;

pub use index_page::IndexPage;
pub use page::{DataPage, DataPageHeader, PageLayout};
pub use store::PagedStore;
