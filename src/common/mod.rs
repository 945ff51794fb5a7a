use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::page::page::PageId;

pub mod hash;

/// Fixed-width key stored in an index page. `PartialEq` stands in for the
/// key comparator collaborator.
pub trait KeyType: Default + Clone + PartialEq + Serialize + DeserializeOwned {}

/// Fixed-width value stored next to a key, typically a record identifier.
pub trait ValueType: Default + Clone + PartialEq + Serialize + DeserializeOwned {}

impl KeyType for i32 {}
impl KeyType for i64 {}
impl KeyType for u32 {}
impl KeyType for u64 {}

impl ValueType for i32 {}
impl ValueType for i64 {}
impl ValueType for u32 {}
impl ValueType for u64 {}

/// Record identifier: the page that holds the record plus its slot within
/// that page.
#[derive(Serialize, Deserialize, Default, Clone, Copy, PartialEq, Eq, Debug)]
pub struct Rid {
    pub page_id: PageId,
    pub slot_num: u32,
}

impl ValueType for Rid {}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("page codec failure: {0}")]
    Codec(#[from] bincode::Error),

    #[error("page id {0} out of range")]
    InvalidPageId(PageId),

    #[error("page id {0} not allocated")]
    PageNotAllocated(PageId),

    #[error("disk file has no free page slots")]
    DiskFull,

    #[error("buffer pool has no free or evictable frame")]
    BufferPoolFull,

    #[error("hash table header has no room for another block page id")]
    HeaderFull,
}

pub type StorageResult<T> = Result<T, StorageError>;
