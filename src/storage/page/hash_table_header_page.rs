use std::mem;

use serde::{Deserialize, Serialize};

use crate::common::{StorageError, StorageResult};
use crate::storage::page::page::{PageId, INVALID_PAGE_ID, PAGE_SIZE};

pub const BLOCK_PAGE_IDS_SIZE: usize =
    (PAGE_SIZE - mem::size_of::<BasicInfo>()) / mem::size_of::<PageId>();

// bincode (fixint) lays this out as three u64 words, so the page image is
// exactly BasicInfo followed by BLOCK_PAGE_IDS_SIZE page id slots.
#[derive(Serialize, Deserialize)]
struct BasicInfo {
    page_id: PageId,
    size: usize,
    next_idx: usize,
}

const BASIC_INFO_BYTES: usize = mem::size_of::<BasicInfo>();
const PAGE_ID_BYTES: usize = mem::size_of::<PageId>();

/// Entry point of the hash index: the declared block count plus the ordered
/// list of block page ids appended so far.
pub struct HashTableHeaderPage {
    basic_info: BasicInfo,
    block_page_ids: [PageId; BLOCK_PAGE_IDS_SIZE],
}

impl HashTableHeaderPage {
    pub fn new(pid: PageId, size: usize) -> HashTableHeaderPage {
        HashTableHeaderPage {
            basic_info: BasicInfo {
                page_id: pid,
                size,
                next_idx: 0,
            },
            block_page_ids: [INVALID_PAGE_ID; BLOCK_PAGE_IDS_SIZE],
        }
    }

    pub fn get_page_id(&self) -> PageId {
        self.basic_info.page_id
    }

    /// Declared block count, i.e. how many block pages the table is meant to
    /// span. `num_blocks` catches up to this during construction.
    pub fn get_size(&self) -> usize {
        self.basic_info.size
    }

    pub fn set_size(&mut self, size: usize) {
        self.basic_info.size = size
    }

    /// Number of block page ids appended so far.
    pub fn num_blocks(&self) -> usize {
        self.basic_info.next_idx
    }

    pub fn get_block_page_id(&self, idx: usize) -> PageId {
        self.block_page_ids[idx]
    }

    pub fn add_block_page_id(&mut self, pid: PageId) -> StorageResult<()> {
        if self.basic_info.next_idx == self.block_page_ids.len() {
            return Err(StorageError::HeaderFull);
        }

        self.block_page_ids[self.basic_info.next_idx] = pid;
        self.basic_info.next_idx += 1;
        Ok(())
    }

    /// Renders the full page image.
    pub fn serialize(&self) -> StorageResult<Vec<u8>> {
        let mut data = bincode::serialize(&self.basic_info)?;
        data.reserve(PAGE_SIZE - data.len());
        for pid in self.block_page_ids {
            data.extend_from_slice(&bincode::serialize(&pid)?);
        }

        Ok(data)
    }

    pub fn deserialize(data: &[u8]) -> StorageResult<HashTableHeaderPage> {
        let basic_info: BasicInfo = bincode::deserialize(&data[..BASIC_INFO_BYTES])?;

        let mut block_page_ids = [INVALID_PAGE_ID; BLOCK_PAGE_IDS_SIZE];
        for (i, slot) in block_page_ids.iter_mut().enumerate() {
            let start = BASIC_INFO_BYTES + i * PAGE_ID_BYTES;
            *slot = bincode::deserialize(&data[start..start + PAGE_ID_BYTES])?;
        }

        Ok(HashTableHeaderPage {
            basic_info,
            block_page_ids,
        })
    }
}
