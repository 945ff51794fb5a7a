use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

#[cfg(test)]
use mockall::automock;

use crate::common::{StorageError, StorageResult};
use crate::storage::page::page::{PageId, PAGE_SIZE};

/// The disk collaborator: a flat array of `PAGE_SIZE` blocks addressed by
/// `PageId`.
#[cfg_attr(test, automock)]
pub trait DiskManager: Send {
    fn allocate_page(&mut self) -> StorageResult<PageId>;

    fn deallocate_page(&mut self, page_id: PageId) -> StorageResult<()>;

    fn write_page(&mut self, page_id: PageId, page_data: &[u8]) -> StorageResult<()>;

    fn read_page(&mut self, page_id: PageId, page_data: &mut [u8]) -> StorageResult<()>;
}

pub const MAX_FILE_PAGES: usize = 0x1 << 16;

/// In-memory stand-in for a real device. Page ids grow monotonically and
/// deallocation does not recycle them.
pub struct FakeDiskManager {
    page_counter: PageId,
    fake_file: Vec<u8>,
}

impl FakeDiskManager {
    pub fn new() -> FakeDiskManager {
        FakeDiskManager {
            page_counter: 0,
            fake_file: vec![0; PAGE_SIZE * MAX_FILE_PAGES],
        }
    }
}

impl Default for FakeDiskManager {
    fn default() -> FakeDiskManager {
        FakeDiskManager::new()
    }
}

impl DiskManager for FakeDiskManager {
    fn allocate_page(&mut self) -> StorageResult<PageId> {
        if self.page_counter >= MAX_FILE_PAGES {
            return Err(StorageError::DiskFull);
        }

        let page_id = self.page_counter;
        self.page_counter += 1;
        Ok(page_id)
    }

    fn deallocate_page(&mut self, _page_id: PageId) -> StorageResult<()> {
        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, page_data: &[u8]) -> StorageResult<()> {
        if page_id >= MAX_FILE_PAGES {
            return Err(StorageError::InvalidPageId(page_id));
        }

        let start = page_id * PAGE_SIZE;
        self.fake_file[start..start + PAGE_SIZE].copy_from_slice(&page_data[..PAGE_SIZE]);
        Ok(())
    }

    fn read_page(&mut self, page_id: PageId, page_data: &mut [u8]) -> StorageResult<()> {
        if page_id >= MAX_FILE_PAGES {
            return Err(StorageError::InvalidPageId(page_id));
        }

        let start = page_id * PAGE_SIZE;
        page_data[..PAGE_SIZE].copy_from_slice(&self.fake_file[start..start + PAGE_SIZE]);
        Ok(())
    }
}

/// File-backed disk manager. One file, `PAGE_SIZE`-aligned slots, a free-slot
/// bitmap so deallocated page ids get reused. Pages are materialized lazily:
/// reading a slot the file has not grown to yet yields zeroes.
pub struct FileDiskManager {
    page_table: [u8; MAX_FILE_PAGES >> 3],
    // byte index where the next free-slot scan starts; only ever an
    // optimization, never authoritative
    search_hint: usize,
    file: File,
}

impl FileDiskManager {
    pub fn new(file_path: &Path) -> StorageResult<FileDiskManager> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(file_path)?;

        Ok(FileDiskManager {
            page_table: [0; MAX_FILE_PAGES >> 3],
            search_hint: 0,
            file,
        })
    }

    fn find_free_slot(&self) -> Option<usize> {
        let table_len = self.page_table.len();
        for i in 0..table_len {
            let byte_idx = (self.search_hint + i) % table_len;
            let byte = self.page_table[byte_idx];
            if byte != 0xff {
                let bit = byte.trailing_ones() as usize;
                return Some(byte_idx * 8 + bit);
            }
        }
        None
    }

    fn set_slot(&mut self, slot: usize) {
        self.page_table[slot / 8] |= 0x1 << (slot % 8);
        self.search_hint = slot / 8;
    }

    fn clear_slot(&mut self, slot: usize) {
        self.page_table[slot / 8] &= !(0x1 << (slot % 8));
        self.search_hint = self.search_hint.min(slot / 8);
    }

    fn validate_page_id(&self, page_id: PageId) -> StorageResult<()> {
        if page_id >= MAX_FILE_PAGES {
            return Err(StorageError::InvalidPageId(page_id));
        }

        Ok(())
    }

    fn validate_allocation(&self, page_id: PageId) -> StorageResult<()> {
        if (self.page_table[page_id / 8] >> (page_id % 8)) & 0x1 != 0x1 {
            return Err(StorageError::PageNotAllocated(page_id));
        }

        Ok(())
    }
}

impl DiskManager for FileDiskManager {
    fn allocate_page(&mut self) -> StorageResult<PageId> {
        match self.find_free_slot() {
            Some(free_slot) => {
                self.set_slot(free_slot);
                Ok(free_slot)
            }
            None => Err(StorageError::DiskFull),
        }
    }

    fn deallocate_page(&mut self, page_id: PageId) -> StorageResult<()> {
        self.validate_page_id(page_id)?;
        self.clear_slot(page_id);
        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, page_data: &[u8]) -> StorageResult<()> {
        self.validate_page_id(page_id)?;
        self.validate_allocation(page_id)?;

        self.file
            .seek(SeekFrom::Start((page_id * PAGE_SIZE) as u64))?;
        self.file.write_all(&page_data[..PAGE_SIZE])?;
        Ok(())
    }

    fn read_page(&mut self, page_id: PageId, page_data: &mut [u8]) -> StorageResult<()> {
        self.validate_page_id(page_id)?;
        self.validate_allocation(page_id)?;

        let offset = (page_id * PAGE_SIZE) as u64;
        let file_len = self.file.metadata()?.len();
        if file_len <= offset {
            page_data[..PAGE_SIZE].fill(0);
            return Ok(());
        }

        self.file.seek(SeekFrom::Start(offset))?;
        let available = ((file_len - offset) as usize).min(PAGE_SIZE);
        self.file.read_exact(&mut page_data[..available])?;
        page_data[available..PAGE_SIZE].fill(0);
        Ok(())
    }
}
