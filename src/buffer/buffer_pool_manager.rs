use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, trace};

use crate::buffer::replacer::{ClockReplacer, Replacer};
use crate::common::StorageResult;
use crate::storage::disk::disk_manager::{DiskManager, FakeDiskManager};
use crate::storage::page::page::{Page, PageId, INVALID_PAGE_ID};

pub type FrameId = usize;
pub type PageRef = Arc<RwLock<Page>>;

// Frame bookkeeping lives under the pool latch; unpinning must never touch
// the page latch, which a client may still be holding.
struct Frame {
    page: PageRef,
    page_id: PageId,
    pin_count: u32,
    is_dirty: bool,
}

impl Frame {
    fn new() -> Frame {
        Frame {
            page: Arc::new(RwLock::new(Page::default())),
            page_id: INVALID_PAGE_ID,
            pin_count: 0,
            is_dirty: false,
        }
    }
}

struct PoolState {
    frames: Vec<Frame>,
    page_table: HashMap<PageId, FrameId>,
    free_list: VecDeque<FrameId>,
}

/// Caches up to `pool_size` disk pages in memory, with pin counting, dirty
/// tracking and clock-based eviction. Every public operation holds the
/// single pool latch start to finish.
pub struct BufferPoolManager {
    pool_size: usize,
    state: Mutex<PoolState>,
    replacer: ClockReplacer,
    disk_manager: Mutex<Box<dyn DiskManager + Send>>,
}

impl BufferPoolManager {
    pub fn new(pool_size: usize, disk_manager: Box<dyn DiskManager + Send>) -> BufferPoolManager {
        BufferPoolManager {
            pool_size,
            state: Mutex::new(PoolState {
                frames: (0..pool_size).map(|_| Frame::new()).collect(),
                page_table: HashMap::new(),
                free_list: (0..pool_size).collect(),
            }),
            replacer: ClockReplacer::new(pool_size),
            disk_manager: Mutex::new(disk_manager),
        }
    }

    pub fn new_default(pool_size: usize) -> BufferPoolManager {
        BufferPoolManager::new(pool_size, Box::new(FakeDiskManager::new()))
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Returns the requested page pinned, loading it from disk if it is not
    /// resident. `None` means every frame is pinned.
    pub fn fetch_page(&self, page_id: PageId) -> StorageResult<Option<PageRef>> {
        let mut state = self.state.lock().unwrap();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            trace!(page_id, frame_id, "buffer pool hit");
            let frame = &mut state.frames[frame_id];
            frame.pin_count += 1;
            self.replacer.pin(frame_id);
            return Ok(Some(frame.page.clone()));
        }

        let frame_id = match self.acquire_frame(&mut state)? {
            Some(frame_id) => frame_id,
            None => return Ok(None),
        };

        trace!(page_id, frame_id, "buffer pool miss, loading from disk");
        {
            let mut page = state.frames[frame_id].page.write().unwrap();
            if let Err(e) = self
                .disk_manager
                .lock()
                .unwrap()
                .read_page(page_id, page.get_data_mut())
            {
                drop(page);
                state.free_list.push_back(frame_id);
                return Err(e);
            }
            page.set_id(page_id);
        }

        let frame = &mut state.frames[frame_id];
        frame.page_id = page_id;
        frame.pin_count = 1;
        frame.is_dirty = false;
        let page = frame.page.clone();
        state.page_table.insert(page_id, frame_id);
        self.replacer.pin(frame_id);
        Ok(Some(page))
    }

    /// Allocates a fresh page on disk and pins it into a zeroed frame. The
    /// new id is read off the returned page. `None` means every frame is
    /// pinned.
    pub fn new_page(&self) -> StorageResult<Option<PageRef>> {
        let mut state = self.state.lock().unwrap();

        let frame_id = match self.acquire_frame(&mut state)? {
            Some(frame_id) => frame_id,
            None => return Ok(None),
        };

        let page_id = match self.disk_manager.lock().unwrap().allocate_page() {
            Ok(page_id) => page_id,
            Err(e) => {
                state.free_list.push_back(frame_id);
                return Err(e);
            }
        };

        debug!(page_id, frame_id, "allocated new page");
        {
            let mut page = state.frames[frame_id].page.write().unwrap();
            page.reset();
            page.set_id(page_id);
        }

        let frame = &mut state.frames[frame_id];
        frame.page_id = page_id;
        frame.pin_count = 1;
        frame.is_dirty = false;
        let page = frame.page.clone();
        state.page_table.insert(page_id, frame_id);
        self.replacer.pin(frame_id);
        Ok(Some(page))
    }

    /// Drops one pin and records whether the caller wrote to the page. Once
    /// the pin count reaches zero the frame becomes a victim candidate.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let mut state = self.state.lock().unwrap();

        let frame_id = match state.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return false,
        };

        let frame = &mut state.frames[frame_id];
        frame.is_dirty |= is_dirty;
        if frame.pin_count > 0 {
            frame.pin_count -= 1;
            if frame.pin_count == 0 {
                self.replacer.unpin(frame_id);
            }
        }
        true
    }

    /// Writes the page back if it is resident and dirty. Returns `false`
    /// only for pages the pool does not hold.
    pub fn flush_page(&self, page_id: PageId) -> StorageResult<bool> {
        let mut state = self.state.lock().unwrap();

        let frame_id = match state.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return Ok(false),
        };

        let frame = &mut state.frames[frame_id];
        if frame.is_dirty {
            let page = frame.page.read().unwrap();
            self.disk_manager
                .lock()
                .unwrap()
                .write_page(page_id, page.get_data())?;
            drop(page);
            frame.is_dirty = false;
        }
        Ok(true)
    }

    pub fn flush_all_pages(&self) -> StorageResult<()> {
        let mut state = self.state.lock().unwrap();

        for frame in state.frames.iter_mut() {
            if frame.page_id != INVALID_PAGE_ID && frame.is_dirty {
                let page = frame.page.read().unwrap();
                self.disk_manager
                    .lock()
                    .unwrap()
                    .write_page(frame.page_id, page.get_data())?;
                drop(page);
                frame.is_dirty = false;
            }
        }
        debug!("flushed all dirty pages");
        Ok(())
    }

    /// Removes the page from the pool and deallocates it on disk. Deleting a
    /// page the pool does not hold succeeds; deleting a pinned page fails.
    pub fn delete_page(&self, page_id: PageId) -> StorageResult<bool> {
        let mut state = self.state.lock().unwrap();

        let frame_id = match state.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return Ok(true),
        };

        if state.frames[frame_id].pin_count > 0 {
            return Ok(false);
        }

        state.page_table.remove(&page_id);
        self.disk_manager.lock().unwrap().deallocate_page(page_id)?;

        let frame = &mut state.frames[frame_id];
        frame.page_id = INVALID_PAGE_ID;
        frame.is_dirty = false;
        frame.page.write().unwrap().reset();

        // The frame still sits in the replacer's victim pool (its pin count
        // was zero); withdraw it before it goes on the free list.
        self.replacer.pin(frame_id);
        state.free_list.push_back(frame_id);
        debug!(page_id, frame_id, "deleted page");
        Ok(true)
    }

    /// Current pin count of a resident page, `None` if the page is not held.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.state.lock().unwrap();
        state
            .page_table
            .get(&page_id)
            .map(|&frame_id| state.frames[frame_id].pin_count)
    }

    // Free list first, eviction second. The victim's frame is handed back
    // clean: written out if dirty, unmapped, zeroed.
    fn acquire_frame(&self, state: &mut PoolState) -> StorageResult<Option<FrameId>> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Ok(Some(frame_id));
        }

        let frame_id = match self.replacer.victim() {
            Some(frame_id) => frame_id,
            None => return Ok(None),
        };

        let old_page_id = state.frames[frame_id].page_id;
        debug!(old_page_id, frame_id, "evicting page");
        if state.frames[frame_id].is_dirty {
            let page = state.frames[frame_id].page.read().unwrap();
            self.disk_manager
                .lock()
                .unwrap()
                .write_page(old_page_id, page.get_data())?;
        }

        state.page_table.remove(&old_page_id);
        let frame = &mut state.frames[frame_id];
        frame.page_id = INVALID_PAGE_ID;
        frame.pin_count = 0;
        frame.is_dirty = false;
        frame.page.write().unwrap().reset();
        Ok(Some(frame_id))
    }
}
