pub type PageId = usize;

pub const PAGE_SIZE: usize = 4096;
pub const INVALID_PAGE_ID: PageId = usize::MAX;

/// One page worth of bytes plus the id it was loaded for. Frames hand pages
/// out behind an `RwLock`; that lock is the per-page latch and belongs to
/// the client, not to the buffer pool.
pub struct Page {
    id: PageId,
    data: [u8; PAGE_SIZE],
}

impl Page {
    pub fn new(page_id: PageId) -> Page {
        Page {
            id: page_id,
            data: [0; PAGE_SIZE],
        }
    }

    pub fn get_id(&self) -> PageId {
        self.id
    }

    pub fn set_id(&mut self, page_id: PageId) {
        self.id = page_id;
    }

    pub fn get_data(&self) -> &[u8; PAGE_SIZE] {
        &self.data
    }

    pub fn get_data_mut(&mut self) -> &mut [u8; PAGE_SIZE] {
        &mut self.data
    }

    /// Zeroes the payload and drops the id back to the invalid sentinel.
    pub fn reset(&mut self) {
        self.id = INVALID_PAGE_ID;
        self.data = [0; PAGE_SIZE];
    }
}

impl Default for Page {
    fn default() -> Page {
        Page::new(INVALID_PAGE_ID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_construct_zeroed_page() {
        let page = Page::new(3);

        assert_eq!(page.get_id(), 3);
        assert!(page.get_data().iter().all(|b| *b == 0));
    }

    #[test]
    fn should_reset_page_to_invalid() {
        // given
        let mut page = Page::new(7);
        page.get_data_mut()[0] = 0xab;

        // when
        page.reset();

        // then
        assert_eq!(page.get_id(), INVALID_PAGE_ID);
        assert_eq!(page.get_data()[0], 0);
    }
}
