use std::ops::Deref;
use std::sync::RwLock;

/// Page identifiers are allocated densely from zero by the buffer pool.
pub type PageId = i64;

/// Size of a data page in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Marks a frame that currently holds no page.
pub const INVALID_PAGE_ID: PageId = -1;

/// The actual page data that includes in-memory metadata like the dirty
/// bit and pin count etc. and the payload bytes that mirror storage.
pub struct PageData {
    pub id: PageId,
    pub data: Vec<u8>,
    pub is_dirty: bool,
    pub pin_count: i32,
}

impl PageData {
    fn new() -> Self {
        Self { id: INVALID_PAGE_ID, data: vec![0; PAGE_SIZE], is_dirty: false, pin_count: 0 }
    }

    /// Reset the frame to the unbound state: invalid id, zeroed payload,
    /// clean and unpinned.
    pub fn clear(&mut self) {
        self.id = INVALID_PAGE_ID;
        self.is_dirty = false;
        self.pin_count = 0;
        self.data.fill(0);
    }
}

/// Page acts as the container of the actual page data for providing
/// concurrent access protection. Once the buffer pool has returned a
/// pinned page, concurrent pinners coordinate payload access through
/// this lock.
pub struct Page {
    inner: RwLock<PageData>,
}

impl Page {
    /// Allocate a page in memory with the given PAGE_SIZE and init
    /// the metadata accordingly.
    pub fn new() -> Self {
        Page { inner: RwLock::new(PageData::new()) }
    }
}

impl Default for Page {
    fn default() -> Self {
        Page::new()
    }
}

impl Deref for Page {
    type Target = RwLock<PageData>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;

    #[test]
    fn test_page_lifecycle() -> Result<()> {
        let page = Page::new();

        // fresh page is unbound, clean and unpinned
        let guard = page.read()?;
        assert_eq!(INVALID_PAGE_ID, guard.id);
        assert_eq!(0, guard.pin_count);
        assert!(!guard.is_dirty);
        assert_eq!(PAGE_SIZE, guard.data.len());
        drop(guard);

        // bind and dirty it, then clear back to the unbound state
        let mut guard = page.write()?;
        guard.id = 7;
        guard.pin_count = 1;
        guard.is_dirty = true;
        guard.data[0] = 0xab;
        guard.clear();
        assert_eq!(INVALID_PAGE_ID, guard.id);
        assert_eq!(0, guard.pin_count);
        assert!(!guard.is_dirty);
        assert_eq!(0, guard.data[0]);

        Ok(())
    }
}
