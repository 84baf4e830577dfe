use std::sync::{Arc, Mutex};

use log::{debug, error};

use crate::container::hash::ExtendibleHashTable;
use crate::error::{Error, Result};
use crate::storage::page::{Page, PageData, PageId, INVALID_PAGE_ID};
use crate::storage::{DiskManager, LogManager};

use super::replacer::SyncLRUKReplacer;
use super::{FrameId, Replacer};

/// The buffer pool is responsible for moving physical pages back and forth
/// from main memory to disk. It allows a DBMS to support databases that are
/// larger than the amount of memory available to the system.
///
/// The buffer pool's operations are transparent to other parts in the system.
/// For example, the system asks the buffer pool for a page using its unique
/// identifier (page_id) and it does not know whether that page is already in
/// memory or whether the system has to retrieve it from disk.
struct BufferPool {
    pool_size: usize,
    /// The disk the pool pages against.
    disk: Arc<dyn DiskManager>,
    /// Write-ahead log hook; when present, flushed before any dirty
    /// page write-back.
    log: Option<Arc<dyn LogManager>>,
    /// Array of buffer pool pages. The array index is the FrameId,
    /// i.e. the FrameId is in range [0, pool_size).
    pages: Vec<Arc<Page>>,
    /// Page table for keeping track of buffer pool pages.
    page_table: ExtendibleHashTable<PageId, FrameId>,
    /// List of free frames that don't have any pages on them.
    free_list: Vec<FrameId>,
    /// Replacer to find unpinned frames for replacement.
    replacer: Arc<dyn Replacer>,
    /// The next page id to be allocated.
    /// TODO: persist this info so a reopened pool continues the sequence.
    next_page_id: PageId,
}

impl BufferPool {
    fn new(
        disk: Arc<dyn DiskManager>,
        pool_size: usize,
        replacer_k: usize,
        bucket_size: usize,
        log: Option<Arc<dyn LogManager>>,
    ) -> Self {
        let mut pages = Vec::with_capacity(pool_size);
        let mut free_list = Vec::with_capacity(pool_size);
        let page_table = ExtendibleHashTable::new(bucket_size);
        let replacer: Arc<dyn Replacer> = Arc::new(SyncLRUKReplacer::new(replacer_k, pool_size));
        for i in 0..pool_size {
            pages.push(Arc::new(Page::new()));
            // initially, every frame is in the free list
            free_list.push(i);
        }
        BufferPool { pool_size, disk, log, pages, page_table, free_list, replacer, next_page_id: 0 }
    }

    /// Pick a replacement frame, trying the free list first and falling
    /// back to the replacer. None when every frame is pinned.
    fn find_frame(&mut self) -> Option<FrameId> {
        if let Some(frame_id) = self.free_list.pop() {
            return Some(frame_id);
        }
        self.replacer.evict()
    }

    /// Write the frame's page through to disk. A dirty page honors the WAL
    /// rule first: the log is flushed before its bytes reach the disk
    /// manager. A clean page is written through without touching the log,
    /// since the disk already holds everything the log describes for it.
    /// The dirty flag is cleared only after the write succeeds, so a
    /// failed write-back can be retried.
    fn write_back(&self, guard: &mut PageData) -> Result<()> {
        if guard.is_dirty {
            if let Some(log) = &self.log {
                log.flush()?;
            }
        }
        self.disk.write_page(guard.id, &guard.data)?;
        guard.is_dirty = false;
        Ok(())
    }

    /// Unbind whatever page currently occupies the frame: write it back if
    /// dirty, drop its page table entry and clear the frame metadata. On a
    /// failed write-back the frame is handed back to the replacer with its
    /// dirty flag and mapping intact, and the error propagates.
    fn evict_frame(&mut self, frame_id: FrameId, guard: &mut PageData) -> Result<()> {
        if guard.is_dirty {
            if let Err(err) = self.write_back(guard) {
                self.replacer.record_access(frame_id);
                self.replacer.set_evictable(frame_id, true);
                return Err(err);
            }
            debug!("wrote back page {} while evicting frame {}", guard.id, frame_id);
        }
        if guard.id != INVALID_PAGE_ID {
            self.page_table.remove(&guard.id)?;
        }
        guard.clear();
        Ok(())
    }

    /// Create a new page in the buffer pool, or fail with NoAvailableFrame
    /// if all frames are currently in use and not evictable (in other
    /// words, pinned).
    ///
    /// Picks the replacement frame from either the free list or the
    /// replacer (always from the free list first), writes the old page
    /// back if it was dirty, then binds a freshly allocated page id to
    /// the frame with an initial pin count of one.
    fn new_page(&mut self) -> Result<Arc<Page>> {
        let frame_id = self.find_frame().ok_or(Error::NoAvailableFrame)?;
        let page = Arc::clone(&self.pages[frame_id]);
        let mut guard = page.write()?;
        self.evict_frame(frame_id, &mut guard)?;

        let page_id = self.allocate_page();
        guard.id = page_id;
        guard.pin_count = 1;
        self.page_table.insert(page_id, frame_id)?;
        // pin the frame so the replacer won't evict it before unpin
        self.replacer.record_access(frame_id);
        self.replacer.set_evictable(frame_id, false);
        debug!("bound new page {} to frame {}", page_id, frame_id);

        drop(guard);
        Ok(page)
    }

    /// Fetch the requested page from the buffer pool, reading it from disk
    /// on a miss. Fails with NoAvailableFrame when the page needs a frame
    /// but all frames are currently in use and not evictable.
    fn fetch_page(&mut self, page_id: PageId) -> Result<Arc<Page>> {
        // resident: bump the pin count and refresh the access history
        if let Some(frame_id) = self.page_table.find(&page_id)? {
            let page = Arc::clone(&self.pages[frame_id]);
            let mut guard = page.write()?;
            guard.pin_count += 1;
            self.replacer.record_access(frame_id);
            self.replacer.set_evictable(frame_id, false);

            drop(guard);
            return Ok(page);
        }

        let frame_id = self.find_frame().ok_or(Error::NoAvailableFrame)?;
        let page = Arc::clone(&self.pages[frame_id]);
        let mut guard = page.write()?;
        self.evict_frame(frame_id, &mut guard)?;

        if let Err(err) = self.disk.read_page(page_id, &mut guard.data) {
            // the frame is clean and unbound at this point, hand it back
            self.free_list.push(frame_id);
            return Err(err);
        }
        guard.id = page_id;
        guard.pin_count = 1;
        self.page_table.insert(page_id, frame_id)?;
        self.replacer.record_access(frame_id);
        self.replacer.set_evictable(frame_id, false);
        debug!("read page {} from disk into frame {}", page_id, frame_id);

        drop(guard);
        Ok(page)
    }

    /// Unpin the target page. Returns false if the page is not resident or
    /// its pin count is already 0.
    ///
    /// The dirty flag is merged, never cleared: a page stays dirty until
    /// a flush writes it out, no matter what later unpinners report. When
    /// the pin count reaches 0 the frame becomes evictable.
    fn unpin_page(&mut self, page_id: PageId, is_dirty: bool) -> Result<bool> {
        let frame_id = match self.page_table.find(&page_id)? {
            Some(frame_id) => frame_id,
            None => return Ok(false),
        };
        let page = &self.pages[frame_id];
        let mut guard = page.write()?;
        if guard.pin_count == 0 {
            return Ok(false);
        }
        guard.pin_count -= 1;
        guard.is_dirty = guard.is_dirty || is_dirty;
        if guard.pin_count == 0 {
            self.replacer.set_evictable(frame_id, true);
        }
        Ok(true)
    }

    /// Flush the target page to disk regardless of the dirty flag and
    /// unset the dirty flag after flushing. Pins are ignored, a flush
    /// does not evict.
    ///
    /// Returns false if the page cannot be found in the page table.
    fn flush_page(&mut self, page_id: PageId) -> Result<bool> {
        let frame_id = match self.page_table.find(&page_id)? {
            Some(frame_id) => frame_id,
            None => return Ok(false),
        };
        let page = Arc::clone(&self.pages[frame_id]);
        let mut guard = page.write()?;
        self.write_back(&mut guard)?;
        Ok(true)
    }

    /// Flush every frame holding a valid page. Each frame is attempted
    /// independently: a failed write leaves that page dirty and the scan
    /// moves on.
    fn flush_all_pages(&mut self) -> Result<()> {
        for frame_id in 0..self.pool_size {
            let page = Arc::clone(&self.pages[frame_id]);
            let mut guard = page.write()?;
            if guard.id == INVALID_PAGE_ID {
                continue;
            }
            if let Err(err) = self.write_back(&mut guard) {
                error!("flushing page {} on frame {} failed: {}", guard.id, frame_id, err);
            }
        }
        Ok(())
    }

    /// Delete a page from the buffer pool. If the page is not resident,
    /// succeed vacuously. If the page is pinned, return false immediately.
    ///
    /// A dirty page is written back before its frame is recycled, then the
    /// frame stops being tracked by the replacer, leaves the page table and
    /// returns to the free list.
    fn delete_page(&mut self, page_id: PageId) -> Result<bool> {
        let frame_id = match self.page_table.find(&page_id)? {
            Some(frame_id) => frame_id,
            None => return Ok(true),
        };
        let page = Arc::clone(&self.pages[frame_id]);
        let mut guard = page.write()?;
        if guard.pin_count > 0 {
            return Ok(false);
        }
        debug_assert!(self.replacer.is_evictable(frame_id));
        if guard.is_dirty {
            self.write_back(&mut guard)?;
        }
        guard.clear();
        self.replacer.remove(frame_id);
        self.page_table.remove(&page_id)?;
        self.free_list.push(frame_id);
        self.disk.deallocate_page(page_id)?;
        Ok(true)
    }

    fn allocate_page(&mut self) -> PageId {
        let page_id = self.next_page_id;
        self.next_page_id += 1;
        page_id
    }
}

/// Buffer pool manager wraps the buffer pool with a mutex for concurrent
/// access, basically all the heavy lifting happens in the buffer pool.
pub struct BufferPoolManager {
    /// Hold the actual buffer pool protected by a mutex latch.
    /// TODO: we need more granular concurrency control instead
    ///  of having this mutex latch all the operations.
    inner: Arc<Mutex<BufferPool>>,
}

impl BufferPoolManager {
    /// Create a pool of pool_size frames over the given disk, with an
    /// LRU-k replacer and a page table using buckets of bucket_size.
    pub fn new(
        disk: Arc<dyn DiskManager>,
        pool_size: usize,
        replacer_k: usize,
        bucket_size: usize,
    ) -> Self {
        Self::with_log_manager(disk, pool_size, replacer_k, bucket_size, None)
    }

    /// Like new, but dirty write-backs flush the write-ahead log before
    /// any page bytes reach the disk.
    pub fn with_log_manager(
        disk: Arc<dyn DiskManager>,
        pool_size: usize,
        replacer_k: usize,
        bucket_size: usize,
        log: Option<Arc<dyn LogManager>>,
    ) -> Self {
        assert!(pool_size > 0, "pool size should be larger than zero");
        let inner = BufferPool::new(disk, pool_size, replacer_k, bucket_size, log);
        BufferPoolManager { inner: Arc::new(Mutex::new(inner)) }
    }

    /// Create a new page in the buffer pool, pinned once.
    pub fn new_page(&self) -> Result<Arc<Page>> {
        let mut inner = self.inner.lock()?;
        inner.new_page()
    }

    /// Fetch the requested page with the given page id from the buffer
    /// pool, reading from disk on a miss. Pins the page.
    pub fn fetch_page(&self, page_id: PageId) -> Result<Arc<Page>> {
        let mut inner = self.inner.lock()?;
        inner.fetch_page(page_id)
    }

    /// Unpin the target page from the buffer pool, merging in the caller's
    /// dirty flag. Returns false if the page is not resident or its pin
    /// count is already 0.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<bool> {
        let mut inner = self.inner.lock()?;
        inner.unpin_page(page_id, is_dirty)
    }

    /// Flush the target page to disk regardless of the dirty flag, and
    /// unset the dirty flag after flushing.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        let mut inner = self.inner.lock()?;
        inner.flush_page(page_id)
    }

    /// Flush all the valid pages in the buffer pool to disk.
    pub fn flush_all_pages(&self) -> Result<()> {
        let mut inner = self.inner.lock()?;
        inner.flush_all_pages()
    }

    /// Delete a page from the buffer pool. If the page is not resident,
    /// do nothing and return true. If the page is pinned, return false.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let mut inner = self.inner.lock()?;
        inner.delete_page(page_id)
    }
}
