use crate::engine::*;
use async_lock::Mutex as AsyncMutex;
use std::cell::Cell;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::ops::AsyncFnOnce;
use std::rc::Rc;
use std::sync::Mutex as StdMutex;
// Difference between original MemoryCache.cs
// - Reference counter is with Arc instead of ShareCounter
// - Writable page is represented as Box<PageBuffer>

/// Pages pre-allocated per segment when the free list runs dry. Chosen so a
/// segment is a couple of megabytes, matching the batch sizes the page
/// buffer pool elsewhere in the engine grows by.
const SEGMENT_PAGE_COUNT: usize = 256;

/// Segments allowed before `get_*` starts evicting unreferenced readable
/// pages instead of growing further. 64 segments of 256 pages at
/// `PAGE_SIZE` bytes each is a 128 MiB ceiling.
const DEFAULT_SEGMENT_CEILING: usize = 64;

pub(crate) struct MemoryCache {
    readable: StdMutex<HashMap<PositionOrigin, Rc<PageBuffer>>>,
    read_lock: AsyncMutex<()>,
    free_page_cache: FreePageCache,
}

impl MemoryCache {
    pub fn new() -> Self {
        MemoryCache {
            readable: StdMutex::new(HashMap::new()),
            read_lock: AsyncMutex::new(()),
            free_page_cache: FreePageCache::new(DEFAULT_SEGMENT_CEILING),
        }
    }

    /// Reclaims the oldest readable page nobody holds a live reference to
    /// (the map's own `Rc` is the only one standing), so the free cache has
    /// something to recycle once it has hit its segment ceiling. Returns
    /// `None` if every cached page is currently checked out by a
    /// transaction, in which case the caller grows past the ceiling rather
    /// than stall (the engine is single-threaded, so there is nothing else
    /// running that could release a reference and unblock it).
    fn evict_unreferenced_readable(&self) -> Option<Box<PageBuffer>> {
        let mut readable = self.readable.lock().unwrap();

        let victim = readable
            .iter()
            .filter(|(_, page)| Rc::strong_count(page) == 1)
            .min_by_key(|(_, page)| page.timestamp())
            .map(|(key, _)| *key)?;

        let page = readable.remove(&victim).expect("key just looked up");
        let mut page =
            Rc::try_unwrap(page).unwrap_or_else(|_| panic!("evicted page still shared"));
        page.reset();
        Some(Box::new(page))
    }

    pub async fn get_readable_page(
        &self,
        position: u64,
        origin: FileOrigin,
        factory: impl AsyncFnOnce(u64, &mut PageBufferArray) -> Result<()>,
    ) -> Result<Rc<PageBuffer>> {
        let key = PositionOrigin::new(position, origin);
        if let Some(existing) = self.readable.lock().unwrap().get(&key) {
            existing.update_time();
            return Ok(existing.clone());
        }

        // lock read_lock before unlocking readable lock for
        let read_lock = self.read_lock.lock().await;

        // re-check since another thread may already read
        if let Some(existing) = self.readable.lock().unwrap().get(&key) {
            existing.update_time();
            return Ok(existing.clone());
        }

        // we ensured the page is not read by other thread(s) so read and write
        let mut page = self
            .free_page_cache
            .get_free_page(|| self.evict_unreferenced_readable());

        let as_mut = Rc::get_mut(&mut page).unwrap();
        as_mut.set_position_origin(position, origin);
        factory(position, as_mut.buffer_mut()).await?;

        self.readable.lock().unwrap().insert(key, page.clone());

        drop(read_lock);

        page.update_time();
        Ok(page)
    }

    pub async fn get_writable_page(
        &self,
        position: u64,
        origin: FileOrigin,
        factory: impl AsyncFnOnce(u64, &mut PageBufferArray) -> Result<()>,
    ) -> Result<Box<PageBuffer>> {
        let key = PositionOrigin::new(position, origin);
        let mut new_page = self
            .free_page_cache
            .new_page(position, origin, || self.evict_unreferenced_readable());

        if let Some(readable) = self.readable.lock().unwrap().get(&key) {
            *new_page.buffer_mut() = *readable.buffer();
        } else {
            factory(position, new_page.as_mut().buffer_mut()).await?;
        }

        Ok(new_page)
    }

    pub fn new_page(&self) -> Box<PageBuffer> {
        self.free_page_cache.new_page(i64::MAX as u64, FileOrigin::Data, || {
            self.evict_unreferenced_readable()
        })
    }

    /// Returns a writable buffer to the free pool without publishing it,
    /// for a transaction that allocated a page and then rolled back before
    /// ever writing it to disk.
    pub fn discard(&self, page: Box<PageBuffer>) {
        self.free_page_cache.discard(page);
    }

    fn get_key(position: u64, origin: FileOrigin) -> u64 {
        assert!(
            position < i64::MAX as u64,
            "offset must not exceed i64::MAX"
        );
        if origin == FileOrigin::Data {
            position
        } else {
            !position
        }
    }

    pub fn try_move_to_readable(
        &self,
        page: Box<PageBuffer>,
    ) -> std::result::Result<Rc<PageBuffer>, Box<PageBuffer>> {
        debug_assert!(page.position() != u64::MAX);
        // page.wriable
        debug_assert!(page.origin().is_some());

        let key = PositionOrigin::new(page.position(), page.origin().unwrap());

        match self.readable.lock().unwrap().entry(key) {
            Entry::Occupied(_) => {
                // there already is. failed to make readable
                Err(page)
            }
            Entry::Vacant(v) => Ok(v.insert(Rc::new(*page)).clone()),
        }
    }

    pub(crate) fn move_to_readable(&self, page: Box<PageBuffer>) -> Rc<PageBuffer> {
        debug_assert!(page.position() != u64::MAX);
        // page.wriable
        debug_assert!(page.origin().is_some());

        let origin = page.origin().unwrap();
        let key = PositionOrigin::new(page.position(), origin);

        match self.readable.lock().unwrap().entry(key) {
            Entry::Occupied(mut o) => {
                //assert_eq!(Rc::strong_count(o.get()), 1, "user must ensure this page is not in use when marked as read only");
                debug_assert_eq!(o.get().origin(), Some(origin), "origin must be same");

                *Rc::get_mut(o.get_mut())
                    .expect("user must ensure this page is not in use when marked as read only")
                    .buffer_mut() = *page.buffer();

                //self.discard_page(page); no cache reuse system

                o.get().clone()
            }
            Entry::Vacant(v) => v.insert(Rc::new(*page)).clone(),
        }
    }

    pub fn pages_in_use(&self) -> usize {
        self.readable
            .lock()
            .unwrap()
            .values()
            .map(|x| Rc::strong_count(x) - 1)
            .sum()
    }

    pub(crate) fn clear(&self) {
        assert_eq!(self.pages_in_use(), 0, "all pages must be released");
        self.readable.lock().unwrap().clear();
    }
}

/// Free list of blank buffers, grown by `SEGMENT_PAGE_COUNT` at a time up to
/// `max_segments`. Once that ceiling is hit, callers must reclaim a buffer
/// by evicting an unreferenced readable entry instead of growing further.
struct FreePageCache {
    free: RefCell<VecDeque<Box<PageBuffer>>>,
    segments_allocated: Cell<usize>,
    max_segments: usize,
    next_unique_id: Cell<i32>,
}

impl FreePageCache {
    fn new(max_segments: usize) -> Self {
        FreePageCache {
            free: RefCell::new(VecDeque::new()),
            segments_allocated: Cell::new(0),
            max_segments,
            next_unique_id: Cell::new(0),
        }
    }

    fn allocate_unique_id(&self) -> i32 {
        let id = self.next_unique_id.get();
        self.next_unique_id.set(id + 1);
        id
    }

    fn extend_segment(&self) {
        let mut free = self.free.borrow_mut();
        for _ in 0..SEGMENT_PAGE_COUNT {
            free.push_back(Box::new(PageBuffer::new(self.allocate_unique_id())));
        }
        self.segments_allocated.set(self.segments_allocated.get() + 1);
    }

    /// Pops a blank buffer off the free list, extending by a whole segment
    /// if there's room under the ceiling, or reclaiming one via `evict` once
    /// there isn't.
    fn acquire(&self, evict: impl FnOnce() -> Option<Box<PageBuffer>>) -> Box<PageBuffer> {
        if let Some(buffer) = self.free.borrow_mut().pop_front() {
            return buffer;
        }

        if self.segments_allocated.get() < self.max_segments {
            self.extend_segment();
            return self
                .free
                .borrow_mut()
                .pop_front()
                .expect("segment was just extended");
        }

        if let Some(buffer) = evict() {
            return buffer;
        }

        // Every readable page is checked out by a live transaction, so there
        // is nothing to reclaim; grow past the ceiling rather than fail the
        // caller.
        Box::new(PageBuffer::new(self.allocate_unique_id()))
    }

    fn get_free_page(&self, evict: impl FnOnce() -> Option<Box<PageBuffer>>) -> Rc<PageBuffer> {
        Rc::from(self.acquire(evict))
    }

    fn new_page(
        &self,
        position: u64,
        origin: FileOrigin,
        evict: impl FnOnce() -> Option<Box<PageBuffer>>,
    ) -> Box<PageBuffer> {
        let mut buffer = self.acquire(evict);
        buffer.set_position_origin(position, origin);
        buffer
    }

    fn discard(&self, mut page: Box<PageBuffer>) {
        page.reset();
        self.free.borrow_mut().push_back(page);
    }
}
