//! Per-core physical page allocator.
//!
//! The pool hands out and takes back single 4 KiB pages. Each core owns a free list behind
//! its own spin lock, so the common path touches no shared state. When a core's list runs
//! dry it steals every free page from the other cores and only reports
//! [`AllocError::OutOfMemory`] if that sweep comes back empty.
//!
//! Page contents are poisoned on both transitions: [`ALLOC_POISON`] when a page is handed
//! out and [`FREE_POISON`] when it is returned, so that code reading memory it does not
//! own sees obvious garbage instead of plausible data.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use spin::Mutex;

use crate::arch::{InterruptGuard, PAGE_SIZE};
use crate::free_list::FreeList;
use crate::page_state::{PageStates, StateError};
use crate::partition::partition;
use crate::{AddressTranslator, CoreId, PageNumber, PhysicalAddress, steal};

/// Byte written over a page when it is allocated.
pub const ALLOC_POISON: u8 = 0x05;

/// Byte written over a page when it is freed.
pub const FREE_POISON: u8 = 0x01;

/// Errors that can occur during page allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// No core has a free page left.
    OutOfMemory,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory => f.write_str("out of physical pages"),
        }
    }
}

/// Ways in which a `free_page` call can break the pool's contract.
///
/// These are never returned: [`PagePool::free_page`] halts with the matching message,
/// because linking a bad page into a free list would corrupt every later allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeError {
    /// The address is not the start of a page.
    Misaligned,
    /// The address lies below the start of the pool.
    BelowPool,
    /// The address lies at or above the end of the pool.
    AbovePool,
    /// The address is in range but is not one of the pool's pages.
    NotPoolPage,
    /// The page is not currently allocated (double free, or never handed out).
    NotAllocated,
}

impl fmt::Display for FreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Misaligned => "address is not page-aligned",
            Self::BelowPool => "address is below the page pool",
            Self::AbovePool => "address is above the page pool",
            Self::NotPoolPage => "address is not a pool page",
            Self::NotAllocated => "page is not allocated (double free?)",
        })
    }
}

impl From<StateError> for FreeError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::NotInPool => Self::NotPoolPage,
            StateError::AlreadyAllocated | StateError::NotAllocated => Self::NotAllocated,
        }
    }
}

/// Physical page allocator shared by every core.
///
/// Created once during boot, after which it is only ever used through `&PagePool`. The
/// pool lives for the rest of the system's lifetime; there is no teardown.
pub struct PagePool {
    translator: AddressTranslator,
    pool_start: PhysicalAddress,
    pool_end: PhysicalAddress,
    /// One free list per core, indexed by [`CoreId`].
    free_lists: Box<[Mutex<FreeList>]>,
    /// Serializes steal sweeps. Protects no data of its own.
    steal_lock: Mutex<()>,
    states: PageStates,
    total_pages: usize,
}

impl PagePool {
    /// Builds the pool over `[pool_start, pool_end)` and partitions it between
    /// `core_count` cores.
    ///
    /// `pool_start` is usually the first byte after the kernel image and need not be
    /// page aligned. A range smaller than one page produces a valid, empty pool.
    ///
    /// # Panics
    ///
    /// Panics if `core_count` is zero or `pool_end` lies below `pool_start`.
    pub fn new(
        translator: AddressTranslator,
        pool_start: PhysicalAddress,
        pool_end: PhysicalAddress,
        core_count: usize,
    ) -> Self {
        let mut free_lists = Vec::with_capacity(core_count);
        let mut total_pages = 0;

        for part in partition(pool_start, pool_end, core_count) {
            let mut list = FreeList::new();
            for page in part.pages() {
                // SAFETY: partitions are disjoint and inside the pool, so each page is
                // linked into exactly one list and nothing else refers to it yet.
                unsafe { list.push(translator.page_ptr(page)) };
            }
            log::debug!(
                "{}: {} pages in {}..{}",
                part.core(),
                list.len(),
                part.start(),
                part.end()
            );
            total_pages += list.len();
            free_lists.push(Mutex::new(list));
        }

        let first_page = pool_start.align_up(PAGE_SIZE).min(pool_end);
        let span = (pool_end - first_page) / PAGE_SIZE;
        let states = PageStates::new(PageNumber::containing(first_page), span);

        log::debug!(
            "page pool {}..{}: {} pages across {} cores",
            pool_start,
            pool_end,
            total_pages,
            core_count
        );

        Self {
            translator,
            pool_start,
            pool_end,
            free_lists: free_lists.into_boxed_slice(),
            steal_lock: Mutex::new(()),
            states,
            total_pages,
        }
    }

    /// Allocates one page on behalf of `core`.
    ///
    /// Pops `core`'s own list, stealing from the other cores if it is empty. The returned
    /// page is filled with [`ALLOC_POISON`], not zeros.
    ///
    /// # Panics
    ///
    /// Panics if `core` is not one of the pool's cores.
    pub fn allocate_page(&self, core: CoreId) -> Result<PhysicalAddress, AllocError> {
        let _irq = InterruptGuard::new();

        let mut free_list = self.lock_core(core);
        let mut block = free_list.pop();
        if block.is_none() {
            free_list = steal::steal(&self.steal_lock, &self.free_lists, core, free_list);
            block = free_list.pop();
        }
        drop(free_list);

        let Some(block) = block else {
            log::warn!("{core}: out of physical pages");
            return Err(AllocError::OutOfMemory);
        };

        let page = self.translator.ptr_to_phys(block.as_ptr());
        if let Err(err) = self.states.mark_allocated(page) {
            log::error!("free list handed out {page} in state {err:?}");
            panic!("page pool corrupted: free list held allocated page {page}");
        }

        // SAFETY: the page was just removed from a free list, so we own all of it.
        unsafe { block.write_bytes(ALLOC_POISON, PAGE_SIZE) };
        Ok(page)
    }

    /// Returns `page` to the pool, onto `core`'s free list.
    ///
    /// The page does not have to go back to the core it was allocated from.
    ///
    /// # Panics
    ///
    /// Halts on any [`FreeError`]: a misaligned address, an address outside the pool, or
    /// a page that is not currently allocated. Also panics if `core` is not one of the
    /// pool's cores.
    pub fn free_page(&self, core: CoreId, page: PhysicalAddress) {
        let _irq = InterruptGuard::new();

        if let Err(err) = self.release(page) {
            log::error!("{core}: invalid free of {page}: {err}");
            panic!("free_page({page}): {err}");
        }

        let block = self.translator.page_ptr(page);
        // SAFETY: the caller gave the page back and it is not in any list, so the
        // whole page is ours to overwrite.
        unsafe { block.write_bytes(FREE_POISON, PAGE_SIZE) };

        let mut free_list = self.lock_core(core);
        // SAFETY: as above; ownership now passes to the free list.
        unsafe { free_list.push(block) };
    }

    /// Number of cores the pool was partitioned between.
    pub fn core_count(&self) -> usize {
        self.free_lists.len()
    }

    /// Number of pages the pool manages.
    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    /// Number of free pages on `core`'s list.
    pub fn free_pages_on(&self, core: CoreId) -> usize {
        let _irq = InterruptGuard::new();
        self.lock_core(core).len()
    }

    /// Number of free pages across all cores.
    ///
    /// Lists are counted one at a time, so the result is only exact when no other core
    /// is allocating or freeing.
    pub fn free_pages(&self) -> usize {
        let _irq = InterruptGuard::new();
        self.free_lists.iter().map(|list| list.lock().len()).sum()
    }

    /// Number of pages currently handed out.
    pub fn allocated_pages(&self) -> usize {
        self.states.allocated_count()
    }

    /// Returns true if `page` is currently handed out.
    pub fn is_allocated(&self, page: PhysicalAddress) -> bool {
        self.states.is_allocated(page)
    }

    /// First byte of the pool, as given to [`PagePool::new`].
    pub fn pool_start(&self) -> PhysicalAddress {
        self.pool_start
    }

    /// One past the last byte of the pool.
    pub fn pool_end(&self) -> PhysicalAddress {
        self.pool_end
    }

    /// The translator used to reach page contents.
    pub fn translator(&self) -> &AddressTranslator {
        &self.translator
    }

    fn lock_core(&self, core: CoreId) -> spin::MutexGuard<'_, FreeList> {
        let Some(list) = self.free_lists.get(core.as_usize()) else {
            panic!("{core} is not one of the pool's {} cores", self.core_count());
        };
        list.lock()
    }

    fn release(&self, page: PhysicalAddress) -> Result<(), FreeError> {
        if !page.is_page_aligned() {
            return Err(FreeError::Misaligned);
        }
        if page < self.pool_start {
            return Err(FreeError::BelowPool);
        }
        if page >= self.pool_end {
            return Err(FreeError::AbovePool);
        }
        self.states.mark_free(page)?;
        Ok(())
    }
}
