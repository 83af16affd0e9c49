//! Allocated/free tracking for every page in the pool.
//!
//! One bit per page, set while the page is owned by a caller of
//! [`PagePool::allocate_page`](crate::PagePool::allocate_page). The free lists never need
//! this information; it exists so that `free_page` can reject a double free or a free of
//! a page that was never handed out, instead of linking the page into a list twice.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

use crate::{PageNumber, PhysicalAddress};

const BITS_PER_WORD: usize = u64::BITS as usize;

/// Why a page could not change state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    /// The address is not one of the pool's pages.
    NotInPool,
    /// The page was already allocated.
    AlreadyAllocated,
    /// The page is not currently allocated.
    NotAllocated,
}

/// Bitmap of allocated pages.
pub struct PageStates {
    first: PageNumber,
    pages: usize,
    words: Box<[AtomicU64]>,
}

impl PageStates {
    /// Creates a bitmap covering `pages` pages starting at `first`, all marked free.
    pub fn new(first: PageNumber, pages: usize) -> Self {
        let words: Vec<AtomicU64> = (0..pages.div_ceil(BITS_PER_WORD))
            .map(|_| AtomicU64::new(0))
            .collect();
        Self {
            first,
            pages,
            words: words.into_boxed_slice(),
        }
    }

    /// Marks a page as handed out to a caller.
    pub fn mark_allocated(&self, page: PhysicalAddress) -> Result<(), StateError> {
        let (word, mask) = self.locate(page)?;
        let old = self.words[word].fetch_or(mask, Ordering::AcqRel);
        if old & mask != 0 {
            return Err(StateError::AlreadyAllocated);
        }
        Ok(())
    }

    /// Marks a page as returned to the pool.
    pub fn mark_free(&self, page: PhysicalAddress) -> Result<(), StateError> {
        let (word, mask) = self.locate(page)?;
        let old = self.words[word].fetch_and(!mask, Ordering::AcqRel);
        if old & mask == 0 {
            return Err(StateError::NotAllocated);
        }
        Ok(())
    }

    /// Returns true if the page is currently allocated.
    pub fn is_allocated(&self, page: PhysicalAddress) -> bool {
        self.locate(page)
            .map(|(word, mask)| self.words[word].load(Ordering::Acquire) & mask != 0)
            .unwrap_or(false)
    }

    /// Number of pages currently marked allocated.
    pub fn allocated_count(&self) -> usize {
        self.words
            .iter()
            .map(|word| word.load(Ordering::Acquire).count_ones() as usize)
            .sum()
    }

    fn locate(&self, page: PhysicalAddress) -> Result<(usize, u64), StateError> {
        let index = PageNumber::containing(page)
            .as_usize()
            .checked_sub(self.first.as_usize())
            .filter(|&index| index < self.pages)
            .ok_or(StateError::NotInPool)?;
        Ok((index / BITS_PER_WORD, 1 << (index % BITS_PER_WORD)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PAGE_SIZE;

    fn page(n: usize) -> PhysicalAddress {
        PhysicalAddress::new(n * PAGE_SIZE)
    }

    #[test]
    fn starts_all_free() {
        let states = PageStates::new(PageNumber::new(2), 100);
        assert_eq!(states.allocated_count(), 0);
        assert!(!states.is_allocated(page(2)));
    }

    #[test]
    fn tracks_allocation_and_free() {
        let states = PageStates::new(PageNumber::new(2), 100);

        assert_eq!(states.mark_allocated(page(70)), Ok(()));
        assert!(states.is_allocated(page(70)));
        assert_eq!(states.allocated_count(), 1);

        assert_eq!(states.mark_free(page(70)), Ok(()));
        assert!(!states.is_allocated(page(70)));
        assert_eq!(states.allocated_count(), 0);
    }

    #[test]
    fn detects_double_free() {
        let states = PageStates::new(PageNumber::new(0), 8);
        states.mark_allocated(page(3)).unwrap();
        states.mark_free(page(3)).unwrap();
        assert_eq!(states.mark_free(page(3)), Err(StateError::NotAllocated));
    }

    #[test]
    fn detects_double_allocation() {
        let states = PageStates::new(PageNumber::new(0), 8);
        states.mark_allocated(page(3)).unwrap();
        assert_eq!(
            states.mark_allocated(page(3)),
            Err(StateError::AlreadyAllocated)
        );
    }

    #[test]
    fn rejects_pages_outside_range() {
        let states = PageStates::new(PageNumber::new(2), 4);
        assert_eq!(states.mark_allocated(page(1)), Err(StateError::NotInPool));
        assert_eq!(states.mark_allocated(page(6)), Err(StateError::NotInPool));
        assert_eq!(states.mark_allocated(page(5)), Ok(()));
    }
}
