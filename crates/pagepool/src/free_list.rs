//! Intrusive list of free pages.
//!
//! A free page has no content worth preserving, so its first word holds the link to the
//! next free page. This module is the only code that reinterprets page memory as list
//! nodes; everything above it deals in whole pages.

use core::ptr::NonNull;

/// Node in an intrusive linked list of free pages.
///
/// This structure is written directly into the first bytes of each free page.
#[repr(C)]
struct FreeBlock {
    next: Option<NonNull<FreeBlock>>,
}

/// Number of leading bytes of a free page overwritten by the list link.
pub const LINK_SIZE: usize = size_of::<FreeBlock>();

/// Singly-linked LIFO list of free pages.
///
/// Every block reachable from `head` is a whole page owned by this list. The list itself
/// does no locking; each core's list lives inside that core's mutex.
#[derive(Default)]
pub struct FreeList {
    head: Option<NonNull<FreeBlock>>,
    len: usize,
}

// SAFETY: the list exclusively owns the pages it links, so moving it to another core
// moves that ownership along with it.
unsafe impl Send for FreeList {}

impl FreeList {
    /// Creates an empty free list.
    pub const fn new() -> Self {
        Self { head: None, len: 0 }
    }

    /// Returns the number of pages in this list.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if this list holds no pages.
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Pushes a page onto the front of the list.
    ///
    /// # Safety
    ///
    /// `page` must point to the start of a writable, page-aligned page that is not in any
    /// list and that nothing else will touch until it is popped again.
    pub unsafe fn push(&mut self, page: NonNull<u8>) {
        let block = page.cast::<FreeBlock>();
        // SAFETY: the caller hands us exclusive ownership of the page.
        unsafe { block.write(FreeBlock { next: self.head }) };
        self.head = Some(block);
        self.len += 1;
    }

    /// Pops the most recently pushed page, returning None if empty.
    pub fn pop(&mut self) -> Option<NonNull<u8>> {
        let block = self.head?;
        // SAFETY: `block` is owned by this list and its link was written by `push`.
        self.head = unsafe { block.as_ref().next };
        self.len -= 1;
        Some(block.cast())
    }

    /// Detaches every page from this list, leaving it empty.
    pub fn take(&mut self) -> FreeList {
        core::mem::take(self)
    }

    /// Splices all pages of `other` after the last page of this list.
    ///
    /// Walks this list to find its tail, so callers that accumulate should put the
    /// shorter list first.
    pub fn append(&mut self, other: FreeList) {
        let Some(mut tail) = self.head else {
            *self = other;
            return;
        };
        // SAFETY: every block reachable from `head` is owned by this list, and we hold
        // `&mut self`, so nothing else is reading or writing the links.
        unsafe {
            while let Some(next) = tail.as_ref().next {
                tail = next;
            }
            tail.as_mut().next = other.head;
        }
        self.len += other.len;
    }

    /// Iterates over the pages in this list, most recently pushed first.
    #[cfg(test)]
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            next: self.head,
            _list: self,
        }
    }
}

/// Iterator over the pages of a [`FreeList`].
#[cfg(test)]
pub struct Iter<'a> {
    next: Option<NonNull<FreeBlock>>,
    _list: &'a FreeList,
}

#[cfg(test)]
impl Iterator for Iter<'_> {
    type Item = NonNull<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        let block = self.next?;
        // SAFETY: the borrowed list keeps its blocks alive and unmodified.
        self.next = unsafe { block.as_ref().next };
        Some(block.cast())
    }
}
