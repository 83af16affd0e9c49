//! Index newtypes used by the page pool.

use core::fmt;

use crate::{PhysicalAddress, arch::PAGE_SIZE};

/// Identifies one logical processor.
///
/// Core IDs are dense: a pool created for `n` cores accepts `CoreId(0)` through
/// `CoreId(n - 1)`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct CoreId(usize);

impl CoreId {
    /// Creates a new core ID.
    #[inline]
    pub const fn new(id: usize) -> Self {
        Self(id)
    }

    /// Returns the raw core index.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Debug for CoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CoreId({})", self.0)
    }
}

impl fmt::Display for CoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cpu{}", self.0)
    }
}

impl From<usize> for CoreId {
    #[inline]
    fn from(id: usize) -> Self {
        Self(id)
    }
}

/// A physical page frame number (physical address divided by the page size).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PageNumber(usize);

impl PageNumber {
    /// Creates a new page number.
    #[inline]
    pub const fn new(number: usize) -> Self {
        Self(number)
    }

    /// Returns the raw page number.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// Returns the number of the page containing `addr`.
    #[inline]
    pub const fn containing(addr: PhysicalAddress) -> Self {
        Self(addr.as_usize() / PAGE_SIZE)
    }

    /// Returns the physical address of the first byte of this page.
    #[inline]
    pub const fn start_address(self) -> PhysicalAddress {
        PhysicalAddress::new(self.0 * PAGE_SIZE)
    }
}

impl fmt::Debug for PageNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PageNumber({})", self.0)
    }
}

impl From<PhysicalAddress> for PageNumber {
    #[inline]
    fn from(addr: PhysicalAddress) -> Self {
        Self::containing(addr)
    }
}
