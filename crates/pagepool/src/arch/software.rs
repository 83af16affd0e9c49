//! Software emulation for testing and development.
//!
//! Physical memory is a heap buffer owned by [`EmulatedMemory`]: physical address `p` is
//! byte `p` of the buffer. Pages keep their real 4 KiB size so that allocator behavior
//! (alignment, partitioning, poisoning) is identical to hardware; only the physical
//! address width is reduced.

use alloc::boxed::Box;
use core::ptr::{self, NonNull};

use crate::PhysicalAddress;

/// Maximum number of bits in a physical address for software emulation.
pub const MAX_PHYSICAL_BITS: usize = 32;

/// Page size in bytes (4 KiB, same as hardware).
pub const PAGE_SIZE: usize = 4096;

/// Validates a physical address for software emulation.
#[inline]
pub const fn validate_physical(addr: usize) -> bool {
    (addr as u64) >> MAX_PHYSICAL_BITS == 0
}

/// There are no interrupts to mask on the host.
pub struct InterruptGuard;

impl InterruptGuard {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for InterruptGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// Emulated physical memory.
///
/// The buffer is zeroed on creation and shared by every thread that uses the owning
/// pool, so it is accessed only through raw pointers.
pub struct EmulatedMemory {
    base: NonNull<u8>,
    size: usize,
}

// SAFETY: the buffer is uniquely owned by this value; concurrent access to individual
// pages is serialized by the page pool that hands them out.
unsafe impl Send for EmulatedMemory {}
unsafe impl Sync for EmulatedMemory {}

impl EmulatedMemory {
    /// Creates a new zeroed emulated memory region of the specified size.
    pub fn new(size: usize) -> Self {
        assert!(
            validate_physical(size),
            "emulated memory exceeds the physical address width"
        );
        let memory: Box<[u8]> = alloc::vec![0u8; size].into_boxed_slice();
        let base = NonNull::from(Box::leak(memory)).cast::<u8>();
        Self { base, size }
    }

    /// Returns a pointer to `len` bytes of emulated memory starting at `phys`.
    ///
    /// # Panics
    ///
    /// Panics if the range does not lie entirely within the buffer.
    pub fn translate(&self, phys: PhysicalAddress, len: usize) -> *mut u8 {
        let start = phys.as_usize();
        assert!(
            start.checked_add(len).is_some_and(|end| end <= self.size),
            "physical address out of bounds"
        );
        // SAFETY: the range was checked to be within the buffer.
        unsafe { self.base.as_ptr().add(start) }
    }

    /// Translates a pointer into the buffer back to a physical address.
    pub fn ptr_to_phys(&self, ptr: *const u8) -> PhysicalAddress {
        let base = self.base.as_ptr() as usize;
        let addr = ptr as usize;
        assert!(
            addr >= base && addr < base + self.size,
            "pointer not within emulated memory"
        );
        PhysicalAddress::new(addr - base)
    }

    /// Returns the size of the emulated memory region.
    pub fn size(&self) -> usize {
        self.size
    }
}

impl Drop for EmulatedMemory {
    fn drop(&mut self) {
        // SAFETY: `base` and `size` came from the boxed slice leaked in `new`.
        unsafe {
            drop(Box::from_raw(ptr::slice_from_raw_parts_mut(
                self.base.as_ptr(),
                self.size,
            )));
        }
    }
}
