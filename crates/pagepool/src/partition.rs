//! Boot-time division of the page pool between cores.
//!
//! The usable range `[pool_start, pool_end)` is split into one contiguous slice per core.
//! Slice `i` nominally covers `pool_start + i * len .. pool_start + (i + 1) * len`, where
//! `len` is the pool length divided by the core count. Both bounds are rounded up to a
//! page boundary independently, so neighbouring slices share their boundary and never
//! overlap. The last slice is clamped to `pool_end` so that no page crosses the top of
//! memory.

use core::ops::Range;

use crate::{CoreId, PhysicalAddress, arch::PAGE_SIZE};

/// The slice of the pool initially owned by one core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    core: CoreId,
    start: PhysicalAddress,
    end: PhysicalAddress,
}

impl Partition {
    /// The core whose free list receives this partition's pages.
    pub const fn core(&self) -> CoreId {
        self.core
    }

    /// First byte of the partition (page aligned).
    pub const fn start(&self) -> PhysicalAddress {
        self.start
    }

    /// One past the last usable byte of the partition.
    pub const fn end(&self) -> PhysicalAddress {
        self.end
    }

    /// Number of whole pages that fit in this partition.
    pub fn page_count(&self) -> usize {
        if self.end > self.start {
            (self.end - self.start) / PAGE_SIZE
        } else {
            0
        }
    }

    /// Addresses of every whole page in this partition, lowest first.
    pub fn pages(&self) -> impl Iterator<Item = PhysicalAddress> + use<> {
        let start = self.start;
        (0..self.page_count()).map(move |i| start + i * PAGE_SIZE)
    }
}

/// Splits `[pool_start, pool_end)` into `core_count` page-aligned partitions.
///
/// A pool smaller than a page simply produces partitions without pages.
///
/// # Panics
///
/// Panics if `core_count` is zero or `pool_end` lies below `pool_start`.
pub fn partition(
    pool_start: PhysicalAddress,
    pool_end: PhysicalAddress,
    core_count: usize,
) -> impl Iterator<Item = Partition> {
    assert!(core_count > 0, "page pool needs at least one core");
    assert!(
        pool_start <= pool_end,
        "pool start {pool_start} lies above pool end {pool_end}"
    );

    let len = (pool_end - pool_start) / core_count;
    let bound = move |i: usize| {
        let rounded = (pool_start + i * len).align_up(PAGE_SIZE);
        rounded.min(pool_end)
    };

    let cores: Range<usize> = 0..core_count;
    cores.map(move |i| Partition {
        core: CoreId::new(i),
        start: bound(i),
        end: bound(i + 1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(value: usize) -> PhysicalAddress {
        PhysicalAddress::new(value)
    }

    #[test]
    fn splits_evenly() {
        let parts: Vec<_> = partition(addr(0x2000), addr(0xA000), 2).collect();

        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].core(), CoreId::new(0));
        assert_eq!(parts[0].start(), addr(0x2000));
        assert_eq!(parts[0].end(), addr(0x6000));
        assert_eq!(parts[1].start(), addr(0x6000));
        assert_eq!(parts[1].end(), addr(0xA000));
        assert!(parts.iter().all(|p| p.page_count() == 4));
    }

    #[test]
    fn rounds_unaligned_start_up() {
        // "kernel end" in the middle of a page
        let parts: Vec<_> = partition(addr(0x1800), addr(0xA000), 2).collect();

        assert_eq!(parts[0].start(), addr(0x2000));
        assert_eq!(parts[0].end(), addr(0x6000));
        assert_eq!(parts[1].start(), addr(0x6000));
        assert_eq!(parts[1].end(), addr(0xA000));
    }

    #[test]
    fn partitions_are_contiguous_and_disjoint() {
        let parts: Vec<_> = partition(addr(0x1234), addr(0x40_0000), 7).collect();

        for pair in parts.windows(2) {
            assert_eq!(pair[0].end(), pair[1].start());
        }
        let pages: Vec<_> = parts.iter().flat_map(|p| p.pages()).collect();
        assert!(pages.windows(2).all(|w| w[0] + PAGE_SIZE == w[1]));
        assert!(pages.iter().all(|p| p.is_page_aligned()));
    }

    #[test]
    fn last_partition_stops_below_pool_end() {
        let parts: Vec<_> = partition(addr(0x1000), addr(0x5800), 3).collect();

        let last = parts.last().unwrap();
        assert_eq!(last.end(), addr(0x5800));
        let top = last.pages().last().unwrap();
        assert!(top + PAGE_SIZE <= addr(0x5800));
    }

    #[test]
    fn tiny_pool_yields_no_pages() {
        let parts: Vec<_> = partition(addr(0x1800), addr(0x1F00), 4).collect();

        assert_eq!(parts.len(), 4);
        assert!(parts.iter().all(|p| p.page_count() == 0));
        assert_eq!(parts[0].pages().count(), 0);
    }

    #[test]
    fn empty_pool() {
        let parts: Vec<_> = partition(addr(0x3000), addr(0x3000), 2).collect();
        assert!(parts.iter().all(|p| p.page_count() == 0));
    }

    #[test]
    #[should_panic(expected = "page pool needs at least one core")]
    fn zero_cores() {
        let _ = partition(addr(0x1000), addr(0x2000), 0);
    }

    #[test]
    #[should_panic(expected = "lies above pool end")]
    fn inverted_range() {
        let _ = partition(addr(0x3000), addr(0x2000), 1);
    }
}
