//! Physical addresses and their translation to usable pointers.

use core::fmt;
use core::ops::{Add, Sub};
use core::ptr::NonNull;

use crate::arch::{self, PAGE_SIZE};

#[cfg(any(test, feature = "software-emulation"))]
use crate::arch::EmulatedMemory;

/// A physical memory address.
///
/// This is a newtype wrapper around the architecture-dependent representation of a
/// physical address. It provides methods for alignment checks and page arithmetic.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PhysicalAddress(usize);

impl PhysicalAddress {
    /// Creates a new physical address.
    ///
    /// # Panics
    ///
    /// Panics if the address exceeds the architecture's maximum physical address width.
    #[inline]
    pub const fn new(addr: usize) -> Self {
        assert!(
            arch::validate_physical(addr),
            "physical address exceeds maximum width"
        );
        Self(addr)
    }

    /// Returns the raw address value.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// Checks if the address is aligned to the given alignment.
    ///
    /// # Panics
    ///
    /// Panics if `align` is not a power of two.
    #[inline]
    pub const fn is_aligned(self, align: usize) -> bool {
        assert!(align.is_power_of_two(), "alignment must be a power of two");
        self.0 & (align - 1) == 0
    }

    /// Returns true if the address is the start of a page.
    #[inline]
    pub const fn is_page_aligned(self) -> bool {
        self.is_aligned(PAGE_SIZE)
    }

    /// Aligns the address down to the given alignment.
    #[inline]
    pub const fn align_down(self, align: usize) -> Self {
        assert!(align.is_power_of_two(), "alignment must be a power of two");
        Self(self.0 & !(align - 1))
    }

    /// Aligns the address up to the given alignment.
    #[inline]
    pub const fn align_up(self, align: usize) -> Self {
        assert!(align.is_power_of_two(), "alignment must be a power of two");
        Self::new((self.0 + align - 1) & !(align - 1))
    }
}

impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysicalAddress({:#x})", self.0)
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<usize> for PhysicalAddress {
    #[inline]
    fn from(addr: usize) -> Self {
        Self::new(addr)
    }
}

impl Add<usize> for PhysicalAddress {
    type Output = Self;

    #[inline]
    fn add(self, rhs: usize) -> Self::Output {
        Self::new(self.0 + rhs)
    }
}

impl Sub<usize> for PhysicalAddress {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: usize) -> Self::Output {
        Self::new(self.0 - rhs)
    }
}

impl Sub<PhysicalAddress> for PhysicalAddress {
    type Output = usize;

    #[inline]
    fn sub(self, rhs: PhysicalAddress) -> Self::Output {
        self.0 - rhs.0
    }
}

/// Address translator for reaching the bytes of a physical page.
///
/// This enum supports two modes:
/// - Hardware: Uses a direct-map offset for translation (kernel mode)
/// - Emulated: Uses an emulated memory buffer for translation (testing mode)
///
/// The translator is owned by the [`PagePool`](crate::PagePool) rather than being
/// global, so several host threads can share one emulated memory.
pub enum AddressTranslator {
    /// Hardware translation using a direct-map offset.
    Hardware { direct_map_offset: usize },
    /// Emulated translation using a simulated memory region.
    #[cfg(any(test, feature = "software-emulation"))]
    Emulated(EmulatedMemory),
}

impl AddressTranslator {
    /// Creates a new hardware translator with the given direct-map offset.
    pub const fn hardware(direct_map_offset: usize) -> Self {
        Self::Hardware { direct_map_offset }
    }

    /// Creates a new emulated translator with the given memory size.
    #[cfg(any(test, feature = "software-emulation"))]
    pub fn emulated(size: usize) -> Self {
        Self::Emulated(EmulatedMemory::new(size))
    }

    /// Translates a physical address to a typed pointer.
    pub fn phys_to_ptr<T>(&self, phys: PhysicalAddress) -> *mut T {
        match self {
            Self::Hardware { direct_map_offset } => {
                phys.as_usize().wrapping_add(*direct_map_offset) as *mut T
            }
            #[cfg(any(test, feature = "software-emulation"))]
            Self::Emulated(mem) => mem.translate(phys, 1).cast(),
        }
    }

    /// Translates a pointer back to a physical address.
    pub fn ptr_to_phys<T>(&self, ptr: *const T) -> PhysicalAddress {
        match self {
            Self::Hardware { direct_map_offset } => {
                PhysicalAddress::new((ptr as usize).wrapping_sub(*direct_map_offset))
            }
            #[cfg(any(test, feature = "software-emulation"))]
            Self::Emulated(mem) => mem.ptr_to_phys(ptr.cast()),
        }
    }

    /// Returns a pointer to the first byte of the page at `page`.
    ///
    /// # Panics
    ///
    /// Panics if the whole page is not reachable through this translator.
    pub fn page_ptr(&self, page: PhysicalAddress) -> NonNull<u8> {
        let ptr = match self {
            Self::Hardware { .. } => self.phys_to_ptr::<u8>(page),
            #[cfg(any(test, feature = "software-emulation"))]
            Self::Emulated(mem) => mem.translate(page, PAGE_SIZE),
        };
        NonNull::new(ptr).expect("page translated to a null pointer")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "physical address exceeds maximum width")]
    fn new_exceeds_max() {
        PhysicalAddress::new(1usize << arch::MAX_PHYSICAL_BITS);
    }

    #[test]
    fn alignment_check() {
        let addr = PhysicalAddress::new(PAGE_SIZE * 4);
        assert!(addr.is_page_aligned());
        assert!(addr.is_aligned(PAGE_SIZE * 4));
        assert!(!addr.is_aligned(PAGE_SIZE * 8));
        assert!(!PhysicalAddress::new(0x1800).is_page_aligned());
    }

    #[test]
    fn align_to_pages() {
        let addr = PhysicalAddress::new(0x1800);
        assert_eq!(addr.align_down(PAGE_SIZE), PhysicalAddress::new(0x1000));
        assert_eq!(addr.align_up(PAGE_SIZE), PhysicalAddress::new(0x2000));

        let aligned = PhysicalAddress::new(0x3000);
        assert_eq!(aligned.align_down(PAGE_SIZE), aligned);
        assert_eq!(aligned.align_up(PAGE_SIZE), aligned);
    }

    #[test]
    fn arithmetic() {
        let addr = PhysicalAddress::new(0x2000);
        assert_eq!(addr + PAGE_SIZE, PhysicalAddress::new(0x3000));
        assert_eq!(addr - PAGE_SIZE, PhysicalAddress::new(0x1000));
        assert_eq!(PhysicalAddress::new(0x5000) - addr, 0x3000);
    }

    #[test]
    fn formatting() {
        let addr = PhysicalAddress::new(0x2000);
        assert_eq!(format!("{:?}", addr), "PhysicalAddress(0x2000)");
        assert_eq!(format!("{}", addr), "0x2000");
    }

    #[test]
    fn hardware_translation_uses_direct_map_offset() {
        let translator = AddressTranslator::hardware(0xFFFF_8000_0000_0000);
        let phys = PhysicalAddress::new(0x2000);
        let ptr = translator.phys_to_ptr::<u8>(phys);
        assert_eq!(ptr as usize, 0xFFFF_8000_0000_2000);
        assert_eq!(translator.ptr_to_phys(ptr), phys);
    }

    #[test]
    fn emulated_translation_round_trips() {
        let translator = AddressTranslator::emulated(4 * PAGE_SIZE);
        let phys = PhysicalAddress::new(2 * PAGE_SIZE);
        let ptr = translator.page_ptr(phys);
        assert_eq!(translator.ptr_to_phys(ptr.as_ptr()), phys);
    }

    #[test]
    #[should_panic(expected = "physical address out of bounds")]
    fn emulated_page_must_fit() {
        let translator = AddressTranslator::emulated(4 * PAGE_SIZE);
        translator.page_ptr(PhysicalAddress::new(3 * PAGE_SIZE + 8));
    }
}
