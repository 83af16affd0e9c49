//! x86_64 hardware implementation.

use ::x86_64::instructions::interrupts;

/// Maximum number of bits in a physical address on x86_64.
/// This is typically 52 bits on modern CPUs, but we use 48 as a conservative default.
pub const MAX_PHYSICAL_BITS: usize = 48;

/// Page size in bytes (4 KiB).
pub const PAGE_SIZE: usize = 4096;

/// Validates a physical address for x86_64.
#[inline]
pub const fn validate_physical(addr: usize) -> bool {
    let max_addr = (1usize << MAX_PHYSICAL_BITS) - 1;
    addr <= max_addr
}

/// Disables interrupts on the current core for as long as it is alive.
///
/// The previous interrupt state is captured on creation and restored on drop, so guards
/// nest: only the outermost guard re-enables interrupts.
pub struct InterruptGuard {
    were_enabled: bool,
}

impl InterruptGuard {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        let were_enabled = interrupts::are_enabled();
        if were_enabled {
            interrupts::disable();
        }
        Self { were_enabled }
    }
}

impl Default for InterruptGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        if self.were_enabled {
            interrupts::enable();
        }
    }
}
