#![cfg_attr(not(any(test, feature = "software-emulation")), no_std)]

//! # Polaris Page Pool
//!
//! The physical page allocator for the Polaris kernel. It hands out and reclaims single
//! 4 KiB pages for page tables, kernel stacks, process memory and I/O buffers:
//!
//! - Boot-time partitioning of the free physical range between cores.
//! - Per-core free lists behind per-core spin locks.
//! - Cross-core stealing when a core's own list runs dry.
//! - Poisoning of page contents on allocation and on free, plus double-free detection.
//! - Software emulation for testing in non-kernel environments.
//!
//! ```ignore
//! let pool = PagePool::new(
//!     AddressTranslator::hardware(hhdm_offset),
//!     kernel_end,
//!     phys_top,
//!     cpu_count,
//! );
//! let page = pool.allocate_page(this_cpu)?;
//! pool.free_page(this_cpu, page);
//! ```

extern crate alloc;

mod address;
mod arch;
mod free_list;
mod numbers;
mod page_state;
mod partition;
mod pool;
mod steal;

pub use address::{AddressTranslator, PhysicalAddress};
pub use free_list::LINK_SIZE;
pub use numbers::{CoreId, PageNumber};
pub use partition::{Partition, partition};
pub use pool::{ALLOC_POISON, AllocError, FREE_POISON, FreeError, PagePool};

pub use arch::{InterruptGuard, PAGE_SIZE};
#[cfg(any(test, feature = "software-emulation"))]
pub use arch::EmulatedMemory;
