//! Architecture-specific pieces of the page pool.
//!
//! Each architecture provides the page size, physical address validation and an
//! [`InterruptGuard`] that keeps the calling core from being interrupted while it holds
//! one of the pool's locks.

// Use x86_64 hardware implementation when we're on x86_64 and not testing or emulating.
// NOTE: We DO include the module even during tests so that rust-analyzer can see it.
#[cfg(target_arch = "x86_64")]
mod x86_64;
#[cfg(all(target_arch = "x86_64", not(test), not(feature = "software-emulation")))]
pub use self::x86_64::*;

// Use software emulation ONLY when:
// - Running tests, OR
// - software-emulation feature is explicitly enabled
#[cfg(any(test, feature = "software-emulation"))]
mod software;
#[cfg(any(test, feature = "software-emulation"))]
pub use software::*;
