//! Moving free pages from other cores to a core that has run dry.
//!
//! A core whose own list is empty sweeps every other core's list into its own. Two cores
//! sweeping at once could each wait on the other's lock, so sweeps follow a fixed
//! discipline:
//!
//! 1. drop the thief's own lock,
//! 2. take the coordination lock (one sweep system-wide at a time),
//! 3. lock, empty and unlock each donor in ascending core order,
//! 4. re-take the thief's own lock, then drop the coordination lock.
//!
//! [`StealSweep`] encodes that discipline in its API: it is created from the thief's own
//! guard (which it drops), it never hands out a donor guard, and the only way to end a
//! sweep is [`StealSweep::finish`], which re-locks the thief's list before releasing the
//! coordination lock.

use core::ptr;

use spin::{Mutex, MutexGuard};

use crate::{CoreId, free_list::FreeList};

/// An in-progress sweep holding the coordination lock.
pub struct StealSweep<'a> {
    own: &'a Mutex<FreeList>,
    stolen: FreeList,
    _token: MutexGuard<'a, ()>,
}

impl<'a> StealSweep<'a> {
    /// Releases the thief's own lock and enters the sweep.
    pub fn begin(
        coordination: &'a Mutex<()>,
        own: &'a Mutex<FreeList>,
        held: MutexGuard<'a, FreeList>,
    ) -> Self {
        drop(held);
        Self {
            own,
            stolen: FreeList::new(),
            _token: coordination.lock(),
        }
    }

    /// Takes every page from `donor`, holding its lock only for the duration of the call.
    ///
    /// Returns the number of pages taken.
    pub fn drain(&mut self, donor: &Mutex<FreeList>) -> usize {
        assert!(!ptr::eq(donor, self.own), "core cannot steal from itself");

        let mut taken = donor.lock().take();
        let count = taken.len();
        if count > 0 {
            taken.append(self.stolen.take());
            self.stolen = taken;
        }
        count
    }

    /// Re-locks the thief's list, hands it the stolen pages and ends the sweep.
    pub fn finish(self) -> MutexGuard<'a, FreeList> {
        let StealSweep {
            own,
            stolen,
            _token,
        } = self;
        let mut guard = own.lock();
        guard.append(stolen);
        drop(_token);
        guard
    }
}

/// Runs one full sweep on behalf of `thief`, whose lock is `held`.
///
/// Returns the thief's guard again, now with every page that was free on any other core
/// at the time its list was visited.
pub fn steal<'a>(
    coordination: &'a Mutex<()>,
    lists: &'a [Mutex<FreeList>],
    thief: CoreId,
    held: MutexGuard<'a, FreeList>,
) -> MutexGuard<'a, FreeList> {
    let own = &lists[thief.as_usize()];
    let mut sweep = StealSweep::begin(coordination, own, held);

    let mut total = 0;
    for (index, donor) in lists.iter().enumerate() {
        if index == thief.as_usize() {
            continue;
        }
        let taken = sweep.drain(donor);
        if taken > 0 {
            log::trace!("{thief} stole {taken} pages from {}", CoreId::new(index));
        }
        total += taken;
    }

    let guard = sweep.finish();
    log::trace!("{thief} steal sweep moved {total} pages");
    guard
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EmulatedMemory, PAGE_SIZE, PhysicalAddress};
    use core::ptr::NonNull;

    struct Fixture {
        memory: EmulatedMemory,
        coordination: Mutex<()>,
        lists: Vec<Mutex<FreeList>>,
    }

    /// Builds one list per entry of `counts`, each holding that many distinct pages.
    fn fixture(counts: &[usize]) -> Fixture {
        let total: usize = counts.iter().sum();
        let memory = EmulatedMemory::new(total.max(1) * PAGE_SIZE);
        let mut next = 0;
        let lists = counts
            .iter()
            .map(|&count| {
                let mut list = FreeList::new();
                for _ in 0..count {
                    let ptr = memory.translate(PhysicalAddress::new(next * PAGE_SIZE), PAGE_SIZE);
                    unsafe { list.push(NonNull::new(ptr).unwrap()) };
                    next += 1;
                }
                Mutex::new(list)
            })
            .collect();
        Fixture {
            memory,
            coordination: Mutex::new(()),
            lists,
        }
    }

    #[test]
    fn sweep_releases_own_lock_and_holds_coordination() {
        let f = fixture(&[0, 2]);
        let held = f.lists[0].lock();

        let sweep = StealSweep::begin(&f.coordination, &f.lists[0], held);
        assert!(!f.lists[0].is_locked());
        assert!(f.coordination.is_locked());

        let guard = sweep.finish();
        assert!(f.lists[0].is_locked());
        assert!(!f.coordination.is_locked());
        drop(guard);
    }

    #[test]
    fn drain_releases_donor_lock() {
        let f = fixture(&[0, 3]);
        let held = f.lists[0].lock();
        let mut sweep = StealSweep::begin(&f.coordination, &f.lists[0], held);

        assert_eq!(sweep.drain(&f.lists[1]), 3);
        assert!(!f.lists[1].is_locked());
        assert!(f.lists[1].lock().is_empty());

        let guard = sweep.finish();
        assert_eq!(guard.len(), 3);
    }

    #[test]
    #[should_panic(expected = "core cannot steal from itself")]
    fn cannot_drain_own_list() {
        let f = fixture(&[1]);
        let held = f.lists[0].lock();
        let mut sweep = StealSweep::begin(&f.coordination, &f.lists[0], held);
        sweep.drain(&f.lists[0]);
    }

    #[test]
    fn steal_collects_every_other_core() {
        let f = fixture(&[0, 2, 0, 5]);
        let held = f.lists[0].lock();

        let guard = steal(&f.coordination, &f.lists, CoreId::new(0), held);

        assert_eq!(guard.len(), 7);
        drop(guard);
        assert!(f.lists[1..].iter().all(|l| l.lock().is_empty()));
        assert!(!f.coordination.is_locked());
    }

    #[test]
    fn stolen_pages_follow_own_pages() {
        let f = fixture(&[1, 1]);
        let own_page = f.lists[0].lock().iter().next().unwrap();
        let donor_page = f.lists[1].lock().iter().next().unwrap();
        let held = f.lists[0].lock();

        let guard = steal(&f.coordination, &f.lists, CoreId::new(0), held);

        let order: Vec<_> = guard.iter().collect();
        assert_eq!(order, vec![own_page, donor_page]);
        assert_eq!(
            f.memory.ptr_to_phys(donor_page.as_ptr()),
            PhysicalAddress::new(PAGE_SIZE)
        );
    }

    #[test]
    fn nothing_to_steal() {
        let f = fixture(&[0, 0, 0]);
        let held = f.lists[2].lock();

        let guard = steal(&f.coordination, &f.lists, CoreId::new(2), held);

        assert!(guard.is_empty());
    }
}
