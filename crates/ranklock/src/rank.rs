//! Per-thread bookkeeping of held locks and their ranks.
//!
//! Each thread keeps an ordered list of the locks it currently holds. A
//! blocking first-level acquisition must carry a rank strictly greater
//! than every held rank; anything else could participate in a circular
//! wait and is treated as fatal on the spot. Try-acquires skip the check
//! (a non-blocking acquire cannot produce the wait cycle a deadlock
//! needs) but are still recorded so release stays balanced.

use std::cell::RefCell;

use crate::lock::RecursiveLock;
use crate::{RANK_UNRANKED, Rank};

struct HeldLock {
    id: u64,
    rank: Rank,
    name: Box<str>,
}

thread_local! {
    static HELD: RefCell<Vec<HeldLock>> = const { RefCell::new(Vec::new()) };
}

/// Record a successful first-level acquisition. Recursive re-entries by
/// the owner are detected here and ignored; only the first acquisition
/// establishes ordering. `check_rank` is false for try-acquires.
pub(crate) fn track_acquisition(lock: &RecursiveLock, check_rank: bool) {
    HELD.with_borrow_mut(|held| {
        if held.iter().any(|h| h.id == lock.id()) {
            return;
        }
        if check_rank && lock.rank() != RANK_UNRANKED {
            if let Some(blocker) = held
                .iter()
                .find(|h| h.rank != RANK_UNRANKED && h.rank >= lock.rank())
            {
                let message = format!(
                    "rank violation: acquiring \"{}\" (rank {}) while holding \"{}\" (rank {})",
                    lock.name(),
                    lock.rank(),
                    blocker.name,
                    blocker.rank,
                );
                lock.dump_and_panic(&message);
            }
        }
        held.push(HeldLock {
            id: lock.id(),
            rank: lock.rank(),
            name: lock.name().into(),
        });
    });
}

/// Forget a lock once its last recursion level is released.
pub(crate) fn track_release(id: u64) {
    HELD.with_borrow_mut(|held| {
        if let Some(index) = held.iter().rposition(|h| h.id == id) {
            held.remove(index);
        }
    });
}

/// Ranks currently held by the calling thread, innermost last.
#[cfg(test)]
pub(crate) fn held_ranks() -> Vec<Rank> {
    HELD.with_borrow(|held| held.iter().map(|h| h.rank).collect())
}
