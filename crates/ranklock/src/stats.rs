//! Per-lock statistics record and histogram promotion.
//!
//! Allocated once at lock creation (unless the lock is silent) and freed
//! only when the lock is dropped. The two histogram cells start empty and
//! are promoted at most once, either through [`RecursiveLock::control`]
//! or by the hot-lock path of the diagnostic dump.
//!
//! [`RecursiveLock::control`]: crate::RecursiveLock::control

use std::sync::atomic::AtomicU64;

use ranklock_stats::{AcquisitionStats, BasicStats, Histogram};

use crate::cell::RaceCell;

pub(crate) struct LockStats {
    /// Timestamp of the most recent 0→1 recursion transition, written and
    /// read only by the thread holding the lock.
    pub(crate) hold_start: AtomicU64,
    pub(crate) acquisition: AcquisitionStats,
    pub(crate) held: BasicStats,
    pub(crate) acquisition_histo: RaceCell<Histogram>,
    pub(crate) held_histo: RaceCell<Histogram>,
}

impl LockStats {
    pub(crate) fn new() -> Self {
        Self {
            hold_start: AtomicU64::new(0),
            acquisition: AcquisitionStats::new(),
            held: BasicStats::new(),
            acquisition_histo: RaceCell::new(),
            held_histo: RaceCell::new(),
        }
    }
}

/// Install a histogram into `cell` if it is still empty; no-op otherwise.
/// The promotion is monotonic: once present, the histogram stays for the
/// lifetime of the lock.
pub(crate) fn force_histo(cell: &RaceCell<Histogram>, min_value_ns: u64, decades: u32) {
    cell.get_or_install(|| Histogram::new(min_value_ns, decades));
}
