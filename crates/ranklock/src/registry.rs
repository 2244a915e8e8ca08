//! Global registry of live locks and CAS-published singletons.
//!
//! Every owned lock registers itself at creation so a single diagnostic
//! call can enumerate everything alive in the process. Entries are weak;
//! the registry never extends a lock's lifetime and dead entries are
//! pruned on the next registration or dump.

use std::sync::{Arc, LazyLock, Weak};

use parking_lot::Mutex;

use crate::Rank;
use crate::cell::RaceCell;
use crate::lock::RecursiveLock;

static REGISTRY: LazyLock<Mutex<Vec<Weak<RecursiveLock>>>> =
    LazyLock::new(|| Mutex::new(Vec::new()));

pub(crate) fn register(lock: &Arc<RecursiveLock>) {
    let mut entries = REGISTRY.lock();
    entries.retain(|entry| entry.strong_count() > 0);
    entries.push(Arc::downgrade(lock));
}

/// Render the diagnostic state of every live lock, statistics included,
/// into one string. Promotes hot locks to histogram collection as a side
/// effect of reporting on them.
pub fn dump_all_locks() -> String {
    let locks: Vec<Arc<RecursiveLock>> = {
        let mut entries = REGISTRY.lock();
        entries.retain(|entry| entry.strong_count() > 0);
        entries.iter().filter_map(Weak::upgrade).collect()
    };

    let mut out = String::new();
    for lock in &locks {
        out.push_str(&lock.dump_string());
        #[cfg(feature = "stats")]
        lock.stats_action(&mut out);
        out.push('\n');
    }
    tracing::debug!(locks = locks.len(), "dumped lock registry");
    out
}

/// One-time, race-safe publication point for a shared lock.
///
/// Many threads may hit an uninitialized cell at once; each builds a
/// candidate lock and exactly one wins the install. Losing candidates
/// are dropped and fall out of the registry. The winner lives for the
/// rest of the process.
pub struct SingletonCell {
    cell: RaceCell<Arc<RecursiveLock>>,
}

impl SingletonCell {
    pub const fn new() -> Self {
        Self {
            cell: RaceCell::new(),
        }
    }

    /// The published lock, creating it on first use.
    pub fn get_or_init(&self, name: &str, rank: Rank) -> Arc<RecursiveLock> {
        Arc::clone(self.cell.get_or_install(|| RecursiveLock::new(Some(name), rank)))
    }

    /// The published lock, if any thread has initialized it yet.
    pub fn get(&self) -> Option<Arc<RecursiveLock>> {
        self.cell.get().map(Arc::clone)
    }
}

impl Default for SingletonCell {
    fn default() -> Self {
        Self::new()
    }
}
