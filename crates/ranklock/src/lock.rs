use std::fmt::Write as _;
use std::panic::Location;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use crate::external::{self, ExternalMutexRef};
use crate::native::RawRecursiveMutex;
use crate::{Rank, rank, registry};

#[cfg(feature = "stats")]
use crate::clock;
#[cfg(feature = "stats")]
use crate::stats::{LockStats, force_histo};

/// Validity sentinel: present while the lock is live, cleared on drop so
/// stale references are caught loudly instead of corrupting state.
const REC_LOCK_SIGNATURE: u32 = 0x4B43_4C52; // "RLCK"

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn alloc_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

// Optional fault-injection hook for try-acquire, keyed on the lock name.
// Installed once, typically by tests exercising failure paths.
static TRY_FAULT: OnceLock<fn(&str) -> bool> = OnceLock::new();

/// Install a hook that may force `try_acquire` to fail for the named
/// lock. Returns false if a hook was already installed.
pub fn install_try_acquire_fault(hook: fn(&str) -> bool) -> bool {
    TRY_FAULT.set(hook).is_ok()
}

fn try_acquire_forced_fail(name: &str) -> bool {
    TRY_FAULT.get().is_some_and(|hook| hook(name))
}

/// Runtime configuration commands for a lock.
#[derive(Debug, Clone, Copy)]
pub enum LockControl {
    /// Attach an acquisition-latency histogram.
    AttachAcquisitionHisto { min_value_ns: u64, decades: u32 },
    /// Attach a held-time histogram.
    AttachHeldHisto { min_value_ns: u64, decades: u32 },
}

enum Inner {
    /// The lock owns its mutex; rank tracking and statistics apply.
    Owned {
        native: RawRecursiveMutex,
        #[cfg(feature = "stats")]
        stats: Option<Box<LockStats>>,
    },
    /// All locking delegates to an external recursive mutex; the external
    /// system handles rank, stats, and debugging itself.
    Bound(ExternalMutexRef),
}

/// A named, ranked recursive lock.
///
/// Only the owning thread may recurse; every acquisition must be matched
/// by a release from the same thread. Misuse is fatal by design — see the
/// crate docs.
pub struct RecursiveLock {
    name: String,
    signature: AtomicU32,
    rank: Rank,
    id: u64,
    inner: Inner,
}

impl RecursiveLock {
    /// Create a lock. A `None` name is synthesized from the creation site.
    #[track_caller]
    pub fn new(name: Option<&str>, rank: Rank) -> Arc<Self> {
        Self::new_ex(name, rank, false)
    }

    /// Create a lock that never collects statistics or logs about itself.
    #[track_caller]
    pub fn new_silent(name: Option<&str>, rank: Rank) -> Arc<Self> {
        Self::new_ex(name, rank, true)
    }

    #[track_caller]
    fn new_ex(name: Option<&str>, rank: Rank, silent: bool) -> Arc<Self> {
        let name = match name {
            Some(name) => name.to_string(),
            None => {
                let site = Location::caller();
                format!("R-{}:{}", site.file(), site.line())
            }
        };

        #[cfg(not(feature = "stats"))]
        let _ = silent;

        let lock = Arc::new(Self {
            name,
            signature: AtomicU32::new(REC_LOCK_SIGNATURE),
            rank,
            id: alloc_id(),
            inner: Inner::Owned {
                native: RawRecursiveMutex::new(),
                #[cfg(feature = "stats")]
                stats: (!silent).then(|| Box::new(LockStats::new())),
            },
        });
        registry::register(&lock);
        lock
    }

    /// Wrap an external mutex. Not registered for diagnostics; the
    /// external system owns those. See [`crate::bind_external`].
    pub(crate) fn new_bound(mutex: ExternalMutexRef, rank: Rank) -> Arc<Self> {
        Arc::new(Self {
            name: format!("X-{:p}", mutex.as_ptr()),
            signature: AtomicU32::new(REC_LOCK_SIGNATURE),
            rank,
            id: alloc_id(),
            inner: Inner::Bound(mutex),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// The external mutex this lock is bound to, if any.
    pub fn bound_external(&self) -> Option<ExternalMutexRef> {
        self.check();
        match &self.inner {
            Inner::Bound(mutex) => Some(*mutex),
            Inner::Owned { .. } => None,
        }
    }

    fn check(&self) {
        let signature = self.signature.load(Ordering::Relaxed);
        if signature != REC_LOCK_SIGNATURE {
            panic!(
                "operation on a dead or corrupt lock (signature {signature:#010x}, expected {REC_LOCK_SIGNATURE:#010x})"
            );
        }
    }

    fn bound_hooks(&self) -> &'static external::ExternalHooks {
        external::hooks().unwrap_or_else(|| self.dump_and_panic("bound lock without hooks"))
    }

    pub(crate) fn dump_and_panic(&self, message: &str) -> ! {
        let dump = self.dump_string();
        tracing::error!(name = %self.name, %dump, "{message}");
        panic!("{message}");
    }

    pub(crate) fn native(&self) -> Option<&RawRecursiveMutex> {
        match &self.inner {
            Inner::Owned { native, .. } => Some(native),
            Inner::Bound(_) => None,
        }
    }

    #[cfg(feature = "stats")]
    pub(crate) fn lock_stats(&self) -> Option<&LockStats> {
        match &self.inner {
            Inner::Owned { stats, .. } => stats.as_deref(),
            Inner::Bound(_) => None,
        }
    }

    /// Acquire the lock, blocking if necessary. The owning thread may
    /// call this again to recurse.
    #[track_caller]
    pub fn acquire(&self) {
        self.check();
        let site = Location::caller();
        match &self.inner {
            Inner::Bound(mutex) => (self.bound_hooks().lock)(*mutex),
            Inner::Owned { native, .. } => {
                // Ordering is checked on the first acquisition only.
                rank::track_acquisition(self, true);

                #[cfg(feature = "stats")]
                if let Some(stats) = self.lock_stats() {
                    let begin = clock::monotonic_ns();
                    let contended = native.acquire(site);
                    if native.count() == 1 {
                        let now = clock::monotonic_ns();
                        stats.acquisition.sample(true, contended, now - begin);
                        if let Some(histo) = stats.acquisition_histo.get() {
                            histo.sample(now - begin);
                        }
                        stats.hold_start.store(now, Ordering::Relaxed);
                    }
                    return;
                }

                native.acquire(site);
            }
        }
    }

    /// Release one recursion level. Fatal if the calling thread is not
    /// the owner.
    pub fn release(&self) {
        self.check();
        match &self.inner {
            Inner::Bound(mutex) => (self.bound_hooks().unlock)(*mutex),
            Inner::Owned { native, .. } => {
                if !native.is_owner() {
                    // The count is read without the lock; the message is
                    // advisory and tolerates the race.
                    let state = if native.count() == 0 {
                        "unacquired"
                    } else {
                        "acquired"
                    };
                    self.dump_and_panic(&format!(
                        "non-owner release of an {state} recursive lock"
                    ));
                }

                #[cfg(feature = "stats")]
                if let Some(stats) = self.lock_stats() {
                    if native.count() == 1 {
                        let held = clock::monotonic_ns()
                            .saturating_sub(stats.hold_start.load(Ordering::Relaxed));
                        stats.held.sample(held);
                        if let Some(histo) = stats.held_histo.get() {
                            histo.sample(held);
                        }
                    }
                }

                if native.count() == 1 {
                    rank::track_release(self.id);
                }
                native.release();
            }
        }
    }

    /// Attempt to acquire without blocking. A successful try-acquire does
    /// not rank-check: a non-blocking acquisition cannot create the
    /// circular wait a deadlock needs.
    #[track_caller]
    pub fn try_acquire(&self) -> bool {
        self.check();
        match &self.inner {
            Inner::Bound(mutex) => (self.bound_hooks().try_lock)(*mutex),
            Inner::Owned { native, .. } => {
                if try_acquire_forced_fail(&self.name) {
                    return false;
                }

                let success = native.try_acquire(Location::caller());
                if success {
                    rank::track_acquisition(self, false);
                }

                #[cfg(feature = "stats")]
                if let Some(stats) = self.lock_stats() {
                    stats.acquisition.sample(success, !success, 0);
                }

                success
            }
        }
    }

    pub fn is_held_by_current_thread(&self) -> bool {
        self.check();
        match &self.inner {
            Inner::Bound(mutex) => (self.bound_hooks().is_owned)(*mutex),
            Inner::Owned { native, .. } => native.is_owner(),
        }
    }

    /// Current recursion depth; zero when unheld. Racy when read by a
    /// non-owner, for diagnostics only.
    pub fn recursion_count(&self) -> usize {
        self.check();
        match &self.inner {
            Inner::Bound(_) => 0,
            Inner::Owned { native, .. } => native.count(),
        }
    }

    /// Apply a configuration command. Returns false when the command does
    /// not apply: the lock is silent, bound, or built without stats.
    pub fn control(&self, command: LockControl) -> bool {
        self.check();
        #[cfg(feature = "stats")]
        {
            let Some(stats) = self.lock_stats() else {
                return false;
            };
            match command {
                LockControl::AttachAcquisitionHisto {
                    min_value_ns,
                    decades,
                } => force_histo(&stats.acquisition_histo, min_value_ns, decades),
                LockControl::AttachHeldHisto {
                    min_value_ns,
                    decades,
                } => force_histo(&stats.held_histo, min_value_ns, decades),
            }
            true
        }
        #[cfg(not(feature = "stats"))]
        {
            let _ = command;
            false
        }
    }

    /// One lock's diagnostic state as text.
    pub fn dump_string(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Recursive lock \"{}\"", self.name);
        let _ = writeln!(
            out,
            "\tsignature {:#010x}",
            self.signature.load(Ordering::Relaxed)
        );
        let _ = writeln!(out, "\trank {:#x}", self.rank);
        match &self.inner {
            Inner::Bound(mutex) => {
                let _ = writeln!(out, "\tbound to {:p}", mutex.as_ptr());
            }
            Inner::Owned { native, .. } => {
                let _ = writeln!(out, "\tcount {}", native.count());
                if let Some(site) = native.acquire_site() {
                    let _ = writeln!(out, "\tcaller {}:{}", site.file(), site.line());
                }
            }
        }
        out
    }

    /// Statistics report plus hot-lock promotion, appended to `out`.
    /// Consulted from the dump path only.
    #[cfg(feature = "stats")]
    pub(crate) fn stats_action(&self, out: &mut String) {
        use ranklock_stats::{
            DEFAULT_HISTO_DECADES, DEFAULT_HISTO_MIN_VALUE_NS, kitchen,
        };

        let Some(stats) = self.lock_stats() else {
            return;
        };

        stats.acquisition.write_report(&self.name, out);
        if let Some(histo) = stats.acquisition_histo.get() {
            histo.write_report("acquisition", out);
        }
        stats.held.write_report(&self.name, out);
        if let Some(histo) = stats.held_histo.get() {
            histo.write_report("held", out);
        }

        let verdict = kitchen(&stats.acquisition);
        if verdict.is_hot {
            force_histo(
                &stats.acquisition_histo,
                DEFAULT_HISTO_MIN_VALUE_NS,
                DEFAULT_HISTO_DECADES,
            );
            force_histo(
                &stats.held_histo,
                DEFAULT_HISTO_MIN_VALUE_NS,
                DEFAULT_HISTO_DECADES,
            );
            if verdict.do_log {
                tracing::info!(
                    name = %self.name,
                    contention_ratio = verdict.contention_ratio,
                    "HOT LOCK"
                );
                let _ = writeln!(
                    out,
                    "HOT LOCK ({}); contention ratio {:.3}",
                    self.name, verdict.contention_ratio
                );
            }
        }
    }
}

impl Drop for RecursiveLock {
    fn drop(&mut self) {
        if let Inner::Owned { native, .. } = &self.inner {
            if native.count() > 0 {
                if std::thread::panicking() {
                    // A second panic would abort and eat the first one.
                    tracing::error!(
                        name = %self.name,
                        count = native.count(),
                        "held lock dropped during panic unwind"
                    );
                } else {
                    self.dump_and_panic("destroy of an acquired recursive lock");
                }
            }
        }
        self.signature.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recursion_and_balanced_release() {
        let lock = RecursiveLock::new(Some("recurse"), 10);
        lock.acquire();
        lock.acquire();
        assert!(lock.is_held_by_current_thread());
        assert_eq!(lock.recursion_count(), 2);
        lock.release();
        lock.release();
        assert_eq!(lock.recursion_count(), 0);
        assert!(!lock.is_held_by_current_thread());
    }

    #[test]
    fn auto_named_locks_carry_the_creation_site() {
        let lock = RecursiveLock::new(None, 1);
        assert!(lock.name().starts_with("R-"));
        assert!(lock.name().contains("lock.rs"));
    }

    #[test]
    fn increasing_ranks_are_fine() {
        let a = RecursiveLock::new(Some("rank-low"), 5);
        let b = RecursiveLock::new(Some("rank-high"), 7);
        a.acquire();
        b.acquire();
        assert_eq!(crate::rank::held_ranks(), vec![5, 7]);
        b.release();
        a.release();
        assert!(crate::rank::held_ranks().is_empty());
    }

    #[test]
    #[should_panic(expected = "rank violation")]
    fn decreasing_ranks_are_fatal() {
        let a = RecursiveLock::new(Some("order-first"), 5);
        let b = RecursiveLock::new(Some("order-second"), 3);
        a.acquire();
        b.acquire();
    }

    #[test]
    #[should_panic(expected = "rank violation")]
    fn equal_ranks_are_fatal_too() {
        let a = RecursiveLock::new(Some("tie-first"), 4);
        let b = RecursiveLock::new(Some("tie-second"), 4);
        a.acquire();
        b.acquire();
    }

    #[test]
    fn unranked_locks_skip_order_checking() {
        let a = RecursiveLock::new(Some("ranked"), 9);
        let b = RecursiveLock::new(Some("unranked"), crate::RANK_UNRANKED);
        a.acquire();
        b.acquire();
        b.release();
        a.release();
    }

    #[test]
    fn recursive_reentry_does_not_rank_check() {
        let a = RecursiveLock::new(Some("reenter-low"), 2);
        let b = RecursiveLock::new(Some("reenter-high"), 6);
        a.acquire();
        b.acquire();
        // Re-entering the lower-ranked lock is recursion, not a new
        // first-level acquisition.
        a.acquire();
        a.release();
        b.release();
        a.release();
    }

    #[test]
    fn try_acquire_skips_the_rank_check() {
        let a = RecursiveLock::new(Some("try-high"), 8);
        let b = RecursiveLock::new(Some("try-low"), 2);
        a.acquire();
        assert!(b.try_acquire());
        b.release();
        a.release();
    }

    #[test]
    fn try_acquire_fails_across_threads() {
        let lock = RecursiveLock::new(Some("try-contended"), 3);
        lock.acquire();
        let other = Arc::clone(&lock);
        let got = std::thread::spawn(move || other.try_acquire())
            .join()
            .unwrap();
        assert!(!got);
        lock.release();
    }

    #[test]
    #[should_panic(expected = "non-owner release of an unacquired recursive lock")]
    fn releasing_an_unacquired_lock_is_fatal() {
        let lock = RecursiveLock::new(Some("never-held"), 1);
        lock.release();
    }

    #[test]
    fn releasing_from_the_wrong_thread_is_fatal() {
        let lock = RecursiveLock::new(Some("wrong-thread"), 1);
        lock.acquire();
        let other = Arc::clone(&lock);
        let result = std::thread::spawn(move || other.release()).join();
        assert!(result.is_err());
        lock.release();
    }

    #[cfg(feature = "stats")]
    #[test]
    fn silent_locks_never_allocate_stats() {
        let lock = RecursiveLock::new_silent(Some("quiet"), 1);
        assert!(lock.lock_stats().is_none());
        lock.acquire();
        lock.release();
        assert!(!lock.control(LockControl::AttachAcquisitionHisto {
            min_value_ns: 1_000,
            decades: 3,
        }));
    }

    #[cfg(feature = "stats")]
    #[test]
    fn acquire_and_release_feed_the_stats() {
        let lock = RecursiveLock::new(Some("counted"), 1);
        lock.acquire();
        lock.acquire();
        lock.release();
        lock.release();
        assert!(lock.try_acquire());
        lock.release();

        let stats = lock.lock_stats().unwrap();
        // Only first-level transitions are sampled: one blocking
        // acquire, one try. The recursive re-entry is not.
        assert_eq!(stats.acquisition.successes(), 2);
        assert_eq!(stats.held.count(), 2);
    }

    #[cfg(feature = "stats")]
    #[test]
    fn control_attaches_histograms_once() {
        let lock = RecursiveLock::new(Some("histo"), 1);
        let command = LockControl::AttachAcquisitionHisto {
            min_value_ns: 500,
            decades: 4,
        };
        assert!(lock.control(command));
        assert!(lock.control(command)); // idempotent
        let stats = lock.lock_stats().unwrap();
        let histo = stats.acquisition_histo.get().unwrap();
        assert_eq!(histo.min_value_ns(), 500);

        lock.acquire();
        lock.release();
        assert!(histo.total_samples() >= 1);
    }

    #[cfg(feature = "stats")]
    #[test]
    fn hot_lock_promotion_from_the_dump_path() {
        let lock = RecursiveLock::new(Some("stove"), 1);
        let stats = lock.lock_stats().unwrap();
        for _ in 0..100 {
            stats.acquisition.sample(true, true, 10_000);
        }

        let mut out = String::new();
        lock.stats_action(&mut out);

        assert!(out.contains("HOT LOCK (stove)"));
        assert!(stats.acquisition_histo.get().is_some());
        assert!(stats.held_histo.get().is_some());
    }

    #[test]
    fn bound_external_is_none_for_owned_locks() {
        let lock = RecursiveLock::new(Some("owned"), 1);
        assert!(lock.bound_external().is_none());
        assert_eq!(lock.rank(), 1);
    }

    #[test]
    fn dump_names_the_lock_and_rank() {
        let lock = RecursiveLock::new(Some("dumped"), 0x20);
        lock.acquire();
        let dump = lock.dump_string();
        assert!(dump.contains("Recursive lock \"dumped\""));
        assert!(dump.contains("rank 0x20"));
        assert!(dump.contains("count 1"));
        lock.release();
    }
}
