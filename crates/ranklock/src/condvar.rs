//! Condition variables integrated with [`RecursiveLock`].
//!
//! A condition variable is created from, and permanently paired with, a
//! single lock. Waiting releases every recursion level at once and
//! restores them before returning, so a thread holding the lock three
//! deep wakes up holding it three deep.

use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::lock::RecursiveLock;

#[cfg(feature = "stats")]
use crate::clock;

/// A condition variable bound to one [`RecursiveLock`].
///
/// Wakeups are tracked with a generation counter so a signal sent while
/// a waiter is between releasing the lock and blocking is never lost.
pub struct CondVar {
    lock: Arc<RecursiveLock>,
    generation: Mutex<u64>,
    condvar: Condvar,
    waiters: AtomicUsize,
}

impl CondVar {
    /// Wake one waiter. Callers conventionally hold the paired lock, but
    /// signaling without it is permitted.
    pub fn signal(&self) {
        let mut generation = self.generation.lock();
        *generation = generation.wrapping_add(1);
        self.condvar.notify_one();
    }

    /// Wake every current waiter.
    pub fn broadcast(&self) {
        let mut generation = self.generation.lock();
        *generation = generation.wrapping_add(1);
        self.condvar.notify_all();
    }

    /// The lock this condition variable waits on.
    pub fn lock(&self) -> &Arc<RecursiveLock> {
        &self.lock
    }
}

impl Drop for CondVar {
    fn drop(&mut self) {
        if self.waiters.load(Ordering::Relaxed) > 0 {
            if std::thread::panicking() {
                tracing::error!(
                    lock = %self.lock.name(),
                    "condition variable with waiters dropped during panic unwind"
                );
            } else {
                panic!("destroy of a condition variable with active waiters");
            }
        }
    }
}

impl RecursiveLock {
    /// Create a condition variable paired with this lock. Fatal on a
    /// bound lock; the external system owns its own waiting primitives.
    pub fn create_cond_var(self: &Arc<Self>) -> CondVar {
        if self.bound_external().is_some() {
            self.dump_and_panic("condition variable creation on a bound lock");
        }
        CondVar {
            lock: Arc::clone(self),
            generation: Mutex::new(0),
            condvar: Condvar::new(),
            waiters: AtomicUsize::new(0),
        }
    }

    /// Block on `cv` until signaled. The calling thread must hold this
    /// lock; all recursion levels are released for the duration of the
    /// wait and restored before returning.
    #[track_caller]
    pub fn wait(&self, cv: &CondVar) {
        self.wait_inner(cv, None, Location::caller());
    }

    /// Like [`wait`](Self::wait) with an upper bound on the wait time.
    /// Returns true if a signal arrived, false on timeout. Either way the
    /// lock is held again at its previous depth when this returns.
    #[track_caller]
    pub fn timed_wait(&self, cv: &CondVar, timeout: Duration) -> bool {
        self.wait_inner(cv, Some(timeout), Location::caller())
    }

    fn wait_inner(
        &self,
        cv: &CondVar,
        timeout: Option<Duration>,
        site: &'static Location<'static>,
    ) -> bool {
        if !std::ptr::eq(Arc::as_ptr(&cv.lock), self) {
            self.dump_and_panic("condition variable wait with the wrong lock");
        }
        let Some(native) = self.native() else {
            self.dump_and_panic("condition variable wait on a bound lock");
        };
        if !native.is_owner() {
            self.dump_and_panic("condition variable wait without holding the lock");
        }

        let deadline = timeout.map(|t| Instant::now() + t);

        cv.waiters.fetch_add(1, Ordering::Relaxed);
        let mut generation = cv.generation.lock();
        let begin = *generation;
        // The generation guard is held across the release, so a signal
        // cannot slip in between dropping the lock and blocking.
        let depth = native.release_all();

        while *generation == begin {
            match deadline {
                Some(deadline) => {
                    if cv.condvar.wait_until(&mut generation, deadline).timed_out() {
                        break;
                    }
                }
                None => cv.condvar.wait(&mut generation),
            }
        }
        let signaled = *generation != begin;
        drop(generation);

        native.reacquire(depth, site);
        cv.waiters.fetch_sub(1, Ordering::Relaxed);

        #[cfg(feature = "stats")]
        if let Some(stats) = self.lock_stats() {
            stats
                .hold_start
                .store(clock::monotonic_ns(), std::sync::atomic::Ordering::Relaxed);
        }

        signaled
    }
}
