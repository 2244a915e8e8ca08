//! Thin recursive shim over the host mutex primitive.
//!
//! `parking_lot::RawMutex` provides the actual blocking; recursion is
//! layered on top with an owner token and a depth counter. The depth and
//! owner fields are only written by the thread holding the raw mutex;
//! other threads read them racily for diagnostics and owner checks, which
//! is why they are atomics with relaxed ordering.

use std::panic::Location;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use parking_lot::RawMutex;
use parking_lot::lock_api::RawMutex as _;

use crate::clock;

pub(crate) struct RawRecursiveMutex {
    mutex: RawMutex,
    owner: AtomicUsize,
    depth: AtomicUsize,
    // most recent non-recursive acquirer, best effort
    acquire_site: AtomicPtr<Location<'static>>,
}

impl RawRecursiveMutex {
    pub(crate) const fn new() -> Self {
        Self {
            mutex: RawMutex::INIT,
            owner: AtomicUsize::new(0),
            depth: AtomicUsize::new(0),
            acquire_site: AtomicPtr::new(ptr::null_mut()),
        }
    }

    fn me() -> usize {
        clock::thread_token().get()
    }

    /// Block until the calling thread owns the mutex. Returns whether the
    /// acquisition had to wait; a recursive re-entry never contends.
    pub(crate) fn acquire(&self, site: &'static Location<'static>) -> bool {
        let me = Self::me();
        if self.owner.load(Ordering::Relaxed) == me {
            self.depth
                .store(self.depth.load(Ordering::Relaxed) + 1, Ordering::Relaxed);
            return false;
        }
        let contended = if self.mutex.try_lock() {
            false
        } else {
            self.mutex.lock();
            true
        };
        self.became_owner(me, site);
        contended
    }

    pub(crate) fn try_acquire(&self, site: &'static Location<'static>) -> bool {
        let me = Self::me();
        if self.owner.load(Ordering::Relaxed) == me {
            self.depth
                .store(self.depth.load(Ordering::Relaxed) + 1, Ordering::Relaxed);
            return true;
        }
        if !self.mutex.try_lock() {
            return false;
        }
        self.became_owner(me, site);
        true
    }

    fn became_owner(&self, me: usize, site: &'static Location<'static>) {
        self.owner.store(me, Ordering::Relaxed);
        self.depth.store(1, Ordering::Relaxed);
        self.acquire_site
            .store(site as *const _ as *mut _, Ordering::Relaxed);
    }

    /// Drop one recursion level. The caller must have verified ownership.
    pub(crate) fn release(&self) {
        let depth = self.depth.load(Ordering::Relaxed);
        if depth <= 1 {
            self.depth.store(0, Ordering::Relaxed);
            self.owner.store(0, Ordering::Relaxed);
            // We hold the raw mutex: acquired in became_owner, not yet
            // released on this ownership span.
            unsafe { self.mutex.unlock() };
        } else {
            self.depth.store(depth - 1, Ordering::Relaxed);
        }
    }

    pub(crate) fn is_owner(&self) -> bool {
        self.owner.load(Ordering::Relaxed) == Self::me()
    }

    pub(crate) fn count(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    pub(crate) fn acquire_site(&self) -> Option<&'static Location<'static>> {
        let p = self.acquire_site.load(Ordering::Relaxed);
        if p.is_null() { None } else { Some(unsafe { &*p }) }
    }

    /// Drop every recursion level at once and return how many there were.
    /// Used by condition-variable waits; the caller must own the mutex.
    pub(crate) fn release_all(&self) -> usize {
        let depth = self.depth.load(Ordering::Relaxed);
        self.depth.store(0, Ordering::Relaxed);
        self.owner.store(0, Ordering::Relaxed);
        unsafe { self.mutex.unlock() };
        depth
    }

    /// Re-take the mutex at the remembered recursion depth after a wait.
    pub(crate) fn reacquire(&self, depth: usize, site: &'static Location<'static>) {
        self.mutex.lock();
        self.owner.store(Self::me(), Ordering::Relaxed);
        self.depth.store(depth, Ordering::Relaxed);
        self.acquire_site
            .store(site as *const _ as *mut _, Ordering::Relaxed);
    }
}
