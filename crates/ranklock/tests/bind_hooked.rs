//! Must run in its own process: the hook table is process-global and the
//! first install wins.

use std::sync::atomic::{AtomicUsize, Ordering};

use ranklock::{ExternalHooks, ExternalMutexRef, LockControl, bind_external, install_external_hooks};

// The fake external mutex is just a depth counter; the tests exercise it
// from one thread, so no blocking is needed.
static DEPTH: AtomicUsize = AtomicUsize::new(0);

fn ext_lock(_mutex: ExternalMutexRef) {
    DEPTH.fetch_add(1, Ordering::Relaxed);
}

fn ext_unlock(_mutex: ExternalMutexRef) {
    DEPTH.fetch_sub(1, Ordering::Relaxed);
}

fn ext_try_lock(mutex: ExternalMutexRef) -> bool {
    ext_lock(mutex);
    true
}

fn ext_is_owned(_mutex: ExternalMutexRef) -> bool {
    DEPTH.load(Ordering::Relaxed) > 0
}

fn install() {
    install_external_hooks(ExternalHooks {
        lock: ext_lock,
        unlock: ext_unlock,
        try_lock: ext_try_lock,
        is_owned: ext_is_owned,
    });
}

#[test]
fn bound_locks_delegate_to_the_hook_table() {
    install();
    let mut storage = 0u64;
    let mutex = ExternalMutexRef::new(&mut storage as *mut u64 as *mut ());

    let lock = bind_external(mutex, 5).unwrap();
    assert_eq!(lock.bound_external(), Some(mutex));
    assert_eq!(lock.rank(), 5);
    assert!(lock.name().starts_with("X-"));

    assert!(!lock.is_held_by_current_thread());
    lock.acquire();
    assert!(lock.is_held_by_current_thread());
    assert_eq!(DEPTH.load(Ordering::Relaxed), 1);

    assert!(lock.try_acquire());
    assert_eq!(DEPTH.load(Ordering::Relaxed), 2);

    lock.release();
    lock.release();
    assert_eq!(DEPTH.load(Ordering::Relaxed), 0);
    assert!(!lock.is_held_by_current_thread());
}

#[test]
fn bound_locks_take_no_configuration() {
    install();
    let mut storage = 0u64;
    let mutex = ExternalMutexRef::new(&mut storage as *mut u64 as *mut ());

    let lock = bind_external(mutex, 5).unwrap();
    assert!(!lock.control(LockControl::AttachAcquisitionHisto {
        min_value_ns: 1_000,
        decades: 3,
    }));
}

#[test]
fn a_second_hook_table_is_rejected() {
    install();
    let rejected = install_external_hooks(ExternalHooks {
        lock: ext_lock,
        unlock: ext_unlock,
        try_lock: ext_try_lock,
        is_owned: ext_is_owned,
    });
    assert!(!rejected);
}
