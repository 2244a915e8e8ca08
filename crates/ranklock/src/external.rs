//! Binding to externally managed recursive mutexes.
//!
//! A higher-privilege subsystem can own the actual locking while the rest
//! of the code keeps using the unified [`RecursiveLock`] API. The
//! subsystem installs its hook table once at startup; until then,
//! [`bind_external`] declines and returns `None`.

use std::sync::{Arc, OnceLock};

use crate::Rank;
use crate::lock::RecursiveLock;

/// Opaque handle to an external recursive mutex. The pointer is never
/// dereferenced by this crate, only passed back through the hook table.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ExternalMutexRef(*mut ());

unsafe impl Send for ExternalMutexRef {}
unsafe impl Sync for ExternalMutexRef {}

impl ExternalMutexRef {
    pub fn new(ptr: *mut ()) -> Self {
        Self(ptr)
    }

    pub fn as_ptr(&self) -> *mut () {
        self.0
    }
}

/// Operations the external lock system provides over its own mutexes.
#[derive(Clone, Copy)]
pub struct ExternalHooks {
    pub lock: fn(ExternalMutexRef),
    pub unlock: fn(ExternalMutexRef),
    pub try_lock: fn(ExternalMutexRef) -> bool,
    pub is_owned: fn(ExternalMutexRef) -> bool,
}

static HOOKS: OnceLock<ExternalHooks> = OnceLock::new();

/// Install the external hook table. Returns false if one was already
/// installed; the first table wins.
pub fn install_external_hooks(hooks: ExternalHooks) -> bool {
    HOOKS.set(hooks).is_ok()
}

pub(crate) fn hooks() -> Option<&'static ExternalHooks> {
    HOOKS.get()
}

/// Wrap an already-initialized external recursive mutex in a
/// [`RecursiveLock`]. The wrapper delegates all locking to the hook table
/// and collects no statistics; the external system is assumed to handle
/// its own rank checking and debugging. Returns `None` until
/// [`install_external_hooks`] has run.
pub fn bind_external(mutex: ExternalMutexRef, rank: Rank) -> Option<Arc<RecursiveLock>> {
    hooks()?;
    Some(RecursiveLock::new_bound(mutex, rank))
}
