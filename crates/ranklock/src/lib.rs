//! Recursive locks with rank-ordered deadlock avoidance, contention
//! statistics, and integrated condition variables.
//!
//! Every [`RecursiveLock`] carries a *rank*. A thread may only block on a
//! lock whose rank is strictly greater than the rank of every lock it
//! already holds, which makes ABBA deadlocks impossible: the first thread
//! to attempt an out-of-order acquisition panics with a diagnostic dump
//! instead of deadlocking later.
//!
//! With the `stats` feature (default on), each non-silent lock counts
//! acquisitions, contention, and hold times. Locks whose contention ratio
//! crosses a threshold are promoted to full latency histograms the next
//! time [`dump_all_locks`] runs, and a `HOT LOCK` advisory is logged.
//!
//! Locks may also be *bound* to an externally managed recursive mutex via
//! [`bind_external`]; a bound lock delegates all locking to the installed
//! [`ExternalHooks`] and collects no statistics of its own.
//!
//! The crate never spawns threads. All fatal misuse (rank violation,
//! non-owner release, dropping a held lock, waiting on the wrong condition
//! variable) produces a diagnostic dump through `tracing` and panics.

mod cell;
mod clock;
mod condvar;
mod external;
mod lock;
mod native;
mod rank;
mod registry;
#[cfg(feature = "stats")]
mod stats;

pub use cell::RaceCell;
pub use condvar::CondVar;
pub use external::{ExternalHooks, ExternalMutexRef, bind_external, install_external_hooks};
pub use lock::{LockControl, RecursiveLock, install_try_acquire_fault};
pub use registry::{SingletonCell, dump_all_locks};

/// Lock-ordering rank. Blocking acquisitions must happen in strictly
/// increasing rank order within a thread.
pub type Rank = u32;

/// Rank that opts a lock out of order checking entirely.
pub const RANK_UNRANKED: Rank = 0;
