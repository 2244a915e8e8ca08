use std::num::NonZeroUsize;
use std::sync::LazyLock;
use std::time::Instant;

use parking_lot::RawThreadId;
use parking_lot::lock_api::GetThreadId;

static EPOCH: LazyLock<Instant> = LazyLock::new(Instant::now);

/// Monotonic nanoseconds since the first use of the crate.
pub(crate) fn monotonic_ns() -> u64 {
    EPOCH.elapsed().as_nanos() as u64
}

/// Opaque identity token for the calling thread; nonzero and stable for
/// the thread's lifetime, comparable for equality only.
pub(crate) fn thread_token() -> NonZeroUsize {
    RawThreadId.nonzero_thread_id()
}
