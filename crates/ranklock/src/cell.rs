use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

/// A write-once cell settled by compare-and-swap.
///
/// Starts empty; the first thread to install a value wins, losers drop
/// their speculative value and observe the winner's. Once set, the cell
/// never changes again, so `get` is a single atomic load and the returned
/// reference lives as long as the cell.
pub struct RaceCell<T> {
    ptr: AtomicPtr<T>,
}

impl<T> RaceCell<T> {
    pub const fn new() -> Self {
        Self {
            ptr: AtomicPtr::new(ptr::null_mut()),
        }
    }

    pub fn get(&self) -> Option<&T> {
        let p = self.ptr.load(Ordering::Acquire);
        if p.is_null() {
            None
        } else {
            // Non-null means a fully constructed value was published with
            // release ordering and will never be freed before the cell.
            Some(unsafe { &*p })
        }
    }

    /// Install `make()` if the cell is empty; return the resident value.
    pub fn get_or_install(&self, make: impl FnOnce() -> T) -> &T {
        if let Some(value) = self.get() {
            return value;
        }
        let fresh = Box::into_raw(Box::new(make()));
        match self.ptr.compare_exchange(
            ptr::null_mut(),
            fresh,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => unsafe { &*fresh },
            Err(winner) => {
                // Lost the race: reclaim our speculative value.
                drop(unsafe { Box::from_raw(fresh) });
                unsafe { &*winner }
            }
        }
    }
}

impl<T> Drop for RaceCell<T> {
    fn drop(&mut self) {
        let p = *self.ptr.get_mut();
        if !p.is_null() {
            drop(unsafe { Box::from_raw(p) });
        }
    }
}

impl<T> Default for RaceCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl<T: Send> Send for RaceCell<T> {}
unsafe impl<T: Send + Sync> Sync for RaceCell<T> {}
