//! Statistics substrate for instrumented locks.
//!
//! Tracks how often a lock is acquired, how often an acquisition had to
//! block, how long acquisitions take, and how long the lock is held.
//! Latency distributions are collected in opt-in logarithmic histograms so
//! quiet locks pay nothing beyond a couple of empty pointer-sized cells.
//!
//! All counters are `AtomicU64` updated with relaxed ordering; a dump can
//! read them at any time without taking the lock they describe.

mod histogram;
mod kitchen;
mod stats;

pub use histogram::{DEFAULT_HISTO_DECADES, DEFAULT_HISTO_MIN_VALUE_NS, Histogram};
pub use kitchen::{HOT_RATIO, LOG_RATIO, Verdict, kitchen};
pub use stats::{AcquisitionStats, BasicStats, update_max};
